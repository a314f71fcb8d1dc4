use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::haversine_m;
use crate::record::{self, RawRecord};
use crate::{TrackError, VideoID};

/// Distance between consecutive captured frames beyond which the earlier one
/// is treated as a GPS spike and dropped.
pub const OUTLIER_JUMP_M: f64 = 20.0;

/// Half-width, in frames, of the smoothing window for speed estimation.
pub const SPEED_WINDOW_HALF_WIDTH: usize = 10;

/// Default window half-width for `remove_no_movement`.
pub const NO_MOVEMENT_FRAME_RANGE: usize = 10;

/// Default movement threshold for `remove_no_movement`, in meters.
pub const NO_MOVEMENT_MIN_DISTANCE_M: f64 = 3.0;

/// One video's cleaned, speed-annotated trajectory. Frame ids are just
/// indices into the parallel arrays, dense and 0-based. Construction runs
/// the cleaning and speed stages; after the optional `remove_no_movement`
/// everything is read-only.
#[derive(Clone, Serialize, Deserialize)]
pub struct Track {
    video_id: VideoID,
    coordinates: Vec<[f64; 3]>,
    abs_micros: Vec<i64>,
    rel_micros: Vec<i64>,

    // Relative microseconds / 1000.0. The scale is off by 1000 from real
    // seconds, but every consumer (speed windows, resampling cadence) uses
    // the same scale, so it stays.
    time_s: Vec<f64>,
    // Frame i to frame i+1, so one entry short of the others
    distances_m: Vec<f64>,
    speeds_ms: Vec<f64>,
    speeds_kmh: Vec<f64>,

    removed_absent: usize,
    removed_outliers: usize,
    removed_no_movement: usize,
}

impl Track {
    /// Validates the identifier, loads the raw record and runs the full
    /// cleaning and speed pipeline.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let (video_id, raw) = record::load(path)?;
        Self::from_record(video_id, raw)
    }

    pub fn from_record(video_id: VideoID, raw: RawRecord) -> Result<Self, TrackError> {
        Self::build(video_id, raw, OUTLIER_JUMP_M)
    }

    fn build(video_id: VideoID, raw: RawRecord, outlier_jump_m: f64) -> Result<Self, TrackError> {
        // Pass 1: drop frames without a GPS fix
        let mut coordinates = Vec::new();
        let mut abs_micros = Vec::new();
        let mut rel_micros = Vec::new();
        let mut removed_absent = 0;
        for ((pos, abs), rel) in raw
            .geometry
            .coordinates
            .into_iter()
            .zip(raw.properties.absolute_utc_micro_sec)
            .zip(raw.properties.relative_utc_micro_sec)
        {
            match pos {
                Some(pos) => {
                    coordinates.push(pos);
                    abs_micros.push(abs);
                    rel_micros.push(rel);
                }
                None => removed_absent += 1,
            }
        }

        // Pass 2: drop single-sample spikes. Scanning back from the
        // second-to-last frame, a frame too far from its closest surviving
        // successor goes; the last frame always stays. This keeps the
        // cascade of the original in-place deletion: once a frame is gone,
        // its predecessor is measured against the frame after it.
        let mut removed_outliers = 0;
        if !coordinates.is_empty() {
            let mut keep = vec![true; coordinates.len()];
            let mut successor = coordinates.len() - 1;
            for i in (0..coordinates.len() - 1).rev() {
                let d = haversine_m(
                    [coordinates[i][0], coordinates[i][1]],
                    [coordinates[successor][0], coordinates[successor][1]],
                );
                if d > outlier_jump_m {
                    keep[i] = false;
                    removed_outliers += 1;
                } else {
                    successor = i;
                }
            }
            if removed_outliers > 0 {
                compact(&mut coordinates, &keep);
                compact(&mut abs_micros, &keep);
                compact(&mut rel_micros, &keep);
            }
        }

        let frames = coordinates.len();
        for actual in [abs_micros.len(), rel_micros.len()] {
            if actual != frames {
                return Err(TrackError::DataIntegrityFault {
                    stage: "cleaner",
                    expected: frames,
                    actual,
                });
            }
        }
        if frames < 2 {
            return Err(TrackError::NoUsableFrames { video_id, frames });
        }

        // Speed estimation over a sliding window, smoothing out per-fix noise
        let time_s: Vec<f64> = rel_micros.iter().map(|rel| *rel as f64 / 1000.0).collect();
        let distances_m: Vec<f64> = (0..frames - 1)
            .map(|i| {
                haversine_m(
                    [coordinates[i][0], coordinates[i][1]],
                    [coordinates[i + 1][0], coordinates[i + 1][1]],
                )
            })
            .collect();

        let mut speeds_ms = Vec::with_capacity(frames);
        let mut speeds_kmh = Vec::with_capacity(frames);
        for i in 0..frames {
            let lo = i.saturating_sub(SPEED_WINDOW_HALF_WIDTH);
            let hi = (i + SPEED_WINDOW_HALF_WIDTH).min(frames);
            let total_distance: f64 = distances_m[lo..hi - 1].iter().sum();
            let total_time = time_s[hi - 1] - time_s[lo];
            if total_time == 0.0 {
                return Err(TrackError::UndefinedSpeed { frame: i });
            }
            let speed = total_distance / total_time;
            speeds_ms.push(speed);
            speeds_kmh.push(speed * 3.6);
        }

        let track = Self {
            video_id,
            coordinates,
            abs_micros,
            rel_micros,
            time_s,
            distances_m,
            speeds_ms,
            speeds_kmh,
            removed_absent,
            removed_outliers,
            removed_no_movement: 0,
        };
        track.check_alignment("speed estimator")?;

        info!(
            "video {}: kept {} frames, removed {} missing fixes and {} spikes",
            video_id, frames, removed_absent, removed_outliers
        );
        Ok(track)
    }

    /// Drops stretches where the track barely moves (parked, waiting at a
    /// barrier) and closes the timeline over the holes, so a sped-up
    /// rendering doesn't dwell on them. Each frame is judged by the total
    /// distance covered within `frame_range` frames either side; the first
    /// and last `frame_range` frames are never judged and never re-based.
    pub fn remove_no_movement(
        &mut self,
        frame_range: usize,
        min_distance_m: f64,
    ) -> Result<(), TrackError> {
        let frames = self.frames();
        if frames < 2 * frame_range {
            return Ok(());
        }

        let mut marked = vec![false; frames];
        let mut removed_micros: i64 = 0;
        for i in frame_range..frames - frame_range {
            let lo = i - frame_range;
            let hi = (i + frame_range).min(self.distances_m.len() - 1);
            let moved: f64 = self.distances_m[lo..=hi].iter().sum();
            if moved < min_distance_m {
                marked[i] = true;
                removed_micros += self.rel_micros[i + 1] - self.rel_micros[i];
            } else {
                // Shift the surviving frame back over the excised time so
                // the remaining timeline has no jump
                self.abs_micros[i] -= removed_micros;
                self.rel_micros[i] -= removed_micros;
                self.time_s[i] -= removed_micros as f64 / 1000.0;
            }
        }

        let removed = marked.iter().filter(|m| **m).count();
        if removed == 0 {
            return Ok(());
        }

        let keep: Vec<bool> = marked.iter().map(|m| !m).collect();
        compact(&mut self.coordinates, &keep);
        compact(&mut self.abs_micros, &keep);
        compact(&mut self.rel_micros, &keep);
        compact(&mut self.time_s, &keep);
        compact(&mut self.speeds_ms, &keep);
        compact(&mut self.speeds_kmh, &keep);
        // The distance array is one shorter; judged frames can never be the
        // last frame, so the same mask applies
        compact(&mut self.distances_m, &keep[..frames - 1]);

        self.removed_no_movement += removed;
        self.check_alignment("movement trimmer")?;

        info!(
            "video {}: removed {} no-movement frames, {} frames left",
            self.video_id,
            removed,
            self.frames()
        );
        Ok(())
    }

    fn check_alignment(&self, stage: &'static str) -> Result<(), TrackError> {
        let frames = self.coordinates.len();
        for actual in [
            self.abs_micros.len(),
            self.rel_micros.len(),
            self.time_s.len(),
            self.speeds_ms.len(),
            self.speeds_kmh.len(),
        ] {
            if actual != frames {
                return Err(TrackError::DataIntegrityFault {
                    stage,
                    expected: frames,
                    actual,
                });
            }
        }
        let expected = frames.saturating_sub(1);
        if self.distances_m.len() != expected {
            return Err(TrackError::DataIntegrityFault {
                stage,
                expected,
                actual: self.distances_m.len(),
            });
        }
        Ok(())
    }

    pub fn video_id(&self) -> VideoID {
        self.video_id
    }

    pub fn frames(&self) -> usize {
        self.coordinates.len()
    }

    /// `[longitude, latitude, elevation]` per kept frame
    pub fn coordinates(&self) -> &[[f64; 3]] {
        &self.coordinates
    }

    pub fn abs_micros(&self) -> &[i64] {
        &self.abs_micros
    }

    pub fn rel_micros(&self) -> &[i64] {
        &self.rel_micros
    }

    /// Per-frame time on the scale the whole pipeline runs on (relative
    /// microseconds / 1000)
    pub fn time_s(&self) -> &[f64] {
        &self.time_s
    }

    /// Distance from frame i to i+1 in meters; one entry short of `frames`
    pub fn distances_m(&self) -> &[f64] {
        &self.distances_m
    }

    pub fn speeds_ms(&self) -> &[f64] {
        &self.speeds_ms
    }

    pub fn speeds_kmh(&self) -> &[f64] {
        &self.speeds_kmh
    }

    pub fn removed_absent(&self) -> usize {
        self.removed_absent
    }

    pub fn removed_outliers(&self) -> usize {
        self.removed_outliers
    }

    pub fn removed_no_movement(&self) -> usize {
        self.removed_no_movement
    }

    pub fn total_distance_m(&self) -> f64 {
        self.distances_m.iter().sum()
    }

    pub fn max_speed_kmh(&self) -> f64 {
        self.speeds_kmh.iter().fold(0.0, |a: f64, b| a.max(*b))
    }

    pub fn mean_speed_kmh(&self) -> f64 {
        self.speeds_kmh.iter().sum::<f64>() / self.frames() as f64
    }

    /// Local planar `[x, y]` meters per frame, for the renderers
    pub fn planar_coordinates(&self) -> Vec<[f64; 2]> {
        crate::geo::flatten_to_meters(&self.coordinates)
    }

    /// When recording started, from the first absolute UTC timestamp
    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        let micros = *self.abs_micros.first()?;
        Utc.timestamp_opt(
            micros.div_euclid(1_000_000),
            (micros.rem_euclid(1_000_000) as u32) * 1_000,
        )
        .single()
    }
}

/// Retains `v[i]` where `keep[i]`, in one pass.
fn compact<T>(v: &mut Vec<T>, keep: &[bool]) {
    let mut i = 0;
    v.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawGeometry, RawProperties, RawRecord};

    // Meters per degree of longitude at the equator, for building tracks
    // with exact distances
    const M_PER_DEG: f64 = 111_229.83;

    fn pos(meters_east: f64) -> Option<[f64; 3]> {
        Some([meters_east / M_PER_DEG, 0.0, 500.0])
    }

    fn raw(coordinates: Vec<Option<[f64; 3]>>, rel_micros: Vec<i64>) -> RawRecord {
        let absolute = rel_micros
            .iter()
            .map(|rel| 1_600_000_000_000_000 + rel)
            .collect();
        RawRecord {
            geometry: RawGeometry { coordinates },
            properties: RawProperties {
                absolute_utc_micro_sec: absolute,
                relative_utc_micro_sec: rel_micros,
            },
        }
    }

    fn track(coordinates: Vec<Option<[f64; 3]>>, rel_micros: Vec<i64>) -> Track {
        Track::from_record(VideoID(42), raw(coordinates, rel_micros)).unwrap()
    }

    fn assert_aligned(track: &Track) {
        assert_eq!(track.coordinates().len(), track.frames());
        assert_eq!(track.rel_micros().len(), track.frames());
        assert_eq!(track.time_s().len(), track.frames());
        assert_eq!(track.speeds_ms().len(), track.frames());
        assert_eq!(track.speeds_kmh().len(), track.frames());
        assert_eq!(track.distances_m().len(), track.frames() - 1);
    }

    #[test]
    fn missing_fix_removed_and_ids_stay_dense() {
        let coords = vec![pos(0.0), pos(5.0), None, pos(15.0), pos(20.0)];
        let track = track(coords, vec![0, 500, 1000, 1500, 2000]);

        assert_eq!(track.frames(), 4);
        assert_eq!(track.removed_absent(), 1);
        assert_eq!(track.removed_outliers(), 0);
        assert_aligned(&track);
        // The hole closed up; frame 2 is now the old frame 3
        assert!((track.coordinates()[2][0] * M_PER_DEG - 15.0).abs() < 0.01);
        assert_eq!(track.rel_micros(), &[0, 500, 1500, 2000]);
    }

    #[test]
    fn single_spike_removed() {
        // One fix jumps 50 m off the line and comes back
        let coords = vec![pos(0.0), pos(5.0), pos(55.0), pos(10.0), pos(15.0)];
        let track = track(coords, vec![0, 500, 1000, 1500, 2000]);

        assert_eq!(track.frames(), 4);
        assert_eq!(track.removed_outliers(), 1);
        assert_aligned(&track);
        for d in track.distances_m() {
            assert!(*d <= OUTLIER_JUMP_M);
        }
    }

    #[test]
    fn level_shift_cascades_backwards() {
        // A permanent 50 m shift: everything before it is dropped, since
        // each predecessor in turn lands too far from the surviving tail
        let coords = vec![pos(0.0), pos(5.0), pos(10.0), pos(60.0), pos(65.0), pos(70.0)];
        let track = track(coords, vec![0, 500, 1000, 1500, 2000, 2500]);

        assert_eq!(track.frames(), 3);
        assert_eq!(track.removed_outliers(), 3);
        assert!((track.coordinates()[0][0] * M_PER_DEG - 60.0).abs() < 0.01);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let coords = vec![pos(0.0), pos(5.0), None, pos(55.0), pos(10.0), pos(15.0)];
        let first = track(coords, vec![0, 500, 1000, 1500, 2000, 2500]);

        let again = Track::from_record(
            VideoID(42),
            raw(
                first.coordinates().iter().map(|c| Some(*c)).collect(),
                first.rel_micros().to_vec(),
            ),
        )
        .unwrap();
        assert_eq!(again.frames(), first.frames());
        assert_eq!(again.removed_absent(), 0);
        assert_eq!(again.removed_outliers(), 0);
    }

    #[test]
    fn windowed_speed_on_a_steady_track() {
        // 5 m per frame, 0.5 time units per frame => 10 m/s everywhere
        let track = track(
            vec![pos(0.0), pos(5.0), pos(10.0)],
            vec![0, 500, 1000],
        );
        assert_eq!(track.time_s(), &[0.0, 0.5, 1.0]);
        for (ms, kmh) in track.speeds_ms().iter().zip(track.speeds_kmh()) {
            assert!((ms - 10.0).abs() < 0.01, "got {} m/s", ms);
            assert!((kmh - 36.0).abs() < 0.05);
        }
    }

    #[test]
    fn zero_elapsed_window_is_an_error() {
        let result = Track::from_record(
            VideoID(42),
            raw(vec![pos(0.0), pos(5.0)], vec![100, 100]),
        );
        assert!(matches!(
            result,
            Err(TrackError::UndefinedSpeed { frame: 0 })
        ));
    }

    #[test]
    fn too_few_frames_is_an_error() {
        let result = Track::from_record(VideoID(7), raw(vec![None, pos(0.0), None], vec![0, 1, 2]));
        assert!(matches!(
            result,
            Err(TrackError::NoUsableFrames { frames: 1, .. })
        ));
    }

    #[test]
    fn static_cluster_trimmed_out() {
        // 6 frames all within a meter; with a +/-2 frame window, the two
        // middle frames are judged and removed
        let coords = (0..6).map(|i| pos(i as f64 * 0.1)).collect();
        let mut track = track(coords, vec![0, 100, 200, 300, 400, 500]);
        track.remove_no_movement(2, 3.0).unwrap();

        assert_eq!(track.frames(), 4);
        assert_eq!(track.removed_no_movement(), 2);
        assert_aligned(&track);
        // Edge frames are never judged or re-based
        assert_eq!(track.rel_micros(), &[0, 100, 400, 500]);
        for pair in track.rel_micros().windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn survivors_shift_back_over_the_hole() {
        // A stop at the start, then steady movement: frames after the
        // excised stop get their timestamps pulled back, edges stay put
        let mut coords: Vec<Option<[f64; 3]>> = (0..6).map(|i| pos(i as f64 * 0.1)).collect();
        for i in 0..6 {
            coords.push(pos(0.5 + (i + 1) as f64 * 5.0));
        }
        let rel: Vec<i64> = (0..12).map(|i| i * 100).collect();
        let mut track = track(coords, rel);
        track.remove_no_movement(2, 3.0).unwrap();

        assert_eq!(track.removed_no_movement(), 1);
        assert_eq!(track.frames(), 11);
        assert_eq!(
            track.rel_micros(),
            &[0, 100, 200, 300, 400, 500, 600, 700, 800, 1000, 1100]
        );
        assert_eq!(track.abs_micros()[3], 1_600_000_000_000_000 + 300);
        assert!((track.time_s()[3] - 0.3).abs() < 1e-9);
        for pair in track.rel_micros().windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_aligned(&track);
    }

    #[test]
    fn short_track_left_alone_by_trimmer() {
        let mut track = track(vec![pos(0.0), pos(0.1), pos(0.2)], vec![0, 100, 200]);
        track.remove_no_movement(2, 3.0).unwrap();
        assert_eq!(track.frames(), 3);
        assert_eq!(track.removed_no_movement(), 0);
    }

    #[test]
    fn stats_accessors() {
        let track = track(
            vec![pos(0.0), pos(5.0), pos(10.0), pos(15.0)],
            vec![0, 500, 1000, 1500],
        );
        assert!((track.total_distance_m() - 15.0).abs() < 0.01);
        assert!(track.max_speed_kmh() > 0.0);
        assert!(track.mean_speed_kmh() > 0.0);
        assert_eq!(
            track.start_time_utc().unwrap().timestamp(),
            1_600_000_000
        );
    }
}
