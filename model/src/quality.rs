use crate::track::Track;

/// Screens cleaned tracks for ones actually worth rendering: fast enough to
/// be fun, long enough to show a route, and not drowning in GPS spikes.
pub struct QualityThresholds {
    pub min_top_speed_kmh: f64,
    pub min_total_distance_m: f64,
    pub max_outlier_frames: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_top_speed_kmh: 20.0,
            min_total_distance_m: 200.0,
            max_outlier_frames: 30,
        }
    }
}

impl QualityThresholds {
    pub fn accepts(&self, track: &Track) -> bool {
        track.max_speed_kmh() > self.min_top_speed_kmh
            && track.total_distance_m() > self.min_total_distance_m
            && track.removed_outliers() < self.max_outlier_frames
    }
}
