//! Maps a variable-rate track onto the fixed cadence of an output video.
//! Each renderer asks for its own cadence, so this never touches the track;
//! it just derives a fresh bucket sequence per request.

use serde::Serialize;

use crate::track::Track;

#[derive(Clone, Copy, Debug)]
pub struct ResampleParams {
    pub output_fps: f64,
    /// How many times faster than the recording the output should play
    pub speedup_factor: f64,
    /// How long the final state is held at the end, e.g. for a circling
    /// camera to finish one revolution
    pub revolution_duration_s: f64,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            output_fps: 30.0,
            speedup_factor: 1.0,
            revolution_duration_s: 1.0,
        }
    }
}

/// The source frames one output frame is responsible for, in order, without
/// duplicates. Never empty: a window with no new source frames still carries
/// the frame the previous bucket ended on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputFrameBucket {
    frames: Vec<usize>,
}

impl OutputFrameBucket {
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    /// The last source frame of the bucket: everything up to here should be
    /// visible once this output frame renders
    pub fn representative(&self) -> usize {
        *self.frames.last().unwrap()
    }

    fn push(&mut self, frame: usize) {
        if self.frames.last() != Some(&frame) {
            self.frames.push(frame);
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BucketSequence {
    buckets: Vec<OutputFrameBucket>,
    hold_tail: usize,
}

impl BucketSequence {
    /// Total output frames, hold tail included
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> &[OutputFrameBucket] {
        &self.buckets
    }

    /// How many trailing buckets just repeat the final one
    pub fn hold_tail(&self) -> usize {
        self.hold_tail
    }

    /// The source frame id "visible so far" at an output frame
    pub fn visible_through(&self, output_frame: usize) -> Option<usize> {
        self.buckets.get(output_frame).map(|b| b.representative())
    }
}

impl Track {
    /// Groups source frames into one bucket per output frame. Consecutive
    /// buckets share their boundary frame (the new bucket starts on the
    /// frame the old one ended with), so no bucket is ever empty even when
    /// the source rate drops below the output rate.
    pub fn resample(&self, params: &ResampleParams) -> BucketSequence {
        assert!(
            params.output_fps > 0.0 && params.speedup_factor > 0.0,
            "resampling cadence must be positive"
        );
        let seconds_per_output_frame = params.speedup_factor / params.output_fps;
        let time_s = self.time_s();

        let mut buckets = vec![OutputFrameBucket { frames: vec![0] }];
        let mut current_time = time_s[0];
        for (i, &t) in time_s.iter().enumerate() {
            if t < current_time + seconds_per_output_frame {
                buckets.last_mut().unwrap().push(i);
            } else {
                while t >= current_time + seconds_per_output_frame {
                    buckets.push(OutputFrameBucket {
                        frames: vec![i.saturating_sub(1)],
                    });
                    current_time += seconds_per_output_frame;
                }
                buckets.last_mut().unwrap().push(i);
            }
        }

        let hold_tail = (params.revolution_duration_s * params.output_fps).round() as usize;
        for _ in 0..hold_tail {
            buckets.push(buckets.last().unwrap().clone());
        }

        BucketSequence { buckets, hold_tail }
    }
}
