#[macro_use]
extern crate log;

mod export;
mod geo;
mod quality;
mod record;
mod resample;
mod track;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::export::{buckets_to_json, track_to_csv, track_to_geojson};
pub use self::geo::{flatten_to_meters, haversine_m, EARTH_RADIUS_M};
pub use self::quality::QualityThresholds;
pub use self::record::{RawGeometry, RawProperties, RawRecord};
pub use self::resample::{BucketSequence, OutputFrameBucket, ResampleParams};
pub use self::track::{
    Track, NO_MOVEMENT_FRAME_RANGE, NO_MOVEMENT_MIN_DISTANCE_M, OUTLIER_JUMP_M,
    SPEED_WINDOW_HALF_WIDTH,
};

/// The 4-digit id GoPro embeds in chaptered video file names, also used to
/// name the extracted GPS file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VideoID(pub u16);

impl fmt::Display for VideoID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Everything that can go wrong while turning one extracted GPS file into a
/// cleaned track. There's no partial success; a failure anywhere means no
/// track at all.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid source identifier {path}: expected a 4-digit id with a .geojson extension")]
    InvalidSourceIdentifier { path: String },

    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] std::io::Error),

    #[error("malformed source: {0}")]
    MalformedSource(String),

    #[error("{stage} left misaligned arrays: expected {expected} entries, found {actual}")]
    DataIntegrityFault {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("speed window around frame {frame} spans zero elapsed time")]
    UndefinedSpeed { frame: usize },

    #[error("video {video_id}: only {frames} usable frames left after cleaning")]
    NoUsableFrames { video_id: VideoID, frames: usize },
}
