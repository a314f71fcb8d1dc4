//! The raw GPS records the extraction tool writes next to each chaptered
//! video: a GeoJSON-shaped file named after the 4-digit video id, with one
//! position and two timestamps per captured frame.

use std::path::Path;

use serde::Deserialize;

use crate::{TrackError, VideoID};

/// One whole extracted file. The three per-frame lists are parallel; a frame
/// without a GPS fix has a null entry in `coordinates` but still carries
/// both timestamps.
#[derive(Clone, Debug, Deserialize)]
pub struct RawRecord {
    pub geometry: RawGeometry,
    pub properties: RawProperties,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawGeometry {
    /// `[longitude, latitude, elevation]` per frame, or null for a missing fix
    pub coordinates: Vec<Option<[f64; 3]>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawProperties {
    #[serde(rename = "AbsoluteUtcMicroSec")]
    pub absolute_utc_micro_sec: Vec<i64>,
    #[serde(rename = "RelativeUtcMicroSec")]
    pub relative_utc_micro_sec: Vec<i64>,
}

impl RawRecord {
    pub fn frames(&self) -> usize {
        self.geometry.coordinates.len()
    }
}

/// The trailing path component must be exactly 4 digits plus `.geojson`;
/// those digits are the video id.
pub fn parse_video_id(path: &Path) -> Result<VideoID, TrackError> {
    let invalid = || TrackError::InvalidSourceIdentifier {
        path: path.display().to_string(),
    };

    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let digits = name.strip_suffix(".geojson").ok_or_else(invalid)?;
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // 4 ASCII digits always fit
    Ok(VideoID(digits.parse().unwrap()))
}

/// Validates the identifier, then reads and parses the whole file. Nothing
/// partial: any failure here means no record at all.
pub fn load(path: &Path) -> Result<(VideoID, RawRecord), TrackError> {
    let video_id = parse_video_id(path)?;
    let bytes = std::fs::read(path)?;
    let record = parse(&bytes)?;
    Ok((video_id, record))
}

pub(crate) fn parse(bytes: &[u8]) -> Result<RawRecord, TrackError> {
    let record: RawRecord =
        serde_json::from_slice(bytes).map_err(|err| TrackError::MalformedSource(err.to_string()))?;

    let frames = record.frames();
    let absolute = record.properties.absolute_utc_micro_sec.len();
    let relative = record.properties.relative_utc_micro_sec.len();
    if absolute != frames || relative != frames {
        return Err(TrackError::MalformedSource(format!(
            "{} coordinates, but {} absolute and {} relative timestamps",
            frames, absolute, relative
        )));
    }

    for pair in record.properties.relative_utc_micro_sec.windows(2) {
        if pair[0] > pair[1] {
            return Err(TrackError::MalformedSource(format!(
                "relative timestamps out of order: {} then {}",
                pair[0], pair[1]
            )));
        }
    }

    Ok(record)
}
