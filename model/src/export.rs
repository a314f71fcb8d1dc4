//! What the renderers actually read: a per-frame CSV for the video overlay
//! writer, a cleaned GeoJSON feature for map tooling, and the bucket
//! sequence for the 3D animation. All in-memory strings; the caller decides
//! where they land on disk.

use anyhow::Result;
use serde::Serialize;

use crate::resample::BucketSequence;
use crate::track::Track;

#[derive(Serialize)]
struct ExportFrameRow {
    frame: usize,
    longitude: f64,
    latitude: f64,
    elevation: f64,
    x_m: f64,
    y_m: f64,
    time_s: f64,
    speed_ms: f64,
    speed_kmh: f64,
}

pub fn track_to_csv(track: &Track) -> Result<String> {
    let planar = track.planar_coordinates();
    let mut out = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut out);
        for frame in 0..track.frames() {
            let [longitude, latitude, elevation] = track.coordinates()[frame];
            writer.serialize(ExportFrameRow {
                frame,
                longitude,
                latitude,
                elevation,
                x_m: planar[frame][0],
                y_m: planar[frame][1],
                time_s: track.time_s()[frame],
                speed_ms: track.speeds_ms()[frame],
                speed_kmh: track.speeds_kmh()[frame],
            })?;
        }
        writer.flush()?;
    }
    let out = String::from_utf8(out)?;
    Ok(out)
}

pub fn track_to_geojson(track: &Track) -> Result<String> {
    use geojson::{Feature, GeoJson};

    let positions = track.coordinates().iter().map(|pos| pos.to_vec()).collect();
    let mut feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::LineString(
            positions,
        ))),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("video_id", track.video_id().0);
    feature.set_property("speeds_kmh", track.speeds_kmh().to_vec());

    let gj = GeoJson::Feature(feature);
    Ok(serde_json::to_string_pretty(&gj)?)
}

pub fn buckets_to_json(buckets: &BucketSequence) -> Result<String> {
    Ok(serde_json::to_string_pretty(buckets)?)
}
