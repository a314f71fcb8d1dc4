use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use log::{info, warn};
use structopt::StructOpt;
use walkdir::WalkDir;

use model::{QualityThresholds, ResampleParams, Track};

#[derive(StructOpt)]
#[structopt(name = "gpstrack", about = "Work with GPS tracks extracted from GoPro videos")]
enum Command {
    /// Summarize one extracted track
    Stats {
        /// The path to an extracted .geojson file, named by 4-digit video id
        geojson: PathBuf,
        /// Drop stretches with no movement first
        #[structopt(long)]
        remove_no_movement: bool,
    },
    /// Recursively find tracks worth rendering
    Scan {
        /// The directory containing extracted .geojson files
        dir: PathBuf,
    },
    /// Write the renderer inputs (CSV, cleaned GeoJSON, bucket sequence)
    Export {
        /// The path to an extracted .geojson file, named by 4-digit video id
        geojson: PathBuf,
        /// Where to put the output files
        #[structopt(long, default_value = ".")]
        out_dir: PathBuf,
        /// FPS of the output video
        #[structopt(long, default_value = "30")]
        fps: f64,
        /// How many times to speed up playback
        #[structopt(long, default_value = "1")]
        speedup: f64,
        /// Duration of one closing camera revolution in seconds
        #[structopt(long, default_value = "1")]
        revolution_duration: f64,
        /// Drop stretches with no movement first
        #[structopt(long)]
        remove_no_movement: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Command::from_args() {
        Command::Stats {
            geojson,
            remove_no_movement,
        } => stats(&geojson, remove_no_movement),
        Command::Scan { dir } => scan(&dir),
        Command::Export {
            geojson,
            out_dir,
            fps,
            speedup,
            revolution_duration,
            remove_no_movement,
        } => export(
            &geojson,
            &out_dir,
            ResampleParams {
                output_fps: fps,
                speedup_factor: speedup,
                revolution_duration_s: revolution_duration,
            },
            remove_no_movement,
        ),
    }
}

fn load_track(path: &Path, remove_no_movement: bool) -> Result<Track> {
    let mut track = Track::load(path)?;
    if remove_no_movement {
        track.remove_no_movement(
            model::NO_MOVEMENT_FRAME_RANGE,
            model::NO_MOVEMENT_MIN_DISTANCE_M,
        )?;
    }
    Ok(track)
}

fn stats(path: &Path, remove_no_movement: bool) -> Result<()> {
    let track = load_track(path, remove_no_movement)?;

    println!("Video id: {}", track.video_id());
    if let Some(start) = track.start_time_utc() {
        println!("Recording started: {}", start);
    }
    println!("Number of frames: {}", track.frames());
    println!("Distance traveled: {:.0} m", track.total_distance_m());
    println!("Average speed: {:.1} km/h", track.mean_speed_kmh());
    println!("Max speed: {:.1} km/h", track.max_speed_kmh());
    println!("Removed missing fixes: {}", track.removed_absent());
    println!("Removed outliers: {}", track.removed_outliers());
    println!("Removed no-movement frames: {}", track.removed_no_movement());
    Ok(())
}

fn scan(dir: &Path) -> Result<()> {
    let thresholds = QualityThresholds::default();
    let mut interesting = Vec::new();
    let mut skipped = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|e| e.to_str()) != Some("geojson")
        {
            continue;
        }
        // One bad file shouldn't sink the whole sweep
        match Track::load(entry.path()) {
            Ok(track) => {
                if thresholds.accepts(&track) {
                    interesting.push((entry.path().to_path_buf(), track));
                }
            }
            Err(err) => {
                warn!("Skipping {}: {}", entry.path().display(), err);
                skipped += 1;
            }
        }
    }

    info!("{} tracks worth rendering, {} files skipped", interesting.len(), skipped);
    for (path, track) in interesting {
        println!(
            "{}: video {}, {} frames, max {:.1} km/h over {:.0} m",
            path.display(),
            track.video_id(),
            track.frames(),
            track.max_speed_kmh(),
            track.total_distance_m()
        );
    }
    Ok(())
}

fn export(
    path: &Path,
    out_dir: &Path,
    params: ResampleParams,
    remove_no_movement: bool,
) -> Result<()> {
    ensure!(
        params.output_fps > 0.0 && params.speedup_factor > 0.0,
        "--fps and --speedup must be positive"
    );
    ensure!(
        params.revolution_duration_s >= 0.0,
        "--revolution-duration can't be negative"
    );

    let track = load_track(path, remove_no_movement)?;
    fs_err::create_dir_all(out_dir)?;

    let id = track.video_id();
    fs_err::write(out_dir.join(format!("{id}.csv")), model::track_to_csv(&track)?)?;
    fs_err::write(
        out_dir.join(format!("{id}.cleaned.geojson")),
        model::track_to_geojson(&track)?,
    )?;

    let buckets = track.resample(&params);
    fs_err::write(
        out_dir.join(format!("{id}.buckets.json")),
        model::buckets_to_json(&buckets)?,
    )?;

    info!(
        "Wrote renderer inputs for video {} ({} output frames) to {}",
        id,
        buckets.len(),
        out_dir.display()
    );
    Ok(())
}
