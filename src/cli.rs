// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands that run without a window

use std::path::Path;
use std::time::{Duration, Instant};

use depthcloud::Config;
use depthcloud::backends::{BodyTracker, DepthSensor, SyntheticSensor, SyntheticTracker, TrackerWait};
use depthcloud::depth::PointCloudEngine;
use depthcloud::errors::AppError;

/// Print the effective configuration, the calibration and what one
/// reconstructed frame looks like
pub fn show_info(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("depthcloud {}", depthcloud::constants::app_info::version());
    match Config::default_path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();

    let mut sensor = SyntheticSensor::unpaced(config.sensor.calibration());
    let calibration = sensor.calibration();
    let k = calibration.intrinsics;
    println!("Calibration:");
    println!("  Resolution: {}x{}", calibration.width, calibration.height);
    println!("  Focal:      fx={:.2} fy={:.2}", k.fx, k.fy);
    println!("  Principal:  cx={:.2} cy={:.2}", k.cx, k.cy);

    let started = Instant::now();
    let engine = PointCloudEngine::with_projection(&calibration);
    let build_time = started.elapsed();

    if let Some(table) = engine.table() {
        println!("Unprojection table: {} entries ({:?})", table.len(), build_time);
        let corners = [
            (0, 0),
            (0, calibration.width - 1),
            (calibration.height / 2, calibration.width / 2),
            (calibration.height - 1, calibration.width - 1),
        ];
        for (row, col) in corners {
            if let Some(offset) = table.get(row, col) {
                println!(
                    "  [{:>4}, {:>4}] -> ({:+.4}, {:+.4}, {:+.4})",
                    row, col, offset.x, offset.y, offset.z
                );
            }
        }
    }

    let capture = sensor.next_capture(Duration::from_secs(1))?;
    let started = Instant::now();
    let points = engine.reconstruct(capture.depth()).map_err(AppError::from)?;
    let reconstruct_time = started.elapsed();

    let depth = capture.depth();
    println!();
    println!("Synthetic frame:");
    println!(
        "  Valid pixels: {} of {}",
        depth.valid_pixel_count(),
        depth.data().len()
    );
    println!("  Points:       {} ({:?})", points.len(), reconstruct_time);

    if config.tracking.enabled {
        let mut tracker = SyntheticTracker::new(config.tracking.max_bodies);
        tracker.enqueue(&capture)?;
        let bodies = tracker
            .pop_result(TrackerWait::Immediate)?
            .map_or(0, |frame| frame.bodies.len());
        println!("  Bodies:       {}", bodies);
    } else {
        println!("  Bodies:       tracking disabled");
    }

    Ok(())
}

/// Store the default configuration at `path` (or the default location)
pub fn write_config(path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()
            .ok_or_else(|| AppError::Config("no config directory available".into()))?,
    };

    if path.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }

    Config::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
