//! Example: Create master bias, dark and flat frames and calibrate light frames
//!
//! This example reads raw exposures from MASTERFRAME_CALIBRATION_DIR, writes
//! `ZERO.fit`, `DARK.fit` and `FLAT.fit` next to them and calibrates the light
//! frames into test_output/calibrated_lights (or MASTERFRAME_OUTPUT_DIR).
//!
//! # Directory Structure
//!
//! Expected input structure (file name prefixes select each batch):
//! ```text
//! $MASTERFRAME_CALIBRATION_DIR/
//!   bias_001.fit, bias_002.fit, ...
//!   dark_001.fit, dark_002.fit, ...   (with EXPTIME)
//!   flat_001.fit, flat_002.fit, ...
//!   light_001.fit, light_002.fit, ... (optional)
//! ```
//!
//! # Usage
//!
//! ```bash
//! MASTERFRAME_CALIBRATION_DIR=/path/to/calibration cargo run --example create_calibration_masters
//! ```
//!
//! Set MASTERFRAME_CONFIG to a YAML file to override the combine parameters.

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use masterframe::{CalibrationCombiner, CombineConfig, MasterRole};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();

    let calibration_dir = env::var("MASTERFRAME_CALIBRATION_DIR")
        .map(PathBuf::from)
        .context("MASTERFRAME_CALIBRATION_DIR environment variable must be set")?;
    tracing::info!(path = %calibration_dir.display(), "Calibration directory");

    let config = match env::var("MASTERFRAME_CONFIG") {
        Ok(path) => CombineConfig::from_yaml_file(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        Err(_) => CombineConfig::default(),
    };
    let start = Instant::now();
    let mut combiner = CalibrationCombiner::new(config);
    tracing::info!(config = ?combiner.config(), "Combine configuration");

    for (role, prefix) in [
        (MasterRole::Zero, "bias_"),
        (MasterRole::Dark, "dark_"),
        (MasterRole::Flat, "flat_"),
    ] {
        let result = match role {
            MasterRole::Zero => combiner.combine_zero(&calibration_dir, prefix),
            MasterRole::Dark => combiner.combine_dark(&calibration_dir, prefix),
            MasterRole::Flat => combiner.combine_flat(&calibration_dir, prefix),
        };
        match result {
            Ok(path) => tracing::info!(%role, path = %path.display(), "Master created"),
            Err(e) => tracing::warn!(%role, error = %e, "No master created"),
        }
    }

    let state = combiner.state();
    tracing::info!(
        zero = state.valid_zero,
        dark = state.valid_dark,
        flat = state.valid_flat,
        elapsed_secs = start.elapsed().as_secs_f32(),
        "Calibration masters complete"
    );

    let output_dir = env::var("MASTERFRAME_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("test_output/calibrated_lights"));
    let written = combiner
        .calibrate_directory(&calibration_dir, "light_", &output_dir)
        .context("Failed to calibrate light frames")?;

    println!("\nCalibrated lights ({}):", written.len());
    for path in &written {
        println!("  {}", path.display());
    }

    Ok(())
}

/// Initialize tracing subscriber with console output.
fn init_tracing() {
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
