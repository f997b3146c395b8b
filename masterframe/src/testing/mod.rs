//! Testing utilities for masterframe.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rand::prelude::*;

use crate::fits::{EXPTIME_KEY, FitsImage};
use crate::image_size::ImageSize;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Deterministic normally distributed samples (Box-Muller).
pub fn gaussian_samples(n: usize, mean: f32, sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let u1: f32 = rng.random_range(1e-10f32..1.0);
            let u2: f32 = rng.random_range(0.0f32..1.0);
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
            mean + sigma * z
        })
        .collect()
}

/// Write a single-plane float FITS file, optionally with an `EXPTIME` header.
pub fn write_frame(
    dir: &Path,
    name: &str,
    size: ImageSize,
    pixels: &[f32],
    exptime: Option<f32>,
) -> PathBuf {
    let path = dir.join(name);
    let mut image = FitsImage::create(&path, size).unwrap();
    image.write_image(pixels).unwrap();
    if let Some(exptime) = exptime {
        image
            .write_key(EXPTIME_KEY, exptime, "Exposure duration")
            .unwrap();
    }
    path
}

/// Write one constant-valued frame per entry of `values`, named `{prefix}{index}.fit`.
pub fn write_constant_frames(
    dir: &Path,
    prefix: &str,
    size: ImageSize,
    values: &[f32],
) -> Vec<PathBuf> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            write_frame(
                dir,
                &format!("{prefix}{i}.fit"),
                size,
                &vec![v; size.pixel_count()],
                None,
            )
        })
        .collect()
}

/// Write one frame per pixel buffer, each with the given exposure time.
pub fn write_frames(
    dir: &Path,
    prefix: &str,
    size: ImageSize,
    frames: &[Vec<f32>],
    exptime: Option<f32>,
) -> Vec<PathBuf> {
    frames
        .iter()
        .enumerate()
        .map(|(i, pixels)| write_frame(dir, &format!("{prefix}{i}.fit"), size, pixels, exptime))
        .collect()
}

/// Read a whole FITS image back.
pub fn read_frame(path: &Path) -> Vec<f32> {
    FitsImage::open(path).unwrap().read_image().unwrap()
}
