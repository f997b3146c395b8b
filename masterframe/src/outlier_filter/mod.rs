//! Local outlier replacement.
//!
//! Pixels outside `median ± sigma * rms` of the whole image are replaced by a
//! trimmed mean of their 5x5 neighborhood. Global statistics use the same
//! min-max exclusion as the per-pixel reducers, in a single pass.
//!
//! Neighborhoods are always read from an untouched copy of the input, so a
//! replacement never feeds into another replacement of the same pass.

#[cfg(test)]
mod tests;

use crate::image_size::ImageSize;
use crate::math::statistics::sample_median;

/// Half-width of the replacement window (5x5).
pub const WINDOW_RADIUS: usize = 2;

/// Replace statistical outliers in place and return how many pixels were replaced.
///
/// Images with fewer than four pixels are left untouched.
///
/// # Panics
/// Panics if `data.len()` is not `size.pixel_count()`.
pub fn remove_noise(data: &mut [f32], size: ImageSize, sigma: f32) -> usize {
    assert_eq!(data.len(), size.pixel_count(), "Pixel count mismatch");

    let pixels = data.len();
    if pixels < 4 {
        return 0;
    }

    let original = data.to_vec();
    let median = sample_median(&original);

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &t in &original {
        sum += t as f64;
        sum_sq += (t * t) as f64;
        if min > t {
            min = t;
        }
        if max < t {
            max = t;
        }
    }
    sum -= (min + max) as f64;
    sum_sq -= (min * min + max * max) as f64;
    let mean = (sum / (pixels - 2) as f64) as f32;
    let rms = ((sum_sq - sum * mean as f64) / (pixels - 3) as f64).sqrt() as f32;

    let low = (median as f64 - sigma as f64 * rms as f64) as f32;
    let high = (median as f64 + sigma as f64 * rms as f64) as f32;

    tracing::debug!(
        "Outlier filter: median={:.4}, mean={:.4}, rms={:.4}, bounds=[{:.4}, {:.4}]",
        median,
        mean,
        rms,
        low,
        high
    );

    let mut replaced = 0;
    for row in 0..size.height {
        for col in 0..size.width {
            let i = row * size.width + col;
            let t = data[i];
            if (low > t || high < t)
                && let Some(value) = neighborhood_mean(&original, size, col, row)
            {
                data[i] = value;
                replaced += 1;
            }
        }
    }

    if replaced > 0 {
        tracing::info!(
            "Replaced {} outlier pixels ({:.3}%)",
            replaced,
            100.0 * replaced as f64 / pixels as f64
        );
    }

    replaced
}

/// Trimmed mean of the 5x5 window around `(col, row)`, clipped at the image edges.
///
/// Computes `(sum - min - max - center) / (count - 3)` where `count` is the
/// number of window samples. The denominator subtracts three even for clipped
/// windows, and the center is removed on top of the window extrema even when it
/// is one of them. Returns `None` when the window holds three samples or fewer.
pub fn neighborhood_mean(data: &[f32], size: ImageSize, col: usize, row: usize) -> Option<f32> {
    debug_assert!(col < size.width && row < size.height);

    let r1 = row.saturating_sub(WINDOW_RADIUS);
    let r2 = (row + WINDOW_RADIUS).min(size.height - 1);
    let c1 = col.saturating_sub(WINDOW_RADIUS);
    let c2 = (col + WINDOW_RADIUS).min(size.width - 1);

    let count = (r2 - r1 + 1) * (c2 - c1 + 1);
    if count <= 3 {
        return None;
    }

    let center = data[row * size.width + col];
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut sum = 0.0f64;
    for r in r1..=r2 {
        let line = &data[r * size.width + c1..=r * size.width + c2];
        for &t in line {
            sum += t as f64;
            if min > t {
                min = t;
            }
            if max < t {
                max = t;
            }
        }
    }

    Some(((sum - min as f64 - max as f64 - center as f64) / (count - 3) as f64) as f32)
}
