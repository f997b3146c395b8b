//! Per-pixel reducers.
//!
//! Both reducers take one sample per source frame at a single pixel position
//! and return the combined value. Sums are accumulated in `f64`, everything
//! else stays in `f32`, so results are reproducible bit for bit.


use crate::config::SigmaClip;

/// Mean after discarding one minimum and one maximum sample.
///
/// Returns `0.0` for fewer than three samples, where no combination is possible.
/// When several samples tie for an extremum only one of them is excluded.
pub fn minmax_clip(values: &[f32]) -> f32 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut sum = 0.0f64;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
        sum += v as f64;
    }

    ((sum - min as f64 - max as f64) / (n - 2) as f64) as f32
}

/// Iterative average sigma clip with the min-max excluded mean as center.
///
/// Returns `0.0` for fewer than three samples.
pub fn sigma_clip_mean(values: &[f32], clip: SigmaClip) -> f32 {
    sigma_clip_with_stats(values, clip).value
}

/// Result of one [`sigma_clip_with_stats`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipOutcome {
    /// Combined value.
    pub value: f32,
    /// Samples inside the bounds of the last iteration.
    pub surviving: usize,
    /// Number of clipping passes performed.
    pub iterations: usize,
    /// Exclusive `(low, high)` acceptance bounds of the last pass.
    pub bounds: (f32, f32),
}

/// Running population statistics of the samples inside the current bounds.
struct Population {
    sum: f64,
    sum_sq: f64,
    min: f32,
    max: f32,
    count: usize,
}

impl Population {
    fn collect(values: &[f32], accept: impl Fn(f32) -> bool) -> Self {
        let mut pop = Self {
            sum: 0.0,
            sum_sq: 0.0,
            min: f32::MAX,
            max: f32::MIN,
            count: 0,
        };
        for &t in values {
            if accept(t) {
                pop.sum += t as f64;
                pop.sum_sq += (t * t) as f64;
                if pop.min > t {
                    pop.min = t;
                }
                if pop.max < t {
                    pop.max = t;
                }
                pop.count += 1;
            }
        }
        pop
    }

    /// Sum with the extreme pair removed.
    fn trimmed_sum(&self) -> f64 {
        self.sum - self.min as f64 - self.max as f64
    }
}

/// Average sigma clip, also reporting how many samples survived.
///
/// Each pass computes `mean` and `rms` over the current population with its
/// extreme pair removed, then keeps the samples strictly inside
/// `(mean - low * rms, mean + high * rms)`. Passes repeat while the surviving
/// count strictly decreases and stays above three. If more than three samples
/// survive, the result is the min-max clipped mean of the survivors, otherwise
/// the mean of the last pass.
pub fn sigma_clip_with_stats(values: &[f32], clip: SigmaClip) -> ClipOutcome {
    let n = values.len();
    if n < 3 {
        return ClipOutcome {
            value: 0.0,
            surviving: n,
            iterations: 0,
            bounds: (f32::NEG_INFINITY, f32::INFINITY),
        };
    }

    let mut pop = Population::collect(values, |_| true);
    let mut iterations = 0;
    let mut mean;
    let mut bounds;

    loop {
        let count = pop.count;
        let sum_sq = pop.sum_sq - (pop.min * pop.min + pop.max * pop.max) as f64;
        let trimmed = pop.trimmed_sum();
        mean = (trimmed / (count as f64 - 2.0)) as f32;
        // Division by zero for exactly three samples leaves `rms` unusable; the
        // loop exits and `mean` is returned
        let rms = ((sum_sq - trimmed * mean as f64) / (count as f64 - 3.0)).sqrt() as f32;

        let low = mean - clip.low * rms;
        let high = mean + clip.high * rms;

        pop = Population::collect(values, |t| low < t && t < high);
        bounds = (low, high);
        iterations += 1;

        debug_assert!(pop.count <= count);
        if !(pop.count > 3 && count > pop.count) {
            break;
        }
    }

    let value = if pop.count > 3 {
        (pop.trimmed_sum() / (pop.count - 2) as f64) as f32
    } else {
        mean
    };

    ClipOutcome {
        value,
        surviving: pop.count,
        iterations,
        bounds,
    }
}

/// Clipping statistics accumulated over a whole combine run.
#[derive(Debug, Default)]
pub(crate) struct ClipStats {
    total_values: u64,
    clipped_values: u64,
    pixels_with_clipping: u64,
    pixels_fallback: u64,
}

impl ClipStats {
    pub(crate) fn record(&mut self, original_len: usize, outcome: &ClipOutcome) {
        let clipped = original_len.saturating_sub(outcome.surviving);
        self.total_values += original_len as u64;
        self.clipped_values += clipped as u64;
        if clipped > 0 {
            self.pixels_with_clipping += 1;
        }
        if outcome.surviving <= 3 {
            self.pixels_fallback += 1;
        }
    }

    pub(crate) fn log_summary(&self, frame_count: usize) {
        if self.total_values == 0 || frame_count == 0 {
            return;
        }

        let pixel_count = self.total_values / frame_count as u64;
        let clip_percent = 100.0 * self.clipped_values as f64 / self.total_values as f64;
        let pixels_clipped_percent =
            100.0 * self.pixels_with_clipping as f64 / pixel_count as f64;

        tracing::info!(
            "Sigma clipping stats: {:.2}% of values clipped ({} of {})",
            clip_percent,
            self.clipped_values,
            self.total_values
        );
        tracing::debug!(
            "  Pixels with any clipping: {:.2}% ({} of {})",
            pixels_clipped_percent,
            self.pixels_with_clipping,
            pixel_count
        );

        if self.pixels_fallback > 0 {
            tracing::warn!(
                "  {} pixels kept 3 or fewer samples and fell back to the last pass mean",
                self.pixels_fallback
            );
        }

        if clip_percent > 20.0 {
            tracing::warn!(
                "High clipping rate ({:.1}%) - sigma thresholds may be too aggressive",
                clip_percent
            );
        }
    }
}
