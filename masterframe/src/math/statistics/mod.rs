//! Sample-based robust level estimation.


/// Maximum number of samples used by [`sample_median`].
pub const SAMPLE_SIZE: usize = 10_000;

/// Robust typical level of an image: the median of a bounded sub-sample.
///
/// When `data.len() <= SAMPLE_SIZE` every value is used and the result is the
/// exact median (the element of rank `n / 2`, i.e. the upper median for even
/// lengths). Larger inputs are sub-sampled: the first index is
/// `(n % SAMPLE_SIZE) / 2`, subsequent indices are `floor(k * step)` with `step`
/// accumulated in `f32`. The accumulation drift is part of the contract, so the
/// same input always yields the same sample and the same value.
///
/// Does not modify `data`.
pub fn sample_median(data: &[f32]) -> f32 {
    debug_assert!(!data.is_empty());

    let n = data.len();
    let sample_len = n.min(SAMPLE_SIZE);

    let mut sample: Vec<f32> = if sample_len == n {
        data.to_vec()
    } else {
        let step = (n as f64 / sample_len as f64) as f32;
        let mut offset = (n % sample_len) / 2;
        let mut pos = 0.0f32;
        let mut sample = Vec::with_capacity(sample_len + 1);
        while offset < n {
            sample.push(data[offset]);
            pos += step;
            offset = pos as usize;
        }
        sample
    };

    let mid = (sample_len / 2).min(sample.len() - 1);
    let (_, median, _) = sample.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}
