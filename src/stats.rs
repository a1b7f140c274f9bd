//! Robust statistics.
//!
//! `mad` — normal-consistent median absolute deviation:
//!   MAD(x) = 1.4826 · median(|x − median(x)|)
//!
//! Medians follow numpy: the mean of the two middle elements for even
//! lengths.  A constant input yields MAD = 0; callers add an epsilon before
//! dividing.
use ndarray::{Array, ArrayBase, Axis, Data, Dimension, RemoveAxis};

/// Scale factor making MAD a consistent estimator of σ for Gaussian data.
pub const MAD_SCALE: f32 = 1.4826;

/// Median of a slice (numpy semantics).  Returns `0.0` for an empty slice.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut buf = values.to_vec();
    median_inplace(&mut buf)
}

/// Median that reorders `buf` in place instead of allocating.
pub fn median_inplace(buf: &mut [f32]) -> f32 {
    let n = buf.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    let (lower, upper, _) = buf.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return upper;
    }
    // The largest element left of `mid` is the other middle value.
    let lower_max = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    ((lower_max as f64 + upper as f64) / 2.0) as f32
}

/// MAD of a 1-D signal.
pub fn mad(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let med = median(values);
    let mut dev: Vec<f32> = values.iter().map(|&v| (v - med).abs()).collect();
    median_inplace(&mut dev) * MAD_SCALE
}

/// MAD along `axis`; the axis is removed from the output shape.
///
/// `mad_axis(&x, Axis(x.ndim() - 1))` on a `[4, 4, T]` chain stack gives the
/// `[4, 4]` per-pair scales.
pub fn mad_axis<S, D>(data: &ArrayBase<S, D>, axis: Axis) -> Array<f32, D::Smaller>
where
    S: Data<Elem = f32>,
    D: Dimension + RemoveAxis,
{
    data.map_axis(axis, |lane| {
        let v: Vec<f32> = lane.iter().copied().collect();
        mad(&v)
    })
}

/// Mean after discarding `proportion` of the samples from each tail.
///
/// Matches `scipy.stats.trim_mean`: `floor(proportion · n)` values are cut
/// from each end of the sorted data.
pub fn trimmed_mean(values: &[f32], proportion: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f32::total_cmp);
    let cut = ((proportion.clamp(0.0, 0.5) * sorted.len() as f32) as usize).min((sorted.len() - 1) / 2);
    let kept = &sorted[cut..sorted.len() - cut];
    (kept.iter().map(|&v| v as f64).sum::<f64>() / kept.len() as f64) as f32
}

/// Replace NaN and ±Inf with zero.  Returns the number of values replaced.
pub fn nan_to_zero_inplace<S, D>(data: &mut ArrayBase<S, D>) -> usize
where
    S: ndarray::DataMut<Elem = f32>,
    D: Dimension,
{
    let mut n = 0;
    data.map_inplace(|v| {
        if !v.is_finite() {
            *v = 0.0;
            n += 1;
        }
    });
    n
}
