//! Temporal binning (block-mean downsampling).
//!
//! `bin_1d(x, B)`:
//!   pad = ceil(L / B)·B − L, reflect-padded at the end (numpy `mode="reflect"`)
//!   out[k] = mean(x_pad[k·B .. (k+1)·B])
//!
//! Output length is `ceil(L / B)`.
use ndarray::{Array2, Axis};

use crate::shape::reflect_pad_end;

/// Bin a single signal.  `bin_size` of 0 or 1 returns the input unchanged.
pub fn bin_1d(x: &[f32], bin_size: usize) -> Vec<f32> {
    if bin_size <= 1 || x.is_empty() {
        return x.to_vec();
    }
    let n_bins = x.len().div_ceil(bin_size);
    let pad = n_bins * bin_size - x.len();
    let padded = if pad > 0 { reflect_pad_end(x, pad) } else { x.to_vec() };

    padded
        .chunks_exact(bin_size)
        .map(|chunk| (chunk.iter().map(|&v| v as f64).sum::<f64>() / bin_size as f64) as f32)
        .collect()
}

/// Bin every lane of `data` along `axis`.
pub fn bin_array(data: &Array2<f32>, bin_size: usize, axis: Axis) -> Array2<f32> {
    let lanes: Vec<Vec<f32>> = data
        .lanes(axis)
        .into_iter()
        .map(|lane| bin_1d(&lane.to_vec(), bin_size))
        .collect();
    let n_lanes = lanes.len();
    let n_out = lanes.first().map_or(0, Vec::len);
    let flat: Vec<f32> = lanes.into_iter().flatten().collect();

    let by_lane = Array2::from_shape_vec((n_lanes, n_out), flat)
        .unwrap_or_else(|_| Array2::zeros((n_lanes, n_out)));
    if axis == Axis(1) { by_lane } else { by_lane.reversed_axes() }
}

/// Number of bins produced for a signal of `len` samples.
pub fn binned_len(len: usize, bin_size: usize) -> usize {
    if bin_size <= 1 { len } else { len.div_ceil(bin_size) }
}
