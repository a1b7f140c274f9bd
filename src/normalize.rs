//! Robust normalisation.
//!
//! `normalize_time_domain` — chains / midline / reference → `[19, 2500]`:
//!   1. NaN, ±Inf → 0
//!   2. chains and midline: per-channel mean removed along time
//!   3. s = median(MAD(chains)) + ε            (one global scale, 16 MADs)
//!   4. chains, midline ← clip(x / s, −10, 10)
//!   5. reference ← reference / (MAD(reference) + ε)   (no clip)
//!   6. concat [chains 16, midline 2, reference 1] → [19, T']
//!   7. reconcile to exactly `cfg.eeg_shape`
//!
//! `zscore_axis_inplace` — `(x − mean) / (std + ε)` along one axis (ddof = 0).
use log::debug;
use ndarray::{concatenate, Array, Array2, ArrayBase, Axis, DataMut, Dimension, RemoveAxis};

use crate::config::PipelineConfig;
use crate::montage::TimeChains;
use crate::shape::{reconcile_shape, Reconcile};
use crate::stats::{mad, mad_axis, median, nan_to_zero_inplace};

/// Scales applied by [`normalize_time_domain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EegScale {
    /// Shared divisor of chains and midline.
    pub chain_scale: f32,
    /// Divisor of the reference channel.
    pub reference_scale: f32,
    /// Padding / trimming applied to reach the target shape.
    pub reconcile: Reconcile,
}

/// Normalise the time-domain montage signals into the fixed model tensor.
pub fn normalize_time_domain(tc: TimeChains, cfg: &PipelineConfig) -> (Array2<f32>, EegScale) {
    let TimeChains { mut chains, mut midline, mut reference, .. } = tc;
    nan_to_zero_inplace(&mut chains);
    nan_to_zero_inplace(&mut midline);
    nan_to_zero_inplace(&mut reference);

    demean_lanes_inplace(&mut chains, Axis(2));
    demean_lanes_inplace(&mut midline, Axis(1));

    let pair_mads = mad_axis(&chains, Axis(2));
    let chain_scale = median(&pair_mads.iter().copied().collect::<Vec<_>>()) + cfg.eps;
    let clip = cfg.clip;
    chains.mapv_inplace(|v| (v / chain_scale).clamp(-clip, clip));
    midline.mapv_inplace(|v| (v / chain_scale).clamp(-clip, clip));

    let reference_scale = mad(&reference.iter().copied().collect::<Vec<_>>()) + cfg.eps;
    reference.mapv_inplace(|v| v / reference_scale);

    let (n_c, n_p, n_t) = chains.dim();
    let chains = chains
        .into_shape_with_order((n_c * n_p, n_t))
        .unwrap_or_else(|_| Array2::zeros((n_c * n_p, n_t)));
    let stacked = concatenate(Axis(0), &[chains.view(), midline.view(), reference.view()])
        .unwrap_or_else(|_| Array2::zeros((n_c * n_p + 3, n_t)));

    let (mut out, reconcile) = reconcile_shape(&stacked, cfg.eeg_shape);
    let replaced = nan_to_zero_inplace(&mut out);
    if replaced > 0 {
        debug!("{replaced} non-finite values after reference scaling replaced by 0");
    }

    (out, EegScale { chain_scale, reference_scale, reconcile })
}

/// Subtract the mean of every lane along `axis`.
pub fn demean_lanes_inplace<S, D>(data: &mut ArrayBase<S, D>, axis: Axis)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    for mut lane in data.lanes_mut(axis) {
        let n = lane.len();
        if n == 0 {
            continue;
        }
        let m = (lane.iter().map(|&v| v as f64).sum::<f64>() / n as f64) as f32;
        lane.mapv_inplace(|v| v - m);
    }
}

/// Z-score every lane along `axis`: `(x − μ) / (σ + eps)`, σ with ddof = 0.
///
/// Returns the per-lane `(mean, std)` with `axis` removed.
pub fn zscore_axis_inplace<S, D>(
    data: &mut ArrayBase<S, D>,
    axis: Axis,
    eps: f32,
) -> (Array<f32, D::Smaller>, Array<f32, D::Smaller>)
where
    S: DataMut<Elem = f32>,
    D: Dimension + RemoveAxis,
{
    let mean = data.map_axis(axis, |lane| {
        (lane.iter().map(|&v| v as f64).sum::<f64>() / lane.len().max(1) as f64) as f32
    });
    let std = data.map_axis(axis, |lane| {
        let n = lane.len().max(1) as f64;
        let m = lane.iter().map(|&v| v as f64).sum::<f64>() / n;
        (lane.iter().map(|&v| (v as f64 - m).powi(2)).sum::<f64>() / n).sqrt() as f32
    });

    for ((mut lane, &m), &s) in data.lanes_mut(axis).into_iter().zip(mean.iter()).zip(std.iter()) {
        lane.mapv_inplace(|v| (v - m) / (s + eps));
    }
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn chains_fixture(n_t: usize) -> TimeChains {
        TimeChains {
            chains: Array3::from_shape_fn((4, 4, n_t), |(c, p, t)| {
                ((c * 4 + p) as f32 * 0.3 + t as f32 * 0.05).sin() * 80.0 + 5.0
            }),
            midline: Array2::from_shape_fn((2, n_t), |(m, t)| ((m + t) as f32 * 0.11).cos() * 40.0),
            reference: Array2::from_shape_fn((1, n_t), |(_, t)| (t as f32 * 0.2).sin() * 500.0),
            degraded: vec![],
        }
    }

    #[test]
    fn output_shape_and_clip() {
        let (out, scale) = normalize_time_domain(chains_fixture(2500), &PipelineConfig::default());
        assert_eq!(out.dim(), (19, 2500));
        assert_eq!(scale.reconcile, Reconcile::Exact);
        for &v in out.slice(ndarray::s![..18, ..]).iter() {
            assert!((-10.0..=10.0).contains(&v));
        }
    }

    #[test]
    fn non_finite_inputs_are_cleaned() {
        let mut tc = chains_fixture(700);
        tc.chains[[0, 0, 3]] = f32::NAN;
        tc.midline[[1, 9]] = f32::INFINITY;
        tc.reference[[0, 0]] = f32::NEG_INFINITY;
        let (out, _) = normalize_time_domain(tc, &PipelineConfig::default());
        assert_eq!(out.dim(), (19, 2500));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn all_zero_input_stays_zero() {
        let tc = TimeChains {
            chains: Array3::zeros((4, 4, 2500)),
            midline: Array2::zeros((2, 2500)),
            reference: Array2::zeros((1, 2500)),
            degraded: vec![],
        };
        let (out, scale) = normalize_time_domain(tc, &PipelineConfig::default());
        approx::assert_abs_diff_eq!(scale.chain_scale, 1e-5);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn demean_removes_lane_mean() {
        let mut a = Array2::from_shape_fn((3, 50), |(c, t)| c as f32 * 10.0 + t as f32);
        demean_lanes_inplace(&mut a, Axis(1));
        for row in a.rows() {
            approx::assert_abs_diff_eq!(row.mean().unwrap(), 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn zscore_along_frequency_axis() {
        let mut x = Array3::from_shape_fn((4, 96, 10), |(c, f, t)| (c + 2 * f + t) as f32);
        let (mean, std) = zscore_axis_inplace(&mut x, Axis(1), 1e-5);
        assert_eq!(mean.dim(), (4, 10));
        assert!(std.iter().all(|&s| s > 0.0));
        let lane = x.slice(ndarray::s![2, .., 7]);
        approx::assert_abs_diff_eq!(lane.mean().unwrap(), 0.0, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(lane.std(0.0), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn zscore_constant_lane_no_panic() {
        let mut x = Array2::from_elem((2, 16), 7.0_f32);
        let (_, std) = zscore_axis_inplace(&mut x, Axis(1), 1e-5);
        assert!(std.iter().all(|&s| s == 0.0));
        assert!(x.iter().all(|&v| v == 0.0));
    }
}
