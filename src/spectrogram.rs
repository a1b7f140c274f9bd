//! Time–frequency transforms.
//!
//! Two transforms, one per spectral artifact:
//!
//! * [`stft_magnitude`] — matches `torchaudio.transforms.Spectrogram(n_fft,
//!   win_length, hop_length, power=None)` followed by `abs()`:
//!     1. reflect-pad `n_fft / 2` samples on both sides (`center=True`)
//!     2. periodic Hann window of `win` samples, zero-padded to the middle of
//!        an `n_fft` frame
//!     3. one frame every `hop` samples → `1 + L / hop` frames
//!     4. |rfft| → `[n_fft / 2 + 1, frames]`
//!
//! * [`density_spectrogram`] — matches `scipy.signal.spectrogram(x, fs,
//!   nperseg, noverlap, nfft, scaling="density")` with the default periodic
//!   Tukey(0.25) window and per-segment constant detrend:
//!     Sxx[f, k] = c_f · |FFT(w · (x_k − mean(x_k)))[f]|² / (fs · Σw²)
//!   where `c_f = 2` except at DC and (even `nfft`) Nyquist.
//!
//! [`chain_spectrogram`] turns the spectral-branch chains into the
//! `[4, 96, frames]` stack the legacy normaliser consumes:
//!   s      = mean(MAD(valid pairs)) + ε
//!   S_pair = ln(clip(|STFT(x / s)|[2..98] / 15, e⁻⁴, e⁷))
//!   S_c    = mean over the valid pairs of chain c
use log::warn;
use ndarray::{s, Array2, Array3};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use crate::config::PipelineConfig;
use crate::montage::{SpectralChains, CHAINS};
use crate::shape::reflect_index;
use crate::stats::mad;

/// Periodic Hann window (`torch.hann_window(n)`).
pub fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Periodic Tukey window (`scipy.signal.get_window(("tukey", alpha), n)`).
pub fn tukey_periodic(n: usize, alpha: f64) -> Vec<f64> {
    let mut w = tukey_symmetric(n + 1, alpha);
    w.truncate(n);
    w
}

fn tukey_symmetric(m: usize, alpha: f64) -> Vec<f64> {
    if m <= 1 {
        return vec![1.0; m];
    }
    if alpha <= 0.0 {
        return vec![1.0; m];
    }
    let n_max = (m - 1) as f64;
    let width = (alpha * n_max / 2.0).floor() as usize;
    (0..m)
        .map(|i| {
            let n = i as f64;
            if i <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * n / (alpha * n_max))).cos())
            } else if i < m - 1 - width {
                1.0
            } else {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * n / (alpha * n_max))).cos())
            }
        })
        .collect()
}

/// Number of STFT frames for a centred transform.
pub fn stft_frames(len: usize, hop: usize) -> usize {
    1 + len / hop.max(1)
}

/// Magnitude STFT of `x`, shape `[n_fft / 2 + 1, 1 + len / hop]`.
///
/// Reflection continues past the signal edges for very short inputs, so
/// any non-empty signal is accepted.
pub fn stft_magnitude(x: &[f32], win: usize, hop: usize, n_fft: usize) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let n_frames = stft_frames(x.len(), hop);
    let mut out = Array2::<f32>::zeros((n_bins, n_frames));
    if x.is_empty() {
        return out;
    }

    let pad = n_fft / 2;
    let n = x.len() as isize;
    let sample = |i: isize| -> f64 {
        // Position `i` of the padded signal maps to original index `i − pad`.
        let j = i - pad as isize;
        let k = if j < 0 {
            reflect_index(j.unsigned_abs(), x.len())
        } else if j >= n {
            reflect_index(j as usize, x.len())
        } else {
            j as usize
        };
        x[k] as f64
    };

    // Window centred in the n_fft frame.
    let window = hann_periodic(win.min(n_fft));
    let offset = (n_fft - window.len()) / 2;

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut buf = vec![Complex::<f64>::default(); n_fft];

    for frame in 0..n_frames {
        let start = (frame * hop) as isize;
        buf.iter_mut().for_each(|c| *c = Complex::default());
        for (k, &w) in window.iter().enumerate() {
            let i = offset + k;
            buf[i] = Complex { re: sample(start + i as isize) * w, im: 0.0 };
        }
        fft.process(&mut buf);
        for (f, c) in buf[..n_bins].iter().enumerate() {
            out[[f, frame]] = c.norm() as f32;
        }
    }
    out
}

/// Number of segments [`density_spectrogram`] produces.
pub fn density_segments(len: usize, nperseg: usize, noverlap: usize) -> usize {
    if len < nperseg || nperseg <= noverlap {
        return 0;
    }
    (len - noverlap) / (nperseg - noverlap)
}

/// Power spectral density per segment, shape `[nfft / 2 + 1, segments]`.
///
/// `nperseg` is clamped to the signal length (scipy does the same).  The
/// result has zero columns when the signal is empty.
pub fn density_spectrogram(
    x: &[f32],
    fs: f32,
    nperseg: usize,
    noverlap: usize,
    nfft: usize,
) -> Array2<f32> {
    let nperseg = nperseg.min(x.len());
    let noverlap = noverlap.min(nperseg.saturating_sub(1));
    let nfft = nfft.max(nperseg);
    let n_bins = nfft / 2 + 1;
    let n_seg = density_segments(x.len(), nperseg, noverlap);
    let mut out = Array2::<f32>::zeros((n_bins, n_seg));
    if n_seg == 0 {
        return out;
    }

    let window = tukey_periodic(nperseg, 0.25);
    let win_pow: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs as f64 * win_pow);
    let step = nperseg - noverlap;

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut buf = vec![Complex::<f64>::default(); nfft];

    for seg in 0..n_seg {
        let chunk = &x[seg * step..seg * step + nperseg];
        let mean = chunk.iter().map(|&v| v as f64).sum::<f64>() / nperseg as f64;

        buf.iter_mut().for_each(|c| *c = Complex::default());
        for (b, (&v, &w)) in buf.iter_mut().zip(chunk.iter().zip(window.iter())) {
            b.re = (v as f64 - mean) * w;
        }
        fft.process(&mut buf);

        for (f, c) in buf[..n_bins].iter().enumerate() {
            let one_sided = if f == 0 || (nfft % 2 == 0 && f == nfft / 2) { 1.0 } else { 2.0 };
            out[[f, seg]] = (c.norm_sqr() * scale * one_sided) as f32;
        }
    }
    out
}

/// Clip `v` to `[e^lo, e^hi]` and take the natural log.
pub fn log_clip(v: f32, (lo, hi): (f32, f32)) -> f32 {
    v.clamp(lo.exp(), hi.exp()).ln()
}

/// Per-chain log-STFT stack, `[4, stft_bins, frames]`.
///
/// Chains whose pairs were all zero-filled stay zero and are listed in the
/// second return value.
pub fn chain_spectrogram(sc: &SpectralChains, cfg: &PipelineConfig) -> (Array3<f32>, Vec<&'static str>) {
    let n_t = sc.chains.dim().2;
    let n_frames = stft_frames(n_t, cfg.stft_hop);
    let (lo, hi) = cfg.stft_bins;
    let n_bins = cfg.stft_bin_count();
    let mut out = Array3::<f32>::zeros((CHAINS.len(), n_bins, n_frames));
    let mut empty = Vec::new();

    let valid_mads: Vec<f32> = sc
        .valid
        .indexed_iter()
        .filter(|&(_, &ok)| ok)
        .map(|((c, p), _)| mad(&sc.chains.slice(s![c, p, ..]).to_vec()))
        .collect();
    let scale = if valid_mads.is_empty() {
        1.0
    } else {
        valid_mads.iter().sum::<f32>() / valid_mads.len() as f32 + cfg.eps
    };

    for (c, chain) in CHAINS.iter().enumerate() {
        let mut acc = Array2::<f32>::zeros((n_bins, n_frames));
        let mut used = 0usize;
        for p in 0..chain.pairs.len() {
            if !sc.valid[[c, p]] {
                continue;
            }
            let x: Vec<f32> = sc.chains.slice(s![c, p, ..]).iter().map(|&v| v / scale).collect();
            let mag = stft_magnitude(&x, cfg.stft_win, cfg.stft_hop, cfg.stft_nfft);
            let hi = hi.min(mag.nrows());
            let band = mag.slice(s![lo.min(hi)..hi, ..]);
            acc.slice_mut(s![..band.nrows(), ..])
                .zip_mut_with(&band, |a, &m| *a += log_clip(m / cfg.stft_scale, cfg.log_clip));
            used += 1;
        }
        if used == 0 {
            warn!("chain {}: no usable pairs, spectrogram left at zero", chain.name);
            empty.push(chain.name);
            continue;
        }
        acc.mapv_inplace(|v| v / used as f32);
        out.slice_mut(s![c, .., ..]).assign(&acc);
    }
    (out, empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_periodic_endpoints() {
        let w = hann_periodic(256);
        approx::assert_abs_diff_eq!(w[0], 0.0);
        approx::assert_abs_diff_eq!(w[128], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn tukey_flat_top_and_tapered_edges() {
        let w = tukey_periodic(128, 0.25);
        assert_eq!(w.len(), 128);
        approx::assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(w[64], 1.0);
        assert!(w[5] > 0.0 && w[5] < 1.0);
        // Periodic window: w[i] == w[n − i].
        approx::assert_abs_diff_eq!(w[3], w[125], epsilon = 1e-12);
    }

    #[test]
    fn stft_shape_matches_torchaudio() {
        let x: Vec<f32> = (0..10_000).map(|i| (i as f32 * 0.05).sin()).collect();
        let s = stft_magnitude(&x, 256, 44, 800);
        assert_eq!(s.dim(), (401, 1 + 10_000 / 44));
    }

    #[test]
    fn stft_peak_at_tone_frequency() {
        // 10 Hz at 200 Hz with n_fft = 800 → bin 10 · 800 / 200 = 40.
        let x: Vec<f32> = (0..4000)
            .map(|i| (2.0 * std::f32::consts::PI * 10.0 * i as f32 / 200.0).sin())
            .collect();
        let s = stft_magnitude(&x, 256, 44, 800);
        let col = s.column(40);
        let peak = col.iter().enumerate().fold((0, 0.0_f32), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(peak.0, 40);
    }

    #[test]
    fn density_segment_count() {
        assert_eq!(density_segments(2500, 128, 64), 38);
        assert_eq!(density_segments(100, 128, 64), 0);
        let x = vec![0.5_f32; 2500];
        assert_eq!(density_spectrogram(&x, 200.0, 128, 64, 1024).dim(), (513, 38));
    }

    #[test]
    fn density_of_sine_integrates_to_power() {
        // ∫ PSD df ≈ variance; a unit sine has variance 0.5.
        let fs = 200.0_f32;
        let x: Vec<f32> = (0..2500)
            .map(|i| (2.0 * std::f32::consts::PI * 12.5 * i as f32 / fs).sin())
            .collect();
        let sxx = density_spectrogram(&x, fs, 128, 64, 1024);
        let df = fs as f64 / 1024.0;
        let power: f64 = sxx.column(10).iter().map(|&v| v as f64).sum::<f64>() * df;
        approx::assert_abs_diff_eq!(power, 0.5, epsilon = 0.05);
    }

    #[test]
    fn log_clip_bounds() {
        approx::assert_abs_diff_eq!(log_clip(0.0, (-4.0, 7.0)), -4.0, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(log_clip(1e9, (-4.0, 7.0)), 7.0, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(log_clip(1.0, (-4.0, 7.0)), 0.0);
    }

    #[test]
    fn chain_stack_shape_and_empty_chain() {
        let cfg = PipelineConfig::default();
        let n_t = 2000;
        let mut valid = Array2::from_elem((4, 4), true);
        valid.row_mut(3).fill(false);
        let sc = SpectralChains {
            chains: Array3::from_shape_fn((4, 4, n_t), |(c, p, t)| ((c + p + 1) as f32 * t as f32 * 0.01).sin()),
            valid,
            degraded: vec![],
        };
        let (stack, empty) = chain_spectrogram(&sc, &cfg);
        assert_eq!(stack.dim(), (4, 96, 1 + n_t / 44));
        assert_eq!(empty, vec!["RL"]);
        assert!(stack.slice(s![3, .., ..]).iter().all(|&v| v == 0.0));
        assert!(stack.slice(s![..3, .., ..]).iter().all(|&v| (-4.0..=7.0).contains(&v)));
    }
}
