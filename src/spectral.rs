//! Spectral normalisation: both spectral artifact formats.
//!
//! Final (`[128, 256, 4]`, values in `[0, 1]`), per montage `c`:
//!   1. centre segment of `segment_len` raw samples (whole signal if shorter)
//!   2. per pair `x = a − b`: non-finite → mean of finite samples, demean,
//!      remove linear trend; skip if `len < spec_win` or `x ≡ 0`
//!   3. Sxx = density spectrogram (Tukey 0.25, `spec_win`, `spec_overlap`,
//!      `spec_nfft`)
//!   4. dB = 10·log10(Sxx + 1e-10), min-max → [0, 1], linear zoom → spec_shape
//!   5. plane `c` = mean over the non-skipped pairs (zeros if none)
//!
//! Legacy (`[4, H, W]`, deprecated), per chain of the log-STFT stack:
//!   1. keep bins `stft_bins` (only if the stack still has the full STFT axis)
//!   2. NaN/Inf → 0, ln(clip(x, e⁻⁴, e⁷))
//!   3. z-score along frequency, `(x − μ) / (σ + ε)`
//!   4. bicubic resize to `legacy_image`
use log::warn;
use ndarray::{s, Array2, Array3, Axis};

use crate::config::{PipelineConfig, SpectralFormat};
use crate::error::{PipelineError, Result};
use crate::montage::{build_spectral_chains, spectral_required_channels, MontagePair, CHAINS};
use crate::normalize::zscore_axis_inplace;
use crate::recording::Recording;
use crate::resize::{resize_cubic, zoom_linear};
use crate::shape::center_window;
use crate::spectrogram::{chain_spectrogram, density_spectrogram, log_clip};
use crate::stats::nan_to_zero_inplace;

/// Non-fatal degradations observed while building a spectral artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpectralReport {
    /// Pairs excluded from their montage average (too short, constant or
    /// unfilterable).
    pub skipped_pairs: Vec<String>,
    /// Montages whose plane was left at zero.
    pub empty_montages: Vec<&'static str>,
}

impl SpectralReport {
    pub fn is_clean(&self) -> bool {
        self.skipped_pairs.is_empty() && self.empty_montages.is_empty()
    }
}

/// Spectral artifact of `rec` in the configured [`SpectralFormat`].
pub fn preprocess_spectral(rec: &Recording, cfg: &PipelineConfig) -> Result<(Array3<f32>, SpectralReport)> {
    match cfg.spectral_format {
        SpectralFormat::Final => final_spectrogram(rec, cfg),
        SpectralFormat::Legacy => {
            let sc = build_spectral_chains(rec, cfg)?;
            let (stack, empty_montages) = chain_spectrogram(&sc, cfg);
            let out = normalize_legacy(stack, cfg);
            Ok((out, SpectralReport { skipped_pairs: sc.degraded, empty_montages }))
        }
    }
}

// ── Legacy format ────────────────────────────────────────────────────────────

/// Normalise a `[4, F, T]` log-STFT stack into `[4, H, W]` images.
pub fn normalize_legacy(mut stack: Array3<f32>, cfg: &PipelineConfig) -> Array3<f32> {
    let (lo, hi) = cfg.stft_bins;
    let n_freq = stack.len_of(Axis(1));
    if n_freq > cfg.stft_bin_count() {
        let hi = hi.min(n_freq);
        stack = stack.slice(s![.., lo.min(hi)..hi, ..]).to_owned();
    }

    nan_to_zero_inplace(&mut stack);
    stack.mapv_inplace(|v| log_clip(v, cfg.log_clip));
    zscore_axis_inplace(&mut stack, Axis(1), cfg.eps);

    let (h, w) = cfg.legacy_image;
    let mut out = Array3::<f32>::zeros((stack.len_of(Axis(0)), h, w));
    for (c, plane) in stack.outer_iter().enumerate() {
        let resized = resize_cubic(&plane.to_owned(), (h, w));
        out.slice_mut(s![c, .., ..]).assign(&resized);
    }
    nan_to_zero_inplace(&mut out);
    out
}

// ── Final format ─────────────────────────────────────────────────────────────

/// `[spec_shape.0, spec_shape.1, 4]` montage spectrogram of the centre segment.
pub fn final_spectrogram(rec: &Recording, cfg: &PipelineConfig) -> Result<(Array3<f32>, SpectralReport)> {
    if let Some(name) = rec.first_missing(spectral_required_channels()) {
        return Err(PipelineError::MissingChannel(name.to_string()));
    }

    let total = rec.n_samples();
    let start = center_window(total, cfg.segment_len).unwrap_or(0);
    let end = (start + cfg.segment_len).min(total);

    let (h, w) = cfg.spec_shape;
    let mut out = Array3::<f32>::zeros((h, w, CHAINS.len()));
    let mut report = SpectralReport::default();

    for (c, chain) in CHAINS.iter().enumerate() {
        let mut acc = Array2::<f32>::zeros((h, w));
        let mut used = 0usize;
        for pair in &chain.pairs {
            match pair_image(rec, pair, start..end, cfg)? {
                Some(img) => {
                    acc += &img;
                    used += 1;
                }
                None => {
                    warn!("pair {}: too short or constant, skipped", pair.label());
                    report.skipped_pairs.push(pair.label());
                }
            }
        }
        if used == 0 {
            warn!("montage {}: every pair skipped, plane left at zero", chain.name);
            report.empty_montages.push(chain.name);
            continue;
        }
        acc.mapv_inplace(|v| v / used as f32);
        out.slice_mut(s![.., .., c]).assign(&acc);
    }

    nan_to_zero_inplace(&mut out);
    Ok((out, report))
}

/// Min-max normalised, zoomed dB spectrogram of one pair; `None` if skipped.
fn pair_image(
    rec: &Recording,
    pair: &MontagePair,
    range: std::ops::Range<usize>,
    cfg: &PipelineConfig,
) -> Result<Option<Array2<f32>>> {
    let diff = pair.difference(rec)?;
    let mut x = diff[range].to_vec();
    if x.len() < cfg.spec_win || !condition_segment(&mut x) {
        return Ok(None);
    }

    let sxx = density_spectrogram(&x, cfg.sfreq, cfg.spec_win, cfg.spec_overlap, cfg.spec_nfft);
    if sxx.is_empty() {
        return Ok(None);
    }
    let db = sxx.mapv(|p| 10.0 * (p + 1e-10).log10());
    let min = db.iter().copied().fold(f32::INFINITY, f32::min);
    let max = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let norm = db.mapv(|v| (v - min) / (max - min + 1e-10));
    Ok(Some(zoom_linear(&norm, cfg.spec_shape)))
}

/// Clean, demean and linearly detrend `x` in place.
///
/// Returns `false` when nothing but a line (or a constant) is left.
pub fn condition_segment(x: &mut [f32]) -> bool {
    let finite: Vec<f64> = x.iter().filter(|v| v.is_finite()).map(|&v| v as f64).collect();
    let fill = if finite.is_empty() { 0.0 } else { finite.iter().sum::<f64>() / finite.len() as f64 };
    let peak_in = finite.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

    let n = x.len() as f64;
    let ys: Vec<f64> = x.iter().map(|&v| if v.is_finite() { v as f64 } else { fill }).collect();
    let mean = ys.iter().sum::<f64>() / n;

    // Least-squares line through (i, y_i).
    let t_mean = (n - 1.0) / 2.0;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dt = i as f64 - t_mean;
        sxy += dt * (y - mean);
        sxx += dt * dt;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    let mut peak_out = 0.0_f64;
    for (i, (dst, y)) in x.iter_mut().zip(&ys).enumerate() {
        let r = y - mean - slope * (i as f64 - t_mean);
        peak_out = peak_out.max(r.abs());
        *dst = r as f32;
    }
    peak_out > 1e-6 * (1.0 + peak_in)
}
