//! Bipolar montages and the per-branch chain builders.
//!
//! Four longitudinal chains of four electrode-pair differences each:
//!
//! ```text
//!   LL  Fp1–F7  F7–T3  T3–T5  T5–O1      left lateral
//!   LP  Fp1–F3  F3–C3  C3–P3  P3–O1      left parasagittal
//!   RP  Fp2–F4  F4–C4  C4–P4  P4–O2      right parasagittal
//!   RL  Fp2–F8  F8–T4  T4–T6  T6–O2      right lateral
//!   mid Fz–Cz   Cz–Pz                    midline (time-domain only)
//!   EKG                                  cardiac reference (time-domain only)
//! ```
//!
//! Time-domain pairs: `bin(bandpass(a − b))`, 0.25–50 Hz.  The reference is
//! band-passed at 0.5–20 Hz and binned.  Spectral pairs: `bandpass(a − b)`,
//! 0.25–40 Hz, no binning.
//!
//! A missing column fails the whole branch before any pair is computed.  A
//! pair too short to filter is zero-filled and reported, never fatal.
use log::warn;
use ndarray::{Array2, Array3};

use crate::binning::{bin_1d, binned_len};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::filter::{butter_bandpass, filtfilt, BandPass};
use crate::recording::Recording;

/// The 19 scalp electrodes of the 10–20 system, in recording column order.
pub const ELECTRODES: [&str; 19] = [
    "Fp1", "Fp2", "Fz", "Cz", "Pz", "F3", "F4", "F7", "F8", "C3", "C4", "P3", "P4", "T3", "T4",
    "T5", "T6", "O1", "O2",
];

/// Cardiac reference column.
pub const REFERENCE_CHANNEL: &str = "EKG";

/// Ordered electrode pair; its signal is `anode − cathode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MontagePair {
    pub anode: &'static str,
    pub cathode: &'static str,
}

impl MontagePair {
    pub const fn new(anode: &'static str, cathode: &'static str) -> Self {
        Self { anode, cathode }
    }

    /// `"Fp1-F7"`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.anode, self.cathode)
    }

    /// Raw difference signal `anode − cathode`.
    pub fn difference(&self, rec: &Recording) -> Result<Vec<f32>> {
        let a = rec.channel(self.anode)?;
        let b = rec.channel(self.cathode)?;
        Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
    }
}

/// A named bipolar chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chain {
    pub name: &'static str,
    pub pairs: [MontagePair; 4],
}

const fn chain(name: &'static str, e: [&'static str; 5]) -> Chain {
    Chain {
        name,
        pairs: [
            MontagePair::new(e[0], e[1]),
            MontagePair::new(e[1], e[2]),
            MontagePair::new(e[2], e[3]),
            MontagePair::new(e[3], e[4]),
        ],
    }
}

/// Channel order of every artifact: LL, LP, RP, RL.
pub static CHAINS: [Chain; 4] = [
    chain("LL", ["Fp1", "F7", "T3", "T5", "O1"]),
    chain("LP", ["Fp1", "F3", "C3", "P3", "O1"]),
    chain("RP", ["Fp2", "F4", "C4", "P4", "O2"]),
    chain("RL", ["Fp2", "F8", "T4", "T6", "O2"]),
];

pub static MIDLINE: [MontagePair; 2] = [MontagePair::new("Fz", "Cz"), MontagePair::new("Cz", "Pz")];

/// Columns the time-domain branch needs: every electrode plus the reference.
pub fn time_required_channels() -> impl Iterator<Item = &'static str> {
    ELECTRODES.into_iter().chain(std::iter::once(REFERENCE_CHANNEL))
}

/// Columns the spectral branch needs: the chain electrodes only.
pub fn spectral_required_channels() -> impl Iterator<Item = &'static str> {
    CHAINS
        .iter()
        .flat_map(|c| c.pairs.iter().flat_map(|p| [p.anode, p.cathode]))
}

fn ensure_channels<'a>(rec: &Recording, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    match rec.first_missing(names) {
        Some(name) => Err(PipelineError::MissingChannel(name.to_string())),
        None => Ok(()),
    }
}

/// Filter `x`; `None` (recorded in `degraded`) when it is too short.
fn filter_or_zero(bp: &BandPass, x: &[f32], label: &str, degraded: &mut Vec<String>) -> Option<Vec<f32>> {
    match filtfilt(bp, x) {
        Ok(y) => Some(y),
        Err(e) => {
            warn!("pair {label}: {e}; zero-filled");
            degraded.push(label.to_string());
            None
        }
    }
}

// ── Time-domain branch ───────────────────────────────────────────────────────

/// Output of [`build_time_chains`].  `T'` = binned length.
#[derive(Debug, Clone)]
pub struct TimeChains {
    /// `[4 chains, 4 pairs, T']`
    pub chains: Array3<f32>,
    /// `[2, T']`
    pub midline: Array2<f32>,
    /// `[1, T']`
    pub reference: Array2<f32>,
    /// Labels of pairs (or the reference) zero-filled after a filter failure.
    pub degraded: Vec<String>,
}

/// Derive the filtered, binned time-domain montage signals of `rec`.
pub fn build_time_chains(rec: &Recording, cfg: &PipelineConfig) -> Result<TimeChains> {
    ensure_channels(rec, time_required_channels())?;

    let bp = butter_bandpass(cfg.filter_order, cfg.time_band.0, cfg.time_band.1, cfg.sfreq);
    let ref_bp = butter_bandpass(cfg.filter_order, cfg.reference_band.0, cfg.reference_band.1, cfg.sfreq);
    let n_t = binned_len(rec.n_samples(), cfg.bin_size);
    let mut degraded = Vec::new();

    let mut derive = |pair: &MontagePair| -> Result<Vec<f32>> {
        let diff = pair.difference(rec)?;
        Ok(filter_or_zero(&bp, &diff, &pair.label(), &mut degraded)
            .map(|y| bin_1d(&y, cfg.bin_size))
            .unwrap_or_else(|| vec![0.0; n_t]))
    };

    let mut chains = Array3::<f32>::zeros((CHAINS.len(), 4, n_t));
    for (c, ch) in CHAINS.iter().enumerate() {
        for (p, pair) in ch.pairs.iter().enumerate() {
            let sig = derive(pair)?;
            chains
                .slice_mut(ndarray::s![c, p, ..])
                .assign(&ndarray::ArrayView1::from(&sig));
        }
    }

    let mut midline = Array2::<f32>::zeros((MIDLINE.len(), n_t));
    for (m, pair) in MIDLINE.iter().enumerate() {
        let sig = derive(pair)?;
        midline.row_mut(m).assign(&ndarray::ArrayView1::from(&sig));
    }

    let ekg = rec.channel(REFERENCE_CHANNEL)?;
    let reference = filter_or_zero(&ref_bp, ekg, REFERENCE_CHANNEL, &mut degraded)
        .map(|y| bin_1d(&y, cfg.bin_size))
        .unwrap_or_else(|| vec![0.0; n_t]);
    let reference = Array2::from_shape_vec((1, n_t), reference)
        .map_err(|_| PipelineError::ShapeMismatch { expected: vec![1, n_t], got: vec![rec.n_samples()] })?;

    Ok(TimeChains { chains, midline, reference, degraded })
}

// ── Spectral branch ──────────────────────────────────────────────────────────

/// Output of [`build_spectral_chains`].
#[derive(Debug, Clone)]
pub struct SpectralChains {
    /// `[4 chains, 4 pairs, T]` at the full sampling rate.
    pub chains: Array3<f32>,
    /// `valid[[c, p]]` is false where the pair was zero-filled.
    pub valid: Array2<bool>,
    pub degraded: Vec<String>,
}

/// Derive the filtered full-rate spectral montage signals of `rec`.
pub fn build_spectral_chains(rec: &Recording, cfg: &PipelineConfig) -> Result<SpectralChains> {
    ensure_channels(rec, spectral_required_channels())?;

    let bp = butter_bandpass(cfg.filter_order, cfg.spectral_band.0, cfg.spectral_band.1, cfg.sfreq);
    let n_t = rec.n_samples();
    let mut chains = Array3::<f32>::zeros((CHAINS.len(), 4, n_t));
    let mut valid = Array2::from_elem((CHAINS.len(), 4), false);
    let mut degraded = Vec::new();

    for (c, ch) in CHAINS.iter().enumerate() {
        for (p, pair) in ch.pairs.iter().enumerate() {
            let diff = pair.difference(rec)?;
            if let Some(y) = filter_or_zero(&bp, &diff, &pair.label(), &mut degraded) {
                chains
                    .slice_mut(ndarray::s![c, p, ..])
                    .assign(&ndarray::ArrayView1::from(&y));
                valid[[c, p]] = true;
            }
        }
    }

    Ok(SpectralChains { chains, valid, degraded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn recording(n: usize, skip: Option<&str>) -> Recording {
        let cols = time_required_channels()
            .filter(|name| Some(*name) != skip)
            .enumerate()
            .map(|(k, name)| {
                let f = 1.0 + k as f32 * 0.7;
                let sig = (0..n)
                    .map(|t| (2.0 * std::f32::consts::PI * f * t as f32 / 200.0).sin() * 30.0)
                    .collect();
                (name.to_string(), sig)
            })
            .collect();
        Recording::from_columns("t", cols).unwrap()
    }

    #[test]
    fn chains_are_contiguous_paths() {
        for ch in &CHAINS {
            for w in ch.pairs.windows(2) {
                assert_eq!(w[0].cathode, w[1].anode, "chain {}", ch.name);
            }
        }
    }

    #[test]
    fn spectral_branch_needs_sixteen_electrodes() {
        let set: HashSet<_> = spectral_required_channels().collect();
        assert_eq!(set.len(), 16);
        assert!(!set.contains("Fz") && !set.contains("Cz") && !set.contains("Pz"));
        assert_eq!(time_required_channels().count(), 20);
    }

    #[test]
    fn time_chain_shapes() {
        let rec = recording(1001, None);
        let tc = build_time_chains(&rec, &PipelineConfig::default()).unwrap();
        assert_eq!(tc.chains.dim(), (4, 4, 251));
        assert_eq!(tc.midline.dim(), (2, 251));
        assert_eq!(tc.reference.dim(), (1, 251));
        assert!(tc.degraded.is_empty());
    }

    #[test]
    fn missing_reference_fails_time_branch_only() {
        let rec = recording(800, Some(REFERENCE_CHANNEL));
        let cfg = PipelineConfig::default();
        match build_time_chains(&rec, &cfg) {
            Err(PipelineError::MissingChannel(name)) => assert_eq!(name, "EKG"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(build_spectral_chains(&rec, &cfg).is_ok());
    }

    #[test]
    fn short_signal_zero_fills_every_pair() {
        let rec = recording(20, None);
        let sc = build_spectral_chains(&rec, &PipelineConfig::default()).unwrap();
        assert!(sc.valid.iter().all(|&v| !v));
        assert_eq!(sc.degraded.len(), 16);
        assert!(sc.chains.iter().all(|&v| v == 0.0));
    }
}
