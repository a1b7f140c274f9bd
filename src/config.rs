//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every DSP constant of both branches; [`BatchConfig`]
//! holds the directory layout and execution knobs of a batch run.  Defaults
//! are the values the downstream classifiers were trained with.  Nothing is
//! global: both structs are passed explicitly to the entry points.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Layout of the saved spectral artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralFormat {
    /// `[128 freq, 256 time, 4 montages]`, values in `[0, 1]`.  Current contract.
    #[default]
    Final,
    /// `[4 montages, H, W]` z-normalised log-STFT images.
    ///
    /// Deprecated: superseded by [`SpectralFormat::Final`], kept only for
    /// models trained on the v1 layout.
    Legacy,
}

impl SpectralFormat {
    /// Version tag written into artifact metadata.
    pub fn version(self) -> &'static str {
        match self {
            SpectralFormat::Final => "spec-v2",
            SpectralFormat::Legacy => "spec-v1",
        }
    }
}

/// Configuration for both preprocessing branches.
///
/// All fields are `pub`, so a variant is built with struct-update syntax:
///
/// ```
/// use hms_prep::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     legacy_image: (96, 224),   // larger legacy spectrogram images
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sampling rate of every recording in Hz.
    ///
    /// Default: `200.0` Hz.
    pub sfreq: f32,

    /// Butterworth order of every band-pass.
    ///
    /// Default: `5`.
    pub filter_order: usize,

    /// Pass band of the time-domain montage pairs, in Hz.
    ///
    /// Default: `(0.25, 50.0)`.
    pub time_band: (f32, f32),

    /// Pass band of the cardiac reference channel, in Hz.
    ///
    /// Default: `(0.5, 20.0)`.
    pub reference_band: (f32, f32),

    /// Pass band of the spectral-branch montage pairs, in Hz.
    ///
    /// Default: `(0.25, 40.0)`.
    pub spectral_band: (f32, f32),

    /// Block size of the temporal binning after filtering.
    ///
    /// 200 Hz / 4 = 50 Hz effective rate.  Default: `4`.
    pub bin_size: usize,

    /// Exact shape of the time-domain artifact, `(channels, samples)`.
    ///
    /// Default: `(19, 2500)`.
    pub eeg_shape: (usize, usize),

    /// Symmetric clip applied after MAD scaling.
    ///
    /// Default: `10.0`.
    pub clip: f32,

    /// Added to every robust scale before dividing.
    ///
    /// Default: `1e-5`.
    pub eps: f32,

    /// STFT analysis window length (periodic Hann).  Default: `256`.
    pub stft_win: usize,

    /// STFT hop in samples.  Default: `44`.
    pub stft_hop: usize,

    /// STFT size; the window is zero-padded to this length.  Default: `800`.
    pub stft_nfft: usize,

    /// Retained STFT frequency bins, half-open.  Default: `(2, 98)`.
    pub stft_bins: (usize, usize),

    /// Magnitudes are divided by this before log compression.  Default: `15.0`.
    pub stft_scale: f32,

    /// Natural-log clip range of the compressed magnitudes.  Default: `(-4.0, 7.0)`.
    pub log_clip: (f32, f32),

    /// `(height, width)` of each legacy spectrogram image.  Default: `(48, 112)`.
    pub legacy_image: (usize, usize),

    /// Centre segment length for the final spectrogram.  Default: `2500`.
    pub segment_len: usize,

    /// Final spectrogram segment length (`nperseg`).  Default: `128`.
    pub spec_win: usize,

    /// Final spectrogram FFT size.  Default: `1024`.
    pub spec_nfft: usize,

    /// Final spectrogram overlap in samples (50 %).  Default: `64`.
    pub spec_overlap: usize,

    /// `(frequency bins, time bins)` of each final montage plane.
    ///
    /// Default: `(128, 256)`.
    pub spec_shape: (usize, usize),

    /// Which spectral artifact to produce.  Default: [`SpectralFormat::Final`].
    pub spectral_format: SpectralFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sfreq: 200.0,
            filter_order: 5,
            time_band: (0.25, 50.0),
            reference_band: (0.5, 20.0),
            spectral_band: (0.25, 40.0),
            bin_size: 4,
            eeg_shape: (19, 2500),
            clip: 10.0,
            eps: 1e-5,
            stft_win: 256,
            stft_hop: 44,
            stft_nfft: 800,
            stft_bins: (2, 98),
            stft_scale: 15.0,
            log_clip: (-4.0, 7.0),
            legacy_image: (48, 112),
            segment_len: 2500,
            spec_win: 128,
            spec_nfft: 1024,
            spec_overlap: 64,
            spec_shape: (128, 256),
            spectral_format: SpectralFormat::Final,
        }
    }
}

impl PipelineConfig {
    /// Shape of the saved spectral artifact for the configured format.
    ///
    /// ```
    /// use hms_prep::PipelineConfig;
    /// assert_eq!(PipelineConfig::default().spectral_shape(), [128, 256, 4]);
    /// ```
    pub fn spectral_shape(&self) -> [usize; 3] {
        match self.spectral_format {
            SpectralFormat::Final => [self.spec_shape.0, self.spec_shape.1, crate::montage::CHAINS.len()],
            SpectralFormat::Legacy => [crate::montage::CHAINS.len(), self.legacy_image.0, self.legacy_image.1],
        }
    }

    /// Check the values every filter design and transform relies on.
    ///
    /// Each pass band must satisfy `0 < low < high < sfreq / 2`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if !(self.sfreq.is_finite() && self.sfreq > 0.0) {
            return invalid(format!("sfreq must be positive, got {}", self.sfreq));
        }
        if self.filter_order == 0 {
            return invalid("filter_order must be positive".into());
        }
        let nyquist = self.sfreq / 2.0;
        for (name, (low, high)) in [
            ("time_band", self.time_band),
            ("reference_band", self.reference_band),
            ("spectral_band", self.spectral_band),
        ] {
            if !(0.0 < low && low < high && high < nyquist) {
                return invalid(format!(
                    "{name} [{low}, {high}] Hz must lie inside (0, {nyquist}) Hz"
                ));
            }
        }
        for (name, v) in [
            ("bin_size", self.bin_size),
            ("stft_win", self.stft_win),
            ("stft_hop", self.stft_hop),
            ("stft_nfft", self.stft_nfft),
            ("segment_len", self.segment_len),
            ("spec_win", self.spec_win),
        ] {
            if v == 0 {
                return invalid(format!("{name} must be positive"));
            }
        }
        if self.spec_overlap >= self.spec_win {
            return invalid(format!(
                "spec_overlap {} must be smaller than spec_win {}",
                self.spec_overlap, self.spec_win
            ));
        }
        if self.stft_bins.1 > self.stft_nfft / 2 + 1 || self.stft_bin_count() == 0 {
            return invalid(format!("stft_bins {:?} outside the STFT bin range", self.stft_bins));
        }
        Ok(())
    }

    /// Number of retained STFT frequency bins.  `96` at the defaults.
    pub fn stft_bin_count(&self) -> usize {
        self.stft_bins.1.saturating_sub(self.stft_bins.0)
    }
}

/// Directory layout and execution settings of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory of `<id>.parquet` / `<id>.csv` recordings.
    pub input_dir: PathBuf,

    /// Root of `eeg/`, `spec/` and the ledger CSVs.
    pub output_dir: PathBuf,

    /// Files per batch; progress is logged per batch.  Default: `100`.
    pub batch_size: usize,

    /// Worker threads within a batch; `1` runs serially.  Default: `1`.
    pub workers: usize,

    /// Reprocess ids whose time-domain artifact already exists.
    pub force: bool,
}

impl BatchConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            batch_size: 100,
            workers: 1,
            force: false,
        }
    }

    pub fn eeg_dir(&self) -> PathBuf {
        self.output_dir.join("eeg")
    }

    pub fn spec_dir(&self) -> PathBuf {
        self.output_dir.join("spec")
    }
}
