//! # hms-prep — EEG preprocessing for harmful-brain-activity classifiers
//!
//! `hms-prep` turns raw 19-electrode EEG recordings (200 Hz, plus an EKG
//! reference column) into the two fixed-shape tensors the downstream
//! classifiers consume.  Every DSP step is pure Rust on top of `ndarray`
//! and [RustFFT](https://crates.io/crates/rustfft) and mirrors the
//! scipy / torchaudio / OpenCV operations the models were trained with.
//!
//! ## Pipeline overview
//!
//! ```text
//! <id>.parquet | <id>.csv
//!   │
//!   ├─ Recording::load()            columns → Vec<f32>, nulls → 0
//!   │
//!   ├─ time-domain branch
//!   │    ├─ montage pairs a − b     4 chains × 4 pairs + 2 midline
//!   │    ├─ filtfilt                Butterworth 0.25–50 Hz, order 5 (EKG 0.5–20)
//!   │    ├─ bin_1d                  mean of 4 → 50 Hz
//!   │    ├─ normalize_time_domain   demean, ÷ median(MAD) + ε, clip ±10
//!   │    └─ reconcile_shape         reflect-pad / trim
//!   │         └─→ eeg/<id>.safetensors   [19, 2500] f32
//!   │
//!   └─ spectral branch (SpectralFormat::Final)
//!        ├─ centre 2500 samples
//!        ├─ density_spectrogram     Tukey 128, nfft 1024, 50 % overlap
//!        ├─ dB, min-max, zoom       → 128 × 256 per pair
//!        └─ mean over pairs         one plane per chain
//!             └─→ spec/<id>.safetensors  [128, 256, 4] f32 in [0, 1]
//! ```
//!
//! The deprecated `SpectralFormat::Legacy` branch instead filters the chains
//! at 0.25–40 Hz, takes a log-magnitude STFT per chain
//! ([`chain_spectrogram`]) and normalises it into `[4, 48, 112]` images
//! ([`normalize_legacy`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use hms_prep::{preprocess_spectral, preprocess_time_domain, PipelineConfig, Recording};
//! use std::path::Path;
//!
//! let rec = Recording::load(Path::new("data/1000913311.parquet")).unwrap();
//! let cfg = PipelineConfig::default();
//!
//! let (eeg, _scale) = preprocess_time_domain(&rec, &cfg).unwrap();
//! let (spec, report) = preprocess_spectral(&rec, &cfg).unwrap();
//! assert_eq!(eeg.dim(), (19, 2500));
//! assert_eq!(spec.dim(), (128, 256, 4));
//! println!("skipped pairs: {:?}", report.skipped_pairs);
//! ```
//!
//! Whole directories go through [`run_batch`], which writes both artifacts
//! per recording plus a resumable ledger (see [`ledger`]).

pub mod batch;
pub mod binning;
pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod ledger;
pub mod montage;
pub mod normalize;
pub mod recording;
pub mod resize;
pub mod shape;
pub mod spectral;
pub mod spectrogram;
pub mod stats;

use ndarray::Array2;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use batch::{process_file, process_recording, run_batch, BatchSummary, FileOutcome};
pub use binning::{bin_1d, bin_array, binned_len};
pub use classifier::{classify_artifacts, Classifier, EventClass, Prediction};
pub use config::{BatchConfig, PipelineConfig, SpectralFormat};
pub use error::{FilterError, PipelineError, Result};
pub use filter::{butter_bandpass, filtfilt, filtfilt_rows, BandPass};
pub use io::{load_eeg, load_spec, write_artifact, StWriter};
pub use ledger::{FailStage, Ledger, Outcome};
pub use montage::{build_spectral_chains, build_time_chains, SpectralChains, TimeChains, CHAINS};
pub use normalize::{normalize_time_domain, zscore_axis_inplace, EegScale};
pub use recording::Recording;
pub use resize::{resize_cubic, zoom_linear};
pub use shape::{center_window, reconcile_shape, Reconcile};
pub use spectral::{final_spectrogram, normalize_legacy, preprocess_spectral, SpectralReport};
pub use spectrogram::{chain_spectrogram, density_spectrogram, stft_magnitude};
pub use stats::{mad, mad_axis, median};

/// Run the **time-domain branch** on one recording.
///
/// Builds the filtered, binned montage signals and normalises them into the
/// `cfg.eeg_shape` tensor (`[19, 2500]` by default).  The only error is
/// [`PipelineError::MissingChannel`]: pairs too short to filter are
/// zero-filled instead.
///
/// ```no_run
/// use hms_prep::{preprocess_time_domain, PipelineConfig, Recording};
/// # let rec: Recording = unimplemented!();
/// let (eeg, scale) = preprocess_time_domain(&rec, &PipelineConfig::default())?;
/// println!("chain scale {}", scale.chain_scale);
/// # Ok::<(), hms_prep::PipelineError>(())
/// ```
pub fn preprocess_time_domain(rec: &Recording, cfg: &PipelineConfig) -> Result<(Array2<f32>, EegScale)> {
    let tc = build_time_chains(rec, cfg)?;
    Ok(normalize_time_domain(tc, cfg))
}
