//! Error taxonomy for the preprocessing pipeline.
//!
//! | Error             | Scope            | Effect                                  |
//! |-------------------|------------------|-----------------------------------------|
//! | [`FilterError`]   | one montage pair | pair skipped / zero-filled              |
//! | `MissingChannel`  | one branch       | branch marked failed in the ledger      |
//! | `FileRead`        | one file         | both branches skipped, file failed      |
//! | `ShapeMismatch`   | internal defect  | never expected to surface               |
//! | `InvalidConfig`   | whole batch      | rejected before any file is read        |
//!
//! Apart from `InvalidConfig`, nothing here aborts a batch: the orchestrator turns every error into a
//! ledger entry and moves on to the next file.
use std::path::PathBuf;
use thiserror::Error;

/// Signal too short for the zero-phase IIR filter.
///
/// `filtfilt` pads both ends with `padlen` odd-reflected samples and refuses
/// signals that are not strictly longer than that.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signal of {len} samples is too short for zero-phase filtering (need > {padlen})")]
pub struct FilterError {
    pub len: usize,
    pub padlen: usize,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required electrode (or the reference channel) is absent.
    #[error("missing required channel '{0}'")]
    MissingChannel(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Tensor does not have the contracted shape.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    /// A model input contains NaN or Inf.
    #[error("tensor '{0}' contains non-finite values")]
    NonFinite(&'static str),

    /// A [`PipelineConfig`](crate::PipelineConfig) value the DSP cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Source file is unreadable or malformed.
    #[error("cannot read {path}: {reason}")]
    FileRead { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn file_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FileRead { path: path.into(), reason: reason.to_string() }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
