//! Classifier contract.
//!
//! Models are injected through the [`Classifier`] trait; this crate only
//! guarantees that what reaches them honours the fixed input contract
//! (`[19, 2500]` time-domain tensor, spectral tensor of the configured
//! format, all values finite) and turns their raw class probabilities into a
//! [`Prediction`] with confidences in percent.
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Event classes, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    Seizure,
    Lpd,
    Gpd,
    Lrda,
    Grda,
    Other,
}

impl EventClass {
    pub const ALL: [EventClass; 6] = [
        EventClass::Seizure,
        EventClass::Lpd,
        EventClass::Gpd,
        EventClass::Lrda,
        EventClass::Grda,
        EventClass::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventClass::Seizure => "seizure",
            EventClass::Lpd => "lpd",
            EventClass::Gpd => "gpd",
            EventClass::Lrda => "lrda",
            EventClass::Grda => "grda",
            EventClass::Other => "other",
        }
    }
}

/// Label plus per-class confidence in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: EventClass,
    pub confidences: Vec<(EventClass, f32)>,
}

/// A trained model.  Returns one probability per [`EventClass::ALL`] entry.
pub trait Classifier {
    fn predict(&self, eeg: &Array2<f32>, spec: &Array3<f32>) -> anyhow::Result<Vec<f32>>;
}

/// Validate the artifacts, run `model`, and build the [`Prediction`].
pub fn classify_artifacts(
    model: &dyn Classifier,
    eeg: &Array2<f32>,
    spec: &Array3<f32>,
    cfg: &PipelineConfig,
) -> anyhow::Result<Prediction> {
    check_inputs(eeg, spec, cfg)?;
    let probs = model.predict(eeg, spec)?;
    if probs.len() != EventClass::ALL.len() {
        return Err(PipelineError::ShapeMismatch {
            expected: vec![EventClass::ALL.len()],
            got: vec![probs.len()],
        }
        .into());
    }

    let confidences: Vec<(EventClass, f32)> =
        EventClass::ALL.iter().copied().zip(probs.iter().map(|p| p * 100.0)).collect();
    let label = confidences
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| *c)
        .unwrap_or(EventClass::Other);
    Ok(Prediction { label, confidences })
}

/// Shape and finiteness check of a time-domain / spectral tensor pair.
pub fn check_inputs(eeg: &Array2<f32>, spec: &Array3<f32>, cfg: &PipelineConfig) -> Result<()> {
    let (c, t) = cfg.eeg_shape;
    if eeg.dim() != (c, t) {
        return Err(PipelineError::ShapeMismatch { expected: vec![c, t], got: eeg.shape().to_vec() });
    }
    let expected = cfg.spectral_shape();
    if spec.shape() != expected {
        return Err(PipelineError::ShapeMismatch { expected: expected.to_vec(), got: spec.shape().to_vec() });
    }
    if eeg.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::NonFinite("eeg"));
    }
    if spec.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::NonFinite("spec"));
    }
    Ok(())
}
