mod common;
use common::{all_finite, synthetic_columns, synthetic_recording};
use hms_prep::{final_spectrogram, preprocess_spectral, PipelineConfig, PipelineError, Recording, SpectralFormat};
use ndarray::s;

#[test]
fn final_artifact_contract() {
    let cfg = PipelineConfig::default();
    for n in [2500, 10_000, 12_001] {
        let rec = synthetic_recording("f", n, &[]);
        let (spec, report) = preprocess_spectral(&rec, &cfg).unwrap();
        assert_eq!(spec.shape(), cfg.spectral_shape());
        assert!(report.is_clean(), "n = {n}: {report:?}");
        assert!(all_finite(&spec));
        assert!(spec.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn only_the_centre_segment_matters() {
    // Garbage outside [3750, 6250) leaves the artifact unchanged.
    let cfg = PipelineConfig::default();
    let clean = synthetic_columns(10_000, &[]);
    let mut noisy = clean.clone();
    for (_, col) in noisy.iter_mut() {
        for t in (0..3750).chain(6250..10_000) {
            col[t] = 1e6 * ((t * 7919) % 13) as f32;
        }
    }
    let a = final_spectrogram(&Recording::from_columns("a", clean).unwrap(), &cfg).unwrap().0;
    let b = final_spectrogram(&Recording::from_columns("b", noisy).unwrap(), &cfg).unwrap().0;
    assert_eq!(a, b);
}

#[test]
fn flat_montage_plane_is_zero() {
    // Every LL electrode identical → all four LL pairs are constant.
    let cfg = PipelineConfig::default();
    let mut cols = synthetic_columns(5000, &[]);
    let fp1 = cols.iter().find(|(n, _)| n == "Fp1").map(|(_, v)| v.clone()).unwrap();
    for (name, col) in cols.iter_mut() {
        if ["F7", "T3", "T5", "O1"].contains(&name.as_str()) {
            *col = fp1.clone();
        }
    }
    let rec = Recording::from_columns("flat", cols).unwrap();
    let (spec, report) = final_spectrogram(&rec, &cfg).unwrap();
    assert_eq!(report.empty_montages, vec!["LL"]);
    // LP still has non-constant pairs.
    assert!(spec.slice(s![.., .., 0]).iter().all(|&v| v == 0.0));
    assert!(spec.slice(s![.., .., 1]).iter().any(|&v| v > 0.0));
}

#[test]
fn missing_electrode_is_branch_error() {
    let rec = synthetic_recording("x", 4000, &["T4"]);
    assert!(matches!(
        preprocess_spectral(&rec, &PipelineConfig::default()),
        Err(PipelineError::MissingChannel(name)) if name == "T4"
    ));
}

#[test]
fn spectral_branch_ignores_midline_and_reference() {
    let rec = synthetic_recording("y", 4000, &["Fz", "Cz", "Pz", "EKG"]);
    assert!(preprocess_spectral(&rec, &PipelineConfig::default()).is_ok());
}

#[test]
fn legacy_artifact_contract() {
    let cfg = PipelineConfig { spectral_format: SpectralFormat::Legacy, ..PipelineConfig::default() };
    let rec = synthetic_recording("l", 10_000, &[]);
    let (spec, _) = preprocess_spectral(&rec, &cfg).unwrap();
    assert_eq!(spec.dim(), (4, 48, 112));
    assert!(all_finite(&spec));
}

#[test]
fn legacy_large_images() {
    let cfg = PipelineConfig {
        spectral_format: SpectralFormat::Legacy,
        legacy_image: (96, 224),
        ..PipelineConfig::default()
    };
    let rec = synthetic_recording("L", 6000, &[]);
    let (spec, _) = preprocess_spectral(&rec, &cfg).unwrap();
    assert_eq!(spec.shape(), cfg.spectral_shape());
}
