mod common;
use common::{synthetic_recording, SFREQ};
use hms_prep::montage::build_spectral_chains;
use hms_prep::spectrogram::{density_spectrogram, stft_frames, stft_magnitude};
use hms_prep::{chain_spectrogram, PipelineConfig};
use ndarray::s;

fn tone(freq: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|t| (2.0 * std::f32::consts::PI * freq * t as f32 / SFREQ).sin())
        .collect()
}

fn argmax(col: impl Iterator<Item = f32>) -> usize {
    col.enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[test]
fn stft_of_silence_is_zero() {
    let s = stft_magnitude(&vec![0.0; 2000], 256, 44, 800);
    assert_eq!(s.dim(), (401, stft_frames(2000, 44)));
    assert!(s.iter().all(|&v| v == 0.0));
}

#[test]
fn stft_hann_peak_magnitude() {
    // |X| at the tone bin ≈ A · Σw / 2 = 256 / 4 for a unit sine.
    let s = stft_magnitude(&tone(25.0, 4000), 256, 44, 800);
    let mid = s.ncols() / 2;
    approx::assert_abs_diff_eq!(s[[100, mid]], 64.0, epsilon = 1.0);
}

#[test]
fn density_peak_tracks_frequency() {
    for f in [6.25_f32, 12.5, 31.25] {
        let sxx = density_spectrogram(&tone(f, 2500), SFREQ, 128, 64, 1024);
        let expected = (f * 1024.0 / SFREQ).round() as usize;
        assert_eq!(argmax(sxx.column(5).iter().copied()), expected, "f = {f}");
    }
}

#[test]
fn density_short_signal_clamps_segment() {
    // scipy clamps nperseg to the signal length: one segment.
    let sxx = density_spectrogram(&tone(10.0, 100), SFREQ, 128, 64, 1024);
    assert_eq!(sxx.dim(), (513, 1));
}

#[test]
fn chain_stack_from_recording() {
    let cfg = PipelineConfig::default();
    let rec = synthetic_recording("stft", 10_000, &[]);
    let sc = build_spectral_chains(&rec, &cfg).unwrap();
    let (stack, empty) = chain_spectrogram(&sc, &cfg);
    assert!(empty.is_empty());
    assert_eq!(stack.dim(), (4, 96, stft_frames(10_000, 44)));
    let (lo, hi) = cfg.log_clip;
    assert!(stack.iter().all(|&v| v >= lo - 1e-4 && v <= hi + 1e-4));
    // Chains differ: they are built from different electrodes.
    assert!(stack.slice(s![0, .., ..]) != stack.slice(s![3, .., ..]));
}
