/// pipeline_steps: read one recording, run each preprocessing step, write every
/// intermediate array to a safetensors file for comparison against Python.
///
/// Output keys:
///   chains        [4, 4, T']       f32  filtered, binned montage pairs
///   midline       [2, T']          f32  Fz-Cz, Cz-Pz
///   reference     [1, T']          f32  filtered, binned EKG
///   eeg           [19, 2500]       f32  normalised time-domain tensor
///   eeg_scale     [2]              f32  chain scale, reference scale
///   spec_chains   [4, 4, T]        f32  0.25–40 Hz montage pairs (full rate)
///   stft_stack    [4, 96, frames]  f32  per-chain log-STFT
///   spec_legacy   [4, 48, 112]     f32  legacy spectral images
///   spec          [128, 256, 4]    f32  final spectral tensor
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use hms_prep::{
    chain_spectrogram, final_spectrogram, io::StWriter, montage::{build_spectral_chains, build_time_chains},
    normalize_legacy, normalize_time_domain, PipelineConfig, Recording,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline_steps")]
struct Args {
    /// Input recording (.parquet or .csv).
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Temporal bin size of the time-domain branch.
    #[arg(long, default_value_t = 4)]
    bin_size: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let cfg = PipelineConfig { bin_size: args.bin_size, ..PipelineConfig::default() };
    cfg.validate()?;

    // ── 1. Read ────────────────────────────────────────────────────────────
    let t_read = now();
    let rec = Recording::load(&args.input)?;
    let ms_read = t_read.elapsed().as_secs_f64() * 1000.0;

    // ── 2. Time-domain chains ──────────────────────────────────────────────
    let t_tc = now();
    let tc = build_time_chains(&rec, &cfg)?;
    let ms_tc = t_tc.elapsed().as_secs_f64() * 1000.0;
    let (chains, midline, reference) = (tc.chains.clone(), tc.midline.clone(), tc.reference.clone());

    // ── 3. Normalise ───────────────────────────────────────────────────────
    let t_norm = now();
    let (eeg, scale) = normalize_time_domain(tc, &cfg);
    let ms_norm = t_norm.elapsed().as_secs_f64() * 1000.0;

    // ── 4. Spectral chains + STFT ──────────────────────────────────────────
    let t_stft = now();
    let sc = build_spectral_chains(&rec, &cfg)?;
    let (stack, _) = chain_spectrogram(&sc, &cfg);
    let legacy = normalize_legacy(stack.clone(), &cfg);
    let ms_stft = t_stft.elapsed().as_secs_f64() * 1000.0;

    // ── 5. Final spectrogram ───────────────────────────────────────────────
    let t_spec = now();
    let (spec, report) = final_spectrogram(&rec, &cfg)?;
    let ms_spec = t_spec.elapsed().as_secs_f64() * 1000.0;

    // Format: "TIMING read=Xms chains=Xms norm=Xms stft=Xms spec=Xms"
    eprintln!(
        "TIMING read={ms_read:.4}ms chains={ms_tc:.4}ms norm={ms_norm:.4}ms \
         stft={ms_stft:.4}ms spec={ms_spec:.4}ms",
    );
    eprintln!(
        "  {} samples  reconcile={:?}  skipped={:?}",
        rec.n_samples(),
        scale.reconcile,
        report.skipped_pairs
    );

    // ── 6. Write output ────────────────────────────────────────────────────
    eprintln!("Writing → {}", args.output.display());
    let mut w = StWriter::new();
    w.add_array("chains", &chains);
    w.add_array("midline", &midline);
    w.add_array("reference", &reference);
    w.add_array("eeg", &eeg);
    w.add_f32("eeg_scale", &[scale.chain_scale, scale.reference_scale], &[2]);
    w.add_array("spec_chains", &sc.chains);
    w.add_array("stft_stack", &stack);
    w.add_array("spec_legacy", &legacy);
    w.add_array("spec", &spec);
    w.add_metadata("id", &rec.id);
    w.write(&args.output)?;

    eprintln!("Done.");
    Ok(())
}

/// Return `std::time::Instant::now()` (used for internal timing).
#[inline(always)]
fn now() -> std::time::Instant { std::time::Instant::now() }
