use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use hms_prep::{run_batch, BatchConfig, PipelineConfig, SpectralFormat};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// [128, 256, 4] montage spectrograms
    Final,
    /// [4, 48, 112] log-STFT images (deprecated)
    Legacy,
}

#[derive(Parser)]
#[command(name = "preproc", about = "EEG preprocessing: time-domain and spectral artifacts per recording")]
struct Args {
    /// Directory of <id>.parquet / <id>.csv recordings
    #[arg(long)]
    input: PathBuf,

    /// Output root (eeg/, spec/, ledger CSVs)
    #[arg(long)]
    output: PathBuf,

    /// Files per batch (default: 100)
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Worker threads within a batch (default: 1, serial)
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Spectral artifact format
    #[arg(long, value_enum, default_value_t = Format::Final)]
    format: Format,

    /// JSON file overriding pipeline defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reprocess recordings that already have a time-domain artifact
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg: PipelineConfig = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    cfg.spectral_format = match args.format {
        Format::Final => SpectralFormat::Final,
        Format::Legacy => SpectralFormat::Legacy,
    };
    cfg.validate().context("checking pipeline configuration")?;

    let batch = BatchConfig {
        batch_size: args.batch_size,
        workers: args.workers,
        force: args.force,
        ..BatchConfig::new(&args.input, &args.output)
    };

    let summary = run_batch(&batch, &cfg)?;
    println!(
        "{} found, {} skipped, {} processed: {} success, {} partial, {} failed ({} artifacts written)",
        summary.discovered,
        summary.skipped,
        summary.processed,
        summary.success,
        summary.partial,
        summary.failed,
        summary.written
    );
    println!("Ledger → {}", args.output.display());
    Ok(())
}
