//! Batch orchestration over a directory of recordings.
//!
//! Per file, the two branches run independently:
//!
//! ```text
//!   read ──┬─ time-domain ── EEG_OK | EEG_FAIL
//!          └─ spectral ───── SPEC_OK | SPEC_FAIL
//!
//!   both ok → Success   one ok → Partial   read failed / none ok → Failed
//! ```
//!
//! A branch's artifact is written only after the branch has completed, via
//! temp file + rename, and only when its bytes differ from what is already on
//! disk.  Ids with an existing `eeg/<id>.safetensors` are
//! skipped unless `force` is set; no other state is carried between files,
//! so a batch can run on a rayon pool and still merge in input order.
use anyhow::{Context, Result};
use log::{error, info, warn};
use ndarray::{Array2, Array3};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::{BatchConfig, PipelineConfig};
use crate::io::write_artifact;
use crate::ledger::{FailStage, Ledger, Outcome};
use crate::recording::{recording_id, Recording, RECORDING_EXTENSIONS};
use crate::spectral::{preprocess_spectral, SpectralReport};
use crate::preprocess_time_domain;

/// Format tag of the time-domain artifact.
pub const EEG_VERSION: &str = "eeg-v1";
pub const CONFIG_FILE: &str = "config.json";

/// Both branch results of one recording; nothing is written.
pub fn process_recording(
    rec: &Recording,
    cfg: &PipelineConfig,
) -> (crate::Result<Array2<f32>>, crate::Result<(Array3<f32>, SpectralReport)>) {
    let eeg = preprocess_time_domain(rec, cfg).map(|(eeg, _)| eeg);
    let spec = preprocess_spectral(rec, cfg);
    (eeg, spec)
}

/// Result of [`process_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub id: String,
    pub outcome: Outcome,
    /// Artifacts written (0–2); an unchanged artifact on disk is not rewritten.
    pub written: usize,
}

pub fn eeg_path(batch: &BatchConfig, id: &str) -> PathBuf {
    batch.eeg_dir().join(format!("{id}.safetensors"))
}

pub fn spec_path(batch: &BatchConfig, id: &str) -> PathBuf {
    batch.spec_dir().join(format!("{id}.safetensors"))
}

/// Read, process and persist one recording.  Never fails: every error is
/// folded into the returned [`Outcome`].
pub fn process_file(path: &Path, batch: &BatchConfig, cfg: &PipelineConfig) -> FileOutcome {
    let id = recording_id(path).unwrap_or_else(|| path.display().to_string());

    let rec = match Recording::load(path) {
        Ok(rec) => rec,
        Err(e) => {
            error!("[FILE FAIL] {id}: {e}");
            return FileOutcome { id, outcome: Outcome::Failed(vec![FailStage::File]), written: 0 };
        }
    };

    let (eeg, spec) = process_recording(&rec, cfg);
    let mut written = 0;

    let eeg_ok = match eeg.map_err(anyhow::Error::from).and_then(|eeg| {
        write_artifact(&eeg_path(batch, &id), "eeg", &eeg, EEG_VERSION)
    }) {
        Ok(changed) => {
            written += usize::from(changed);
            true
        }
        Err(e) => {
            error!("[EEG FAIL] {id}: {e:#}");
            false
        }
    };

    let spec_ok = match spec.map_err(anyhow::Error::from).and_then(|(spec, report)| {
        if !report.is_clean() {
            warn!(
                "{id}: {} pair(s) skipped, empty montages {:?}",
                report.skipped_pairs.len(),
                report.empty_montages
            );
        }
        write_artifact(&spec_path(batch, &id), "spec", &spec, cfg.spectral_format.version())
    }) {
        Ok(changed) => {
            written += usize::from(changed);
            true
        }
        Err(e) => {
            error!("[SPEC FAIL] {id}: {e:#}");
            false
        }
    };

    let outcome = match (eeg_ok, spec_ok) {
        (true, true) => Outcome::Success,
        (false, true) => Outcome::Partial(FailStage::Eeg),
        (true, false) => Outcome::Partial(FailStage::Spec),
        (false, false) => Outcome::Failed(vec![FailStage::Eeg, FailStage::Spec]),
    };
    FileOutcome { id, outcome, written }
}

/// Recording files directly under `dir`, sorted by path.
///
/// Ids are unique: when several files share a stem (`7.csv`, `7.parquet`)
/// only the first in path order is kept.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RECORDING_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && known {
            files.push(path);
        }
    }
    files.sort();

    let mut seen = BTreeSet::new();
    files.retain(|path| {
        let Some(id) = recording_id(path) else { return true };
        if seen.insert(id.clone()) {
            return true;
        }
        warn!("{}: id '{id}' already taken by another file, ignored", path.display());
        false
    });
    Ok(files)
}

/// Ids with a finished time-domain artifact.
pub fn completed_ids(eeg_dir: &Path) -> Result<BTreeSet<String>> {
    if !eeg_dir.exists() {
        return Ok(BTreeSet::new());
    }
    let mut ids = BTreeSet::new();
    for entry in std::fs::read_dir(eeg_dir).with_context(|| format!("listing {}", eeg_dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("safetensors") {
            if let Some(id) = recording_id(&path) {
                ids.insert(id);
            }
        }
    }
    Ok(ids)
}

/// Totals of one [`run_batch`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub discovered: usize,
    pub skipped: usize,
    pub processed: usize,
    pub success: usize,
    pub partial: usize,
    pub failed: usize,
    /// Artifact files written in this run.
    pub written: usize,
}

/// Process every pending recording of `batch.input_dir`.
///
/// Only setup problems (invalid config, unlistable input, unwritable ledger)
/// are errors;
/// per-file failures end up in the ledger.
pub fn run_batch(batch: &BatchConfig, cfg: &PipelineConfig) -> Result<BatchSummary> {
    cfg.validate().context("invalid pipeline configuration")?;
    let files = discover(&batch.input_dir)?;
    let done = if batch.force { BTreeSet::new() } else { completed_ids(&batch.eeg_dir())? };
    let pending: Vec<PathBuf> = files
        .iter()
        .filter(|p| recording_id(p).map_or(true, |id| !done.contains(&id)))
        .cloned()
        .collect();

    let mut summary = BatchSummary {
        discovered: files.len(),
        skipped: files.len() - pending.len(),
        ..BatchSummary::default()
    };
    info!(
        "{} recordings found, {} already done, {} to process",
        summary.discovered,
        summary.skipped,
        pending.len()
    );

    let pool = if batch.workers > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(batch.workers)
                .thread_name(|i| format!("hms-prep-worker-{i}"))
                .build()
                .context("creating worker pool")?,
        )
    } else {
        None
    };

    let before = Ledger::load(&batch.output_dir)?;
    let mut ledger = before.clone();
    let batch_size = batch.batch_size.max(1);
    let n_batches = pending.len().div_ceil(batch_size);

    for (b, chunk) in pending.chunks(batch_size).enumerate() {
        let outcomes: Vec<FileOutcome> = match &pool {
            Some(pool) => pool.install(|| chunk.par_iter().map(|p| process_file(p, batch, cfg)).collect()),
            None => chunk.iter().map(|p| process_file(p, batch, cfg)).collect(),
        };
        for o in &outcomes {
            ledger.record(&o.id, &o.outcome);
            summary.processed += 1;
            summary.written += o.written;
            match o.outcome {
                Outcome::Success => summary.success += 1,
                Outcome::Partial(_) => summary.partial += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        info!("batch {}/{} done ({} files)", b + 1, n_batches, chunk.len());
    }

    if ledger != before || !batch.output_dir.join(crate::ledger::SUCCESS_FILE).exists() {
        ledger.save(&batch.output_dir)?;
    }
    save_config_if_changed(&batch.output_dir, cfg)?;

    info!(
        "finished: {} success, {} partial, {} failed, {} skipped",
        summary.success, summary.partial, summary.failed, summary.skipped
    );
    Ok(summary)
}

fn save_config_if_changed(dir: &Path, cfg: &PipelineConfig) -> Result<()> {
    let path = dir.join(CONFIG_FILE);
    let text = serde_json::to_string_pretty(cfg)?;
    if std::fs::read_to_string(&path).ok().as_deref() == Some(text.as_str()) {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
}
