//! Completion ledger of a batch run.
//!
//! Three id sets persisted as CSV under the output root:
//!
//! ```text
//!   success.csv           eeg_id               both branches written
//!   partial_success.csv   eeg_id               exactly one branch written
//!   failures.csv          eeg_id,fail_type     file | eeg | spec
//! ```
//!
//! The success and partial sets are disjoint.  `failures.csv` is not: it
//! also carries one row tagging the failed stage of every partial id, so a
//! partial id appears in both `partial_success.csv` and `failures.csv`.
//!
//! Recording a new outcome for an id first removes every older entry for it.
//! Files are rewritten in sorted order, so saving an unchanged ledger is
//! byte-identical.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const SUCCESS_FILE: &str = "success.csv";
pub const PARTIAL_FILE: &str = "partial_success.csv";
pub const FAILURES_FILE: &str = "failures.csv";

/// Stage at which a recording failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailStage {
    /// Source file unreadable; neither branch ran.
    File,
    /// Time-domain branch failed.
    Eeg,
    /// Spectral branch failed.
    Spec,
}

/// Overall outcome of one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Partial(FailStage),
    /// One row per failed stage: `[File]`, or `[Eeg, Spec]`.
    Failed(Vec<FailStage>),
}

#[derive(Debug, Serialize, Deserialize)]
struct IdRow {
    eeg_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FailureRow {
    eeg_id: String,
    fail_type: FailStage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub success: BTreeSet<String>,
    pub partial: BTreeSet<String>,
    pub failures: BTreeSet<(String, FailStage)>,
}

impl Ledger {
    /// Load the ledger under `dir`; absent files are empty sets.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut ledger = Ledger::default();
        ledger.success = read_rows::<IdRow>(&dir.join(SUCCESS_FILE))?
            .into_iter()
            .map(|r| r.eeg_id)
            .collect();
        ledger.partial = read_rows::<IdRow>(&dir.join(PARTIAL_FILE))?
            .into_iter()
            .map(|r| r.eeg_id)
            .collect();
        ledger.failures = read_rows::<FailureRow>(&dir.join(FAILURES_FILE))?
            .into_iter()
            .map(|r| (r.eeg_id, r.fail_type))
            .collect();
        Ok(ledger)
    }

    /// Replace whatever is known about `id` with `outcome`.
    pub fn record(&mut self, id: &str, outcome: &Outcome) {
        self.success.remove(id);
        self.partial.remove(id);
        self.failures.retain(|(fid, _)| fid != id);
        match outcome {
            Outcome::Success => {
                self.success.insert(id.to_string());
            }
            Outcome::Partial(stage) => {
                self.partial.insert(id.to_string());
                self.failures.insert((id.to_string(), *stage));
            }
            Outcome::Failed(stages) => {
                for stage in stages {
                    self.failures.insert((id.to_string(), *stage));
                }
            }
        }
    }

    /// Ids that failed outright (not partial).
    pub fn failed_ids(&self) -> BTreeSet<&str> {
        self.failures
            .iter()
            .map(|(id, _)| id.as_str())
            .filter(|id| !self.partial.contains(*id))
            .collect()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        write_rows(
            &dir.join(SUCCESS_FILE),
            &["eeg_id"],
            self.success.iter().map(|id| IdRow { eeg_id: id.clone() }),
        )?;
        write_rows(
            &dir.join(PARTIAL_FILE),
            &["eeg_id"],
            self.partial.iter().map(|id| IdRow { eeg_id: id.clone() }),
        )?;
        write_rows(
            &dir.join(FAILURES_FILE),
            &["eeg_id", "fail_type"],
            self.failures
                .iter()
                .map(|(id, stage)| FailureRow { eeg_id: id.clone(), fail_type: *stage }),
        )
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .with_context(|| format!("parsing {}", path.display()))
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: impl Iterator<Item = T>) -> Result<()> {
    // Header written explicitly so empty ledgers still carry one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
