//! Raw recordings: one column per electrode, one row per 200 Hz sample.
//!
//! Two on-disk layouts are accepted, dispatched by extension:
//! * `.parquet` / `.pq` – any numeric column type (cast to `f32`)
//! * `.csv`             – header row of channel names
//!
//! Nulls and empty cells become `0.0` (polars' `fill_null(0)`); non-finite
//! values are kept and cleaned up by the normalisers.  Non-numeric Parquet
//! columns are ignored.  The recording id is the file stem.
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float32Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{PipelineError, Result};

/// Extensions [`Recording::load`] understands.
pub const RECORDING_EXTENSIONS: &[&str] = &["parquet", "pq", "csv"];

/// An immutable multi-channel recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub id: String,
    columns: HashMap<String, Vec<f32>>,
    /// Column names in file order.
    names: Vec<String>,
    n_samples: usize,
}

impl Recording {
    /// Build a recording from named columns of equal length.
    pub fn from_columns(id: impl Into<String>, columns: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let id = id.into();
        let n_samples = columns.first().map_or(0, |(_, v)| v.len());
        if let Some((name, col)) = columns.iter().find(|(_, v)| v.len() != n_samples) {
            return Err(PipelineError::file_read(
                &id,
                format!("column '{name}' has {} rows, expected {n_samples}", col.len()),
            ));
        }
        let names = columns.iter().map(|(n, _)| n.clone()).collect();
        Ok(Self { id, columns: columns.into_iter().collect(), names, n_samples })
    }

    /// Load a recording file, dispatching on its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let id = recording_id(path)
            .ok_or_else(|| PipelineError::file_read(path, "file name has no stem"))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let columns = match ext.as_str() {
            "parquet" | "pq" => read_parquet(path),
            "csv" => read_csv(path),
            other => Err(format!("unsupported file extension: .{other}")),
        }
        .map_err(|reason| PipelineError::file_read(path, reason))?;

        Self::from_columns(id, columns).map_err(|e| match e {
            PipelineError::FileRead { reason, .. } => PipelineError::file_read(path, reason),
            other => other,
        })
    }

    /// Samples of channel `name`, or [`PipelineError::MissingChannel`].
    pub fn channel(&self, name: &str) -> Result<&[f32]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PipelineError::MissingChannel(name.to_string()))
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// First of `names` that is absent, if any.
    pub fn first_missing<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        names.into_iter().find(|n| !self.has_channel(n))
    }

    pub fn channel_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}

/// Recording id of a file: its stem.
pub fn recording_id(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

// ── Parquet ──────────────────────────────────────────────────────────────────

fn read_parquet(path: &Path) -> std::result::Result<Vec<(String, Vec<f32>)>, String> {
    let file = File::open(path).map_err(|e| format!("opening parquet file: {e}"))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| format!("reading parquet metadata: {e}"))?;
    let reader = builder.build().map_err(|e| format!("building parquet reader: {e}"))?;

    let mut columns: Vec<(String, Vec<f32>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for batch in reader {
        let batch = batch.map_err(|e| format!("reading parquet record batch: {e}"))?;
        let schema = batch.schema();
        for (field, col) in schema.fields().iter().zip(batch.columns()) {
            if !col.data_type().is_numeric() {
                continue;
            }
            let as_f32 = cast(col, &DataType::Float32)
                .map_err(|e| format!("column '{}': {e}", field.name()))?;
            let values = as_f32.as_primitive::<Float32Type>();

            let slot = *index.entry(field.name().clone()).or_insert_with(|| {
                columns.push((field.name().clone(), Vec::new()));
                columns.len() - 1
            });
            let dst = &mut columns[slot].1;
            dst.reserve(values.len());
            for i in 0..values.len() {
                dst.push(if values.is_null(i) { 0.0 } else { values.value(i) });
            }
        }
    }
    Ok(columns)
}

// ── CSV ──────────────────────────────────────────────────────────────────────

fn read_csv(path: &Path) -> std::result::Result<Vec<(String, Vec<f32>)>, String> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| format!("opening CSV: {e}"))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("reading CSV headers: {e}"))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut columns: Vec<Vec<f32>> = vec![Vec::new(); headers.len()];
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("CSV row {row_no}: {e}"))?;
        for (col, cell) in columns.iter_mut().zip(record.iter()) {
            let cell = cell.trim();
            let v = if cell.is_empty() {
                0.0
            } else {
                cell.parse::<f32>()
                    .map_err(|_| format!("CSV row {row_no}: '{cell}' is not a number"))?
            };
            col.push(v);
        }
    }
    Ok(headers.into_iter().zip(columns).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn channel_lookup_reports_missing_name() {
        let rec = Recording::from_columns("r1", vec![("Fp1".into(), vec![1.0, 2.0])]).unwrap();
        assert_eq!(rec.channel("Fp1").unwrap(), &[1.0, 2.0]);
        match rec.channel("O2") {
            Err(PipelineError::MissingChannel(name)) => assert_eq!(name, "O2"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rec.first_missing(["Fp1", "Cz", "O2"]), Some("Cz"));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Recording::from_columns(
            "r2",
            vec![("A".into(), vec![1.0; 4]), ("B".into(), vec![1.0; 3])],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::FileRead { .. }));
    }

    #[test]
    fn csv_blank_cells_become_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1234.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "Fp1,EKG").unwrap();
        writeln!(f, "1.5,").unwrap();
        writeln!(f, ",-2").unwrap();
        drop(f);

        let rec = Recording::load(&path).unwrap();
        assert_eq!(rec.id, "1234");
        assert_eq!(rec.n_samples(), 2);
        assert_eq!(rec.channel("Fp1").unwrap(), &[1.5, 0.0]);
        assert_eq!(rec.channel("EKG").unwrap(), &[0.0, -2.0]);
    }

    #[test]
    fn unsupported_extension_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.edf");
        File::create(&path).unwrap();
        assert!(matches!(Recording::load(&path), Err(PipelineError::FileRead { .. })));
    }

    #[test]
    fn garbage_parquet_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"definitely not parquet").unwrap();
        assert!(matches!(Recording::load(&path), Err(PipelineError::FileRead { .. })));
    }
}
