/// Shared helpers: synthetic recordings and on-disk fixtures.
use hms_prep::montage::{ELECTRODES, REFERENCE_CHANNEL};
use hms_prep::Recording;
use ndarray::{ArrayBase, Data, Dimension};
use std::path::{Path, PathBuf};

pub const SFREQ: f32 = 200.0;

/// Deterministic per-channel signal: two tones, a slow drift and
/// pseudo-random noise from a fixed LCG.
pub fn channel_signal(k: usize, n: usize) -> Vec<f32> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15 ^ (k as u64 + 1).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    let f1 = 1.5 + k as f32 * 0.9;
    let f2 = 9.0 + (k % 5) as f32 * 3.1;
    (0..n)
        .map(|t| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            let noise = ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5;
            let ts = t as f32 / SFREQ;
            40.0 * (2.0 * std::f32::consts::PI * f1 * ts).sin()
                + 12.0 * (2.0 * std::f32::consts::PI * f2 * ts).sin()
                + 0.01 * t as f32
                + 8.0 * noise
        })
        .collect()
}

/// Columns of a synthetic recording: 19 electrodes + EKG, minus `skip`.
#[allow(unused)]
pub fn synthetic_columns(n: usize, skip: &[&str]) -> Vec<(String, Vec<f32>)> {
    ELECTRODES
        .iter()
        .copied()
        .chain(std::iter::once(REFERENCE_CHANNEL))
        .enumerate()
        .filter(|(_, name)| !skip.contains(name))
        .map(|(k, name)| (name.to_string(), channel_signal(k, n)))
        .collect()
}

#[allow(unused)]
pub fn synthetic_recording(id: &str, n: usize, skip: &[&str]) -> Recording {
    Recording::from_columns(id, synthetic_columns(n, skip)).unwrap()
}

/// Write columns as `<dir>/<id>.csv`.
#[allow(unused)]
pub fn write_csv(dir: &Path, id: &str, columns: &[(String, Vec<f32>)]) -> PathBuf {
    let path = dir.join(format!("{id}.csv"));
    let mut w = csv::Writer::from_path(&path).unwrap();
    w.write_record(columns.iter().map(|(n, _)| n.as_str())).unwrap();
    let n = columns.first().map_or(0, |(_, v)| v.len());
    for t in 0..n {
        w.write_record(columns.iter().map(|(_, v)| v[t].to_string())).unwrap();
    }
    w.flush().unwrap();
    path
}

/// Write columns as `<dir>/<id>.parquet` (Float32 columns).
#[allow(unused)]
pub fn write_parquet(dir: &Path, id: &str, columns: &[(String, Vec<f32>)]) -> PathBuf {
    use arrow::array::{ArrayRef, Float32Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(n, _)| Field::new(n, DataType::Float32, true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, v)| Arc::new(Float32Array::from(v.clone())) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

    let path = dir.join(format!("{id}.parquet"));
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
}

#[allow(unused)]
pub fn all_finite<S, D>(a: &ArrayBase<S, D>) -> bool
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    a.iter().all(|v| v.is_finite())
}

#[allow(unused)]
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
}
