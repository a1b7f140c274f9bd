//! Safetensors I/O for pipeline artifacts.
//!
//! Layout: 8-byte LE header length, JSON header padded with spaces to a
//! multiple of 8, then the raw little-endian tensor bytes.  Every artifact
//! carries a `__metadata__` entry with its format version.
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array2, Array3, ArrayBase, Data, Dimension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ── Low-level parser ──────────────────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(serde_json::Map<String, serde_json::Value>, usize)> {
    ensure!(bytes.len() >= 8, "safetensors file too small");
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    ensure!(bytes.len() >= 8 + n, "safetensors header overruns file");
    let header: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..8 + n]).context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry has no shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("non-integer dimension"))
        .collect()
}

fn f32_data(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f32>> {
    ensure!(entry["dtype"] == "F32", "expected F32 tensor, got {}", entry["dtype"]);
    let offsets = entry["data_offsets"].as_array().context("tensor entry has no data_offsets")?;
    let (s, e) = match offsets.as_slice() {
        [s, e] => (
            s.as_u64().context("bad offset")? as usize,
            e.as_u64().context("bad offset")? as usize,
        ),
        _ => bail!("data_offsets must have two entries"),
    };
    let raw = bytes
        .get(data_start + s..data_start + e)
        .context("tensor data overruns file")?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// One F32 tensor read from a safetensors file.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
    pub metadata: HashMap<String, String>,
}

/// Read tensor `key` from `path`.
pub fn load_tensor(path: &Path, key: &str) -> Result<Tensor> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;
    let entry = header
        .get(key)
        .with_context(|| format!("{}: missing '{key}' tensor", path.display()))?;
    let shape = shape_of(entry)?;
    let data = f32_data(&bytes, data_start, entry)?;
    ensure!(
        data.len() == shape.iter().product::<usize>(),
        "{}: '{key}' holds {} values for shape {shape:?}",
        path.display(),
        data.len()
    );
    let metadata = header
        .get("__metadata__")
        .and_then(|m| m.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    Ok(Tensor { data, shape, metadata })
}

/// Load a time-domain artifact and check it has shape `expected`.
pub fn load_eeg(path: &Path, expected: (usize, usize)) -> Result<Array2<f32>> {
    let t = load_tensor(path, "eeg")?;
    ensure!(
        t.shape == [expected.0, expected.1],
        "{}: eeg shape {:?}, expected {expected:?}",
        path.display(),
        t.shape
    );
    Ok(Array2::from_shape_vec(expected, t.data)?)
}

/// Load a spectral artifact and check it has shape `expected`.
pub fn load_spec(path: &Path, expected: [usize; 3]) -> Result<Array3<f32>> {
    let t = load_tensor(path, "spec")?;
    ensure!(
        t.shape == expected,
        "{}: spec shape {:?}, expected {expected:?}",
        path.display(),
        t.shape
    );
    Ok(Array3::from_shape_vec((expected[0], expected[1], expected[2]), t.data)?)
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Safetensors file writer for F32 tensors.
///
/// ```rust,no_run
/// use hms_prep::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_metadata("format", "spec-v2");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, Vec<usize>)>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, shape.to_vec()));
    }

    /// Add an n-d array in logical (row-major) order.
    pub fn add_array<S, D>(&mut self, name: &str, arr: &ArrayBase<S, D>)
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, arr.shape());
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": "F32",
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let mut hdr = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr.len() % 8) % 8;
        hdr.extend(std::iter::repeat(b' ').take(pad));

        let mut out = Vec::with_capacity(8 + hdr.len() + offset);
        out.extend_from_slice(&(hdr.len() as u64).to_le_bytes());
        out.extend_from_slice(&hdr);
        for (_, data, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?).with_context(|| format!("writing {}", path.display()))
    }

    /// Write to a sibling temporary file, then rename over `path`.
    ///
    /// Readers never observe a partially written tensor.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        replace_file(path, &self.to_bytes()?)
    }
}

fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Persist a single-tensor artifact `key` at `path` with its format version.
///
/// Returns `false` without touching the file when `path` already holds the
/// exact same bytes, so re-running over unchanged input writes nothing.
pub fn write_artifact<S, D>(path: &Path, key: &str, arr: &ArrayBase<S, D>, version: &str) -> Result<bool>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut w = StWriter::new();
    w.add_array(key, arr);
    w.add_metadata("format", version);
    let bytes = w.to_bytes()?;
    if std::fs::read(path).is_ok_and(|old| old == bytes) {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    replace_file(path, &bytes)?;
    Ok(true)
}
