//! Zero-phase IIR filtering.
//!
//! Matches `scipy.signal.filtfilt(b, a, x)` with its defaults:
//!   1. odd-extend `padlen` samples on both sides
//!   2. filter forward, initial state = steady-state `zi · x_ext[0]`
//!   3. filter the reversed output, initial state = `zi · y[-1]`
//!   4. reverse again and strip the padding
//!
//! The cascade runs in `f64`; the public API is `f32` in and out.
use ndarray::Array2;

use super::design::{sos_zi, BandPass, Biquad};
use crate::error::FilterError;

/// Apply `bp` forward and backward to `x`.  Output has the length of `x`.
///
/// Fails with [`FilterError`] unless `x.len() > bp.padlen()`.
pub fn filtfilt(bp: &BandPass, x: &[f32]) -> Result<Vec<f32>, FilterError> {
    let padlen = bp.padlen();
    let n_x = x.len();
    if n_x <= padlen {
        return Err(FilterError { len: n_x, padlen });
    }

    let ext = odd_ext(x, padlen);
    let zi = sos_zi(&bp.sections);

    let x0 = ext[0];
    let mut y = sosfilt(&bp.sections, &ext, &zi, x0);
    y.reverse();
    let y0 = y[0];
    let mut y = sosfilt(&bp.sections, &y, &zi, y0);
    y.reverse();

    Ok(y[padlen..padlen + n_x].iter().map(|&v| v as f32).collect())
}

/// Apply [`filtfilt`] to every row of `data` ([C, T]) in place.
pub fn filtfilt_rows(bp: &BandPass, data: &mut Array2<f32>) -> Result<(), FilterError> {
    for mut row in data.rows_mut() {
        let filtered = filtfilt(bp, &row.to_vec())?;
        row.assign(&ndarray::ArrayView1::from(&filtered));
    }
    Ok(())
}

/// Run the cascade once over `x` (transposed direct form II per section).
///
/// `zi` is the unit-step steady state from [`sos_zi`]; it is scaled by
/// `x0` so a signal starting at `x0` begins without a transient.
fn sosfilt(sections: &[Biquad], x: &[f64], zi: &[[f64; 2]], x0: f64) -> Vec<f64> {
    let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect();
    let mut out = Vec::with_capacity(x.len());
    for &sample in x {
        let mut v = sample;
        for (s, z) in sections.iter().zip(state.iter_mut()) {
            let y = s.b[0] * v + z[0];
            z[0] = s.b[1] * v - s.a[1] * y + z[1];
            z[1] = s.b[2] * v - s.a[2] * y;
            v = y;
        }
        out.push(v);
    }
    out
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Odd extension (scipy's `odd_ext`), promoted to `f64`.
///
/// Left:  `2*x[0]  - x[n_pad-i+1]` … `2*x[0] - x[1]`
/// Right: `2*x[-1] - x[-2]` … `2*x[-1] - x[-(n_pad+1)]`
///
/// Requires `n_pad < x.len()`.
fn odd_ext(x: &[f32], n_pad: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0] as f64;
    let last = x[n - 1] as f64;

    let mut out = Vec::with_capacity(n + 2 * n_pad);
    for i in (1..=n_pad).rev() {
        out.push(2.0 * first - x[i] as f64);
    }
    out.extend(x.iter().map(|&v| v as f64));
    for i in 1..=n_pad {
        out.push(2.0 * last - x[n - 1 - i] as f64);
    }
    out
}
