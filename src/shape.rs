//! Fixed-shape reconciliation.
//!
//! Forces a [C, T] array to an exact `(channels, length)` target, whatever
//! length the recording produced:
//!   • too few elements  → reflect-pad the time axis at the end
//!   • too many elements → trim the time axis from the end
//!
//! When the source row count differs from the target channel count the
//! trim column count is `expected / rows` (integer division).  Any deficit
//! that leaves is made up by reflect-padding the flattened tail.  This is a
//! lossy corner case, not a defect.
use ndarray::Array2;

/// What [`reconcile_shape`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    Exact,
    /// Elements added by reflect-padding.
    Padded(usize),
    /// Elements dropped from the end.
    Trimmed(usize),
}

/// Reshape `data` to exactly `target` = `(channels, length)`.  Never fails.
pub fn reconcile_shape(data: &Array2<f32>, target: (usize, usize)) -> (Array2<f32>, Reconcile) {
    let (n_ch, n_t) = target;
    let expected = n_ch * n_t;
    let (rows, cols) = data.dim();
    let current = rows * cols;

    if data.dim() == target {
        return (data.clone(), Reconcile::Exact);
    }
    if current == 0 || expected == 0 {
        return (Array2::zeros(target), Reconcile::Padded(expected));
    }

    let new_cols = if current < expected {
        expected.div_ceil(rows)
    } else {
        (expected / rows).max(1)
    };

    let mut flat: Vec<f32> = Vec::with_capacity(rows * new_cols.max(cols));
    for row in data.rows() {
        let row = row.to_vec();
        if new_cols >= cols {
            flat.extend(reflect_pad_end(&row, new_cols - cols));
        } else {
            flat.extend_from_slice(&row[..new_cols]);
        }
    }
    if flat.len() < expected {
        let deficit = expected - flat.len();
        flat = reflect_pad_end(&flat, deficit);
    }
    flat.truncate(expected);

    let action = if current < expected {
        Reconcile::Padded(expected - current)
    } else if current > expected {
        Reconcile::Trimmed(current - expected)
    } else {
        Reconcile::Exact
    };

    // `flat` holds exactly `expected` elements in row-major order.
    let out = Array2::from_shape_vec(target, flat).unwrap_or_else(|_| Array2::zeros(target));
    (out, action)
}

/// Append `pad` samples mirrored about the last sample (numpy `mode="reflect"`).
///
/// The edge sample itself is not repeated; when `pad` exceeds the signal the
/// reflection continues back and forth, as numpy does.
pub fn reflect_pad_end(x: &[f32], pad: usize) -> Vec<f32> {
    let n = x.len();
    let mut out = Vec::with_capacity(n + pad);
    out.extend_from_slice(x);
    if n == 0 {
        out.resize(pad, 0.0);
        return out;
    }
    for j in n..n + pad {
        out.push(x[reflect_index(j, n)]);
    }
    out
}

/// Index into a length-`n` signal for position `i` of its infinite
/// reflection (period `2(n − 1)`).
pub fn reflect_index(i: usize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let m = i % period;
    if m < n { m } else { period - m }
}

/// Start index of the centred `window`-sample segment of a `total`-sample
/// signal, or `None` when the whole signal is used (`total <= window`).
///
/// `start = total / 2 − window / 2`.
pub fn center_window(total: usize, window: usize) -> Option<usize> {
    if total <= window {
        None
    } else {
        Some((total / 2).saturating_sub(window / 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_pad_excludes_edge() {
        assert_eq!(reflect_pad_end(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn reflect_pad_wraps_past_signal_length() {
        // numpy: np.pad([1, 2, 3], (0, 6), mode="reflect") → [1 2 3 2 1 2 3 2 1]
        assert_eq!(
            reflect_pad_end(&[1.0, 2.0, 3.0], 6),
            vec![1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]
        );
        assert_eq!(reflect_pad_end(&[5.0], 3), vec![5.0; 4]);
    }

    #[test]
    fn short_input_is_padded() {
        let data = Array2::from_shape_fn((19, 625), |(c, t)| (c * 1000 + t) as f32);
        let (out, action) = reconcile_shape(&data, (19, 2500));
        assert_eq!(out.dim(), (19, 2500));
        assert_eq!(action, Reconcile::Padded(19 * 1875));
        // Original samples untouched, first padded sample mirrors t = 623.
        assert_eq!(out[[3, 624]], 3624.0);
        assert_eq!(out[[3, 625]], 3623.0);
    }

    #[test]
    fn long_input_is_trimmed() {
        let data = Array2::from_shape_fn((19, 2600), |(c, t)| (c * 10_000 + t) as f32);
        let (out, action) = reconcile_shape(&data, (19, 2500));
        assert_eq!(out.dim(), (19, 2500));
        assert_eq!(action, Reconcile::Trimmed(19 * 100));
        assert_eq!(out[[18, 2499]], 182_499.0);
    }

    #[test]
    fn row_mismatch_still_hits_target() {
        let data = Array2::from_shape_fn((7, 100), |(c, t)| (c + t) as f32);
        let (out, _) = reconcile_shape(&data, (19, 50));
        assert_eq!(out.dim(), (19, 50));
        let (out, _) = reconcile_shape(&data, (3, 10));
        assert_eq!(out.dim(), (3, 10));
    }

    #[test]
    fn empty_input_gives_zeros() {
        let (out, _) = reconcile_shape(&Array2::zeros((19, 0)), (19, 2500));
        assert_eq!(out.dim(), (19, 2500));
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn center_window_start() {
        assert_eq!(center_window(10_000, 2500), Some(3750));
        assert_eq!(center_window(2500, 2500), None);
        assert_eq!(center_window(2501, 2500), Some(0));
    }
}
