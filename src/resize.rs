//! 2-D image resizing for spectrogram planes.
//!
//! * [`zoom_linear`] — `scipy.ndimage.zoom(x, zoom, order=1)`: corner-aligned
//!   linear interpolation, `src = dst · (in − 1) / (out − 1)`.
//! * [`resize_cubic`] — `cv2.resize(x, (w, h), interpolation=INTER_CUBIC)`:
//!   half-pixel centres, `src = (dst + 0.5) · in / out − 0.5`, Keys kernel
//!   with `a = −0.75`, border samples replicated.
//!
//! Both are separable: rows are interpolated along axis 0, then columns.
use ndarray::{Array2, ArrayView1, Axis};

/// Linear zoom of `x` to exactly `(h, w)`.
pub fn zoom_linear(x: &Array2<f32>, (h, w): (usize, usize)) -> Array2<f32> {
    let tmp = along_axis(x, Axis(0), h, linear_taps);
    along_axis(&tmp, Axis(1), w, linear_taps)
}

/// Bicubic resize of `x` to exactly `(h, w)`.
pub fn resize_cubic(x: &Array2<f32>, (h, w): (usize, usize)) -> Array2<f32> {
    let tmp = along_axis(x, Axis(0), h, cubic_taps);
    along_axis(&tmp, Axis(1), w, cubic_taps)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Interpolation taps: `(source index, weight)` pairs for one output sample.
type Taps = Vec<(usize, f64)>;

fn along_axis(x: &Array2<f32>, axis: Axis, out_len: usize, taps: fn(usize, usize, usize) -> Taps) -> Array2<f32> {
    let in_len = x.len_of(axis);
    let mut shape = [x.nrows(), x.ncols()];
    shape[axis.index()] = out_len;
    let mut out = Array2::<f32>::zeros((shape[0], shape[1]));
    if in_len == 0 || out_len == 0 {
        return out;
    }

    let plan: Vec<Taps> = (0..out_len).map(|o| taps(o, in_len, out_len)).collect();
    for (src, mut dst) in x.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        for (o, t) in plan.iter().enumerate() {
            dst[o] = interpolate(&src, t);
        }
    }
    out
}

fn interpolate(src: &ArrayView1<f32>, taps: &[(usize, f64)]) -> f32 {
    taps.iter().map(|&(i, w)| src[i] as f64 * w).sum::<f64>() as f32
}

fn linear_taps(o: usize, in_len: usize, out_len: usize) -> Taps {
    if in_len == 1 {
        return vec![(0, 1.0)];
    }
    let pos = if out_len == 1 {
        0.0
    } else {
        o as f64 * (in_len - 1) as f64 / (out_len - 1) as f64
    };
    let i0 = (pos.floor() as usize).min(in_len - 1);
    let i1 = (i0 + 1).min(in_len - 1);
    let frac = pos - i0 as f64;
    vec![(i0, 1.0 - frac), (i1, frac)]
}

fn cubic_taps(o: usize, in_len: usize, out_len: usize) -> Taps {
    const A: f64 = -0.75;
    let pos = (o as f64 + 0.5) * in_len as f64 / out_len as f64 - 0.5;
    let base = pos.floor();
    let t = pos - base;

    let weights = [
        ((A * (t + 1.0) - 5.0 * A) * (t + 1.0) + 8.0 * A) * (t + 1.0) - 4.0 * A,
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0,
        ((A + 2.0) * (1.0 - t) - (A + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0,
        0.0,
    ];
    let w3 = 1.0 - weights[0] - weights[1] - weights[2];
    let last = in_len as isize - 1;

    (0..4)
        .map(|k| {
            let i = (base as isize - 1 + k as isize).clamp(0, last) as usize;
            let w = if k == 3 { w3 } else { weights[k] };
            (i, w)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zoom_keeps_corners() {
        let x = Array2::from_shape_fn((513, 38), |(f, t)| (f * 3 + t) as f32);
        let z = zoom_linear(&x, (128, 256));
        assert_eq!(z.dim(), (128, 256));
        assert_abs_diff_eq!(z[[0, 0]], x[[0, 0]], epsilon = 1e-3);
        assert_abs_diff_eq!(z[[127, 255]], x[[512, 37]], epsilon = 1e-3);
    }

    #[test]
    fn zoom_is_exact_on_linear_ramps() {
        let x = Array2::from_shape_fn((5, 4), |(r, c)| 2.0 * r as f32 + c as f32);
        let z = zoom_linear(&x, (9, 7));
        for ((r, c), &v) in z.indexed_iter() {
            let expect = 2.0 * (r as f32 * 4.0 / 8.0) + c as f32 * 3.0 / 6.0;
            assert_abs_diff_eq!(v, expect, epsilon = 1e-4);
        }
    }

    #[test]
    fn cubic_preserves_constants() {
        let x = Array2::from_elem((96, 228), 3.25_f32);
        let y = resize_cubic(&x, (48, 112));
        assert_eq!(y.dim(), (48, 112));
        assert!(y.iter().all(|&v| (v - 3.25).abs() < 1e-5));
    }

    #[test]
    fn cubic_identity_when_shape_unchanged() {
        let x = Array2::from_shape_fn((6, 9), |(r, c)| ((r * 9 + c) as f32).sin());
        let y = resize_cubic(&x, (6, 9));
        for (a, b) in x.iter().zip(y.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }
}
