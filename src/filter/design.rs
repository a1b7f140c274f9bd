//! Butterworth band-pass design matching `scipy.signal.butter(order, [lo, hi], btype="bandpass")`.
//!
//! For an order-N band-pass at `[low, high]` Hz with sampling rate `sfreq`:
//!   • analog prototype poles  p_k = −exp(iπ·m / 2N),  m = −N+1, −N+3, …, N−1
//!   • pre-warped band edges   w = 2·fs · tan(π·f / fs)
//!   • low-pass → band-pass    p → p·bw/2 ± √((p·bw/2)² − w0²)
//!   • bilinear transform      z = (2fs + s) / (2fs − s)
//!
//! The 2N digital poles are grouped into N second-order sections.  Every
//! section carries one zero at z = +1 and one at z = −1, so its numerator is
//! `[1, 0, −1]`; the overall gain is folded into the first section.
//! Cascaded biquads stay well conditioned where the expanded `[b, a]`
//! polynomial of a 0.25 Hz / 200 Hz order-5 design does not.
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// One biquad: `H(z) = (b0 + b1 z⁻¹ + b2 z⁻²) / (1 + a1 z⁻¹ + a2 z⁻²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    /// Denominator with the leading 1 stored explicitly.
    pub a: [f64; 3],
}

impl Biquad {
    /// DC gain `Σb / Σa`.
    pub fn dc_gain(&self) -> f64 {
        let sb: f64 = self.b.iter().sum();
        let sa: f64 = self.a.iter().sum();
        if sa.abs() < f64::EPSILON { 0.0 } else { sb / sa }
    }

    /// Complex response at normalised angular frequency `w` (rad/sample).
    pub fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b[0] + z1 * self.b[1] + z2 * self.b[2];
        let den = self.a[0] + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }
}

/// A band-pass design: the cascade plus what it was designed for.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPass {
    pub sections: Vec<Biquad>,
    pub low: f32,
    pub high: f32,
    pub order: usize,
    pub sfreq: f32,
}

impl BandPass {
    /// Odd-extension length used by [`filtfilt`](super::apply::filtfilt).
    ///
    /// scipy pads `3 · max(len(a), len(b))` samples; for a band-pass of
    /// order N both polynomials have `2N + 1` coefficients.
    pub fn padlen(&self) -> usize {
        3 * (2 * self.order + 1)
    }

    /// Magnitude response at `freq` Hz.
    pub fn gain_at(&self, freq: f32) -> f64 {
        let w = 2.0 * PI * freq as f64 / self.sfreq as f64;
        self.sections
            .iter()
            .map(|s| s.response(w))
            .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

/// Design an order-`order` Butterworth band-pass for `[low, high]` Hz.
///
/// # Panics
///
/// Panics if the band edges are not `0 < low < high < sfreq / 2`; band edges
/// come from [`PipelineConfig`](crate::PipelineConfig), never from data.
pub fn butter_bandpass(order: usize, low: f32, high: f32, sfreq: f32) -> BandPass {
    assert!(order > 0, "filter order must be positive");
    assert!(
        0.0 < low && low < high && high < sfreq / 2.0,
        "band [{low}, {high}] Hz is invalid for fs = {sfreq} Hz"
    );
    let fs2 = 2.0 * sfreq as f64;
    let warp = |f: f32| fs2 * (PI * f as f64 / sfreq as f64).tan();
    let (wl, wh) = (warp(low), warp(high));
    let bw = wh - wl;
    let w0_sq = wl * wh;

    // Analog prototype → band-pass poles.
    let n = order as i64;
    let mut poles_s = Vec::with_capacity(2 * order);
    for m in (-n + 1..n).step_by(2) {
        let p = -Complex64::from_polar(1.0, PI * m as f64 / (2 * n) as f64);
        let p_lp = p * (bw / 2.0);
        let root = (p_lp * p_lp - w0_sq).sqrt();
        poles_s.push(p_lp + root);
        poles_s.push(p_lp - root);
    }

    // Bilinear transform; `order` zeros at s = 0 map to z = +1, the rest
    // (at s = ∞) to z = −1.
    let poles_z: Vec<Complex64> = poles_s.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let denom = poles_s.iter().fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    let gain = (Complex64::new((bw * fs2).powi(order as i32), 0.0) / denom).re;

    let mut sections = group_poles(&poles_z);
    debug_assert_eq!(sections.len(), order);
    if let Some(first) = sections.first_mut() {
        first.b.iter_mut().for_each(|v| *v *= gain);
    }

    BandPass { sections, low, high, order, sfreq }
}

/// Pair conjugate poles (and leftover real poles) into biquads.
fn group_poles(poles: &[Complex64]) -> Vec<Biquad> {
    const IM_TOL: f64 = 1e-12;
    let mut sections = Vec::with_capacity(poles.len() / 2);
    let mut reals: Vec<f64> = Vec::new();

    for p in poles {
        if p.im > IM_TOL {
            sections.push(Biquad {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -2.0 * p.re, p.norm_sqr()],
            });
        } else if p.im.abs() <= IM_TOL {
            reals.push(p.re);
        }
    }

    reals.sort_by(f64::total_cmp);
    for pair in reals.chunks(2) {
        let (r1, r2) = (pair[0], pair.get(1).copied().unwrap_or(0.0));
        sections.push(Biquad {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -(r1 + r2), r1 * r2],
        });
    }
    sections
}

/// Steady-state initial conditions of the cascade for a unit step input
/// (`scipy.signal.sosfilt_zi`).
///
/// For a transposed direct-form II section with DC gain `g`:
///   z1 = g − b0,   z2 = b2 − a2·g
/// and each later section sees the step scaled by the gains before it.
pub fn sos_zi(sections: &[Biquad]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    sections
        .iter()
        .map(|s| {
            let g = s.dc_gain();
            let zi = [scale * (g - s.b[0]), scale * (s.b[2] - s.a[2] * g)];
            scale *= g;
            zi
        })
        .collect()
}
