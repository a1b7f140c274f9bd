//! IIR band-pass design and zero-phase application.
//!
//! - [`design`]: Butterworth band-pass as second-order sections, matching
//!   `scipy.signal.butter(..., btype="bandpass")`.
//! - [`apply`]: forward-backward filtering, matching `scipy.signal.filtfilt`.

pub mod apply;
pub mod design;

pub use apply::{filtfilt, filtfilt_rows};
pub use design::{butter_bandpass, sos_zi, BandPass, Biquad};
