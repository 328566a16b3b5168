//! Composite Simpson-rule quadrature
//!
//! Band fluxes and filter areas are integrals of sampled curves over
//! wavelength. Samples are not assumed equally spaced: the Simpson weights
//! are derived per interval pair, and an odd trailing interval falls back to
//! the trapezoid rule.

use thiserror::Error;

/// Errors that can occur during Simpson integration
#[derive(Debug, Error)]
pub enum SimpsonError {
    #[error("insufficient points for integration, need at least 2 points")]
    InsufficientPoints,

    #[error("sample points must be in ascending order")]
    NotAscending,

    #[error("sample and value vectors must have the same length")]
    LengthMismatch,
}

/// Integrate sampled values `ys` over abscissae `xs` with the composite
/// Simpson rule.
///
/// # Arguments
///
/// * `xs` - Sample points in strictly ascending order
/// * `ys` - Sampled function values, one per sample point
///
/// # Returns
///
/// The integral estimate, or an error if the samples are invalid.
pub fn simpson(xs: &[f64], ys: &[f64]) -> Result<f64, SimpsonError> {
    if xs.len() != ys.len() {
        return Err(SimpsonError::LengthMismatch);
    }
    if xs.len() < 2 {
        return Err(SimpsonError::InsufficientPoints);
    }
    for i in 1..xs.len() {
        if xs[i] <= xs[i - 1] {
            return Err(SimpsonError::NotAscending);
        }
    }

    let n_intervals = xs.len() - 1;
    let mut sum = 0.0;

    // Simpson over consecutive interval pairs, with weights generalized for
    // unequal spacing (exact for quadratics on any grid)
    let mut i = 0;
    while i + 2 <= n_intervals {
        let h0 = xs[i + 1] - xs[i];
        let h1 = xs[i + 2] - xs[i + 1];
        let span = h0 + h1;

        sum += (span / 6.0)
            * ((2.0 - h1 / h0) * ys[i]
                + (span * span / (h0 * h1)) * ys[i + 1]
                + (2.0 - h0 / h1) * ys[i + 2]);
        i += 2;
    }

    // Trapezoid on a leftover odd interval
    if i < n_intervals {
        sum += (xs[i + 1] - xs[i]) * (ys[i] + ys[i + 1]) / 2.0;
    }

    Ok(sum)
}
