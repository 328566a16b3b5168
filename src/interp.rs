//! Interpolation utilities for wavelength-sampled curves
//!
//! Filter throughputs and spectra are tabulated at discrete wavelengths.
//! This module provides piecewise-linear lookup for resampling and cumulative
//! inversion, and a cubic spline (natural or clamped boundary conditions) for
//! smooth reconstruction of coarsely sampled curves and mangling weight
//! functions.

use thiserror::Error;

/// Errors that can occur when building an interpolant
#[derive(Debug, Error)]
pub enum InterpError {
    #[error("x and y vectors must have the same length")]
    LengthMismatch,

    #[error("x values must be strictly ascending")]
    NotAscending,

    #[error("insufficient points for interpolation, need at least {needed}")]
    InsufficientPoints { needed: usize },
}

fn validate_knots(xs: &[f64], ys: &[f64], min_points: usize) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::LengthMismatch);
    }
    if xs.len() < min_points {
        return Err(InterpError::InsufficientPoints { needed: min_points });
    }
    for i in 1..xs.len() {
        if xs[i] <= xs[i - 1] {
            return Err(InterpError::NotAscending);
        }
    }
    Ok(())
}

/// Linearly interpolate `ys` over strictly ascending `xs` at the point `x`.
///
/// Returns `None` outside the sampled range. The caller is responsible for
/// having validated the knots (this is the hot inner loop of resampling).
pub fn lerp_lookup(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let last = *xs.last()?;
    if x < xs[0] || x > last {
        return None;
    }

    // Binary search for the enclosing segment
    let mut lo = 0;
    let mut hi = xs.len() - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if xs[mid] > x {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    Some(ys[lo] * (1.0 - t) + ys[hi] * t)
}

/// Invert a monotonically non-decreasing sampled function by linear
/// interpolation.
///
/// `values` are the (cumulative) function samples and `xs` the abscissae at
/// which they were taken. Duplicate consecutive values (plateaus from
/// zero-throughput samples) are collapsed keeping the last occurrence, so the
/// inverse lands where the cumulative mass resumes rising rather than inside
/// a dead zone. Targets outside the sampled range clamp to the boundary
/// abscissa.
pub fn invert_monotonic(values: &[f64], xs: &[f64], target: f64) -> f64 {
    debug_assert_eq!(values.len(), xs.len());

    let mut v_dedup: Vec<f64> = Vec::with_capacity(values.len());
    let mut x_dedup = Vec::with_capacity(xs.len());
    for (&v, &x) in values.iter().zip(xs.iter()) {
        match v_dedup.last().copied() {
            Some(prev) if v == prev => {
                // Plateau continues; slide its anchor to the latest sample
                *x_dedup.last_mut().unwrap() = x;
            }
            Some(prev) if v < prev => {}
            _ => {
                v_dedup.push(v);
                x_dedup.push(x);
            }
        }
    }

    if target <= v_dedup[0] {
        return x_dedup[0];
    }
    if target >= *v_dedup.last().unwrap() {
        return *x_dedup.last().unwrap();
    }

    lerp_lookup(&v_dedup, &x_dedup, target).unwrap()
}

/// Boundary condition for [`CubicSpline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Zero second derivative at the end knots
    Natural,
    /// Zero first derivative at the end knots
    Clamped,
}

/// A cubic spline interpolator over strictly ascending knots.
///
/// Built with the standard tridiagonal sweep for the second derivatives at
/// each knot. The clamped variant pins the first derivative to zero at both
/// ends, which is what the mangling weight function needs so the correction
/// levels off at the spectrum boundaries.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Construct a natural cubic spline through the given knots.
    pub fn natural(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        Self::build(xs, ys, Boundary::Natural)
    }

    /// Construct a clamped cubic spline (zero end-slopes) through the knots.
    pub fn clamped(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpError> {
        Self::build(xs, ys, Boundary::Clamped)
    }

    fn build(xs: Vec<f64>, ys: Vec<f64>, boundary: Boundary) -> Result<Self, InterpError> {
        validate_knots(&xs, &ys, 2)?;

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n];

        match boundary {
            Boundary::Natural => {
                y2s[0] = 0.0;
                u[0] = 0.0;
            }
            Boundary::Clamped => {
                // End slope pinned to zero
                y2s[0] = -0.5;
                u[0] = (3.0 / (xs[1] - xs[0])) * ((ys[1] - ys[0]) / (xs[1] - xs[0]));
            }
        }

        // Forward sweep of the tridiagonal system
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        let (qn, un) = match boundary {
            Boundary::Natural => (0.0, 0.0),
            Boundary::Clamped => {
                let h = xs[n - 1] - xs[n - 2];
                (0.5, (3.0 / h) * (-(ys[n - 1] - ys[n - 2]) / h))
            }
        };
        y2s[n - 1] = (un - qn * u[n - 2]) / (qn * y2s[n - 2] + 1.0);

        // Back substitution
        for k in (0..n - 1).rev() {
            y2s[k] = y2s[k] * y2s[k + 1] + u[k];
        }

        Ok(Self { xs, ys, y2s })
    }

    /// Evaluate the spline at `x`.
    ///
    /// Outside the knot range the boundary polynomial is extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();

        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }
}
