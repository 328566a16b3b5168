//! Spectral mangling
//!
//! Mangling warps a template spectrum's broadband shape with a smooth
//! multiplicative spline so its synthetic photometry matches observed fluxes,
//! while leaving fine spectral features alone. One weight per constraint
//! filter is fitted; two extra weights pinned at 1.0 at the spectrum's
//! wavelength extremes taper the correction to a no-op outside the
//! constrained range.

use log::{debug, warn};
use nalgebra::DVector;
use thiserror::Error;

use crate::filter::{FilterError, FilterResponse, ResampleOrder, DEFAULT_EDGE_PC};
use crate::interp::CubicSpline;
use crate::lsq::{levenberg_marquardt, LsqError, LsqOptions};
use crate::photometry::PhotometryError;
use crate::simpson::simpson;
use crate::spectrum::Spectrum;

/// Errors that can occur while mangling
#[derive(Debug, Error)]
pub enum MangleError {
    #[error("constraint filters '{first}' and '{second}' share effective wavelength {wavelength:.1} Å")]
    ConstraintOrder {
        first: String,
        second: String,
        wavelength: f64,
    },

    #[error("mangling needs at least 2 unmasked constraints, got {0}")]
    InsufficientConstraints(usize),

    #[error(
        "mangling fit did not converge within {iterations} iterations \
         (residual norm {residual_norm:.6e})"
    )]
    NonConvergence {
        iterations: usize,
        residual_norm: f64,
    },

    #[error(transparent)]
    Photometry(#[from] PhotometryError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("solver failed: {0}")]
    Solver(#[from] LsqError),
}

/// A single target for the mangling fit: make the spectrum's synthetic flux
/// through `filter` equal `target_flux`.
///
/// Masked constraints keep their spline knot (the weight still varies with
/// its neighbors along the wavelength axis) but contribute no residual.
#[derive(Debug, Clone)]
pub struct PhotometricConstraint {
    pub filter: FilterResponse,
    pub target_flux: f64,
    pub masked: bool,
}

impl PhotometricConstraint {
    pub fn new(filter: FilterResponse, target_flux: f64) -> Self {
        Self {
            filter,
            target_flux,
            masked: false,
        }
    }

    pub fn masked(filter: FilterResponse, target_flux: f64) -> Self {
        Self {
            filter,
            target_flux,
            masked: true,
        }
    }
}

/// An ordered table of mangling constraints, sorted by filter effective
/// wavelength. The ordering matters: effective wavelengths are the abscissae
/// of the weight spline.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    constraints: Vec<PhotometricConstraint>,
    effective_wavelengths: Vec<f64>,
}

impl ConstraintSet {
    /// Build a constraint table, sorting by effective wavelength.
    ///
    /// # Errors
    ///
    /// `ConstraintOrder` if two filters share an effective wavelength, and
    /// `InsufficientConstraints` if fewer than two constraints are unmasked.
    pub fn new(constraints: Vec<PhotometricConstraint>) -> Result<Self, MangleError> {
        let unmasked = constraints.iter().filter(|c| !c.masked).count();
        if unmasked < 2 {
            return Err(MangleError::InsufficientConstraints(unmasked));
        }

        let mut keyed: Vec<(f64, PhotometricConstraint)> = constraints
            .into_iter()
            .map(|c| Ok((c.filter.effective_wavelength()?, c)))
            .collect::<Result<_, FilterError>>()?;
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

        for pair in keyed.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(MangleError::ConstraintOrder {
                    first: pair[0].1.filter.name().to_string(),
                    second: pair[1].1.filter.name().to_string(),
                    wavelength: pair[0].0,
                });
            }
        }

        let (effective_wavelengths, constraints) = keyed.into_iter().unzip();
        Ok(Self {
            constraints,
            effective_wavelengths,
        })
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> &[PhotometricConstraint] {
        &self.constraints
    }

    /// Effective wavelengths, ascending, one per constraint.
    pub fn effective_wavelengths(&self) -> &[f64] {
        &self.effective_wavelengths
    }
}

/// Mangling fit configuration
#[derive(Debug, Clone, Copy)]
pub struct MangleOptions {
    /// Maximum solver iterations before reporting non-convergence
    pub max_iterations: usize,

    /// Relative cost-reduction tolerance for the solver
    pub tolerance: f64,
}

impl Default for MangleOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-12,
        }
    }
}

/// A successfully mangled spectrum with its fit diagnostics.
#[derive(Debug, Clone)]
pub struct Mangled {
    /// Deep copy of the input spectrum with the weight spline applied
    pub spectrum: Spectrum,

    /// Fitted multiplicative weight per constraint, in constraint order
    pub weights: Vec<f64>,

    /// Solver iterations used
    pub iterations: usize,

    /// Final residual norm across the unmasked constraints
    pub residual_norm: f64,
}

/// Fits multiplicative spline corrections to spectra.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralMangler {
    options: MangleOptions,
}

impl SpectralMangler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MangleOptions) -> Self {
        Self { options }
    }

    /// Fit a weight spline so the spectrum's synthetic photometry matches
    /// the constraint targets.
    ///
    /// The input spectrum is never mutated; the result holds a corrected
    /// deep copy. Interior weights start at 1.0 (the unmodified spectrum)
    /// and boundary weights stay pinned at 1.0.
    pub fn fit(
        &self,
        spectrum: &Spectrum,
        constraints: &ConstraintSet,
    ) -> Result<Mangled, MangleError> {
        let grid = spectrum.wavelength();
        let (wmin, wmax) = spectrum.coverage();

        // Spline knots: spectrum extremes bracketing the effective
        // wavelengths, which therefore must fall strictly inside coverage
        let mut knots = Vec::with_capacity(constraints.len() + 2);
        knots.push(wmin);
        knots.extend_from_slice(constraints.effective_wavelengths());
        knots.push(wmax);

        let mut prepared = Vec::with_capacity(constraints.len());
        for constraint in constraints.constraints() {
            let filter = &constraint.filter;
            let (need_lo, need_hi) = filter.edges(DEFAULT_EDGE_PC)?;
            if wmin > need_lo || wmax < need_hi {
                return Err(MangleError::Photometry(PhotometryError::DomainMismatch {
                    filter: filter.name().to_string(),
                    need_lo,
                    need_hi,
                    have_lo: wmin,
                    have_hi: wmax,
                }));
            }

            // Resample once: the mangled spectrum always lives on the same
            // grid, so the working copies can be reused every iteration
            let area = filter.effective_area()?;
            let working = filter.resampled(grid, ResampleOrder::Linear)?;
            prepared.push(PreparedConstraint {
                throughput: working.throughput().to_vec(),
                area,
                target_flux: constraint.target_flux,
                masked: constraint.masked,
            });
        }

        let residuals = |params: &DVector<f64>| -> Result<DVector<f64>, LsqError> {
            let weighted = weighted_flux(spectrum, &knots, params)
                .map_err(|e| LsqError::EvaluationFailed(e.to_string()))?;

            let mut out = Vec::with_capacity(prepared.len());
            for c in prepared.iter().filter(|c| !c.masked) {
                let transmitted: Vec<f64> = c
                    .throughput
                    .iter()
                    .zip(weighted.iter())
                    .map(|(t, f)| t * f)
                    .collect();
                let flux = simpson(grid, &transmitted)
                    .map_err(|e| LsqError::EvaluationFailed(e.to_string()))?
                    / c.area;
                out.push(c.target_flux - flux);
            }
            Ok(DVector::from_vec(out))
        };

        let initial = DVector::from_element(constraints.len(), 1.0);
        let lsq_options = LsqOptions {
            max_iterations: self.options.max_iterations,
            cost_tolerance: self.options.tolerance,
            ..Default::default()
        };
        let fit = levenberg_marquardt(residuals, initial, &lsq_options)?;

        if !fit.converged {
            return Err(MangleError::NonConvergence {
                iterations: fit.iterations,
                residual_norm: fit.residual_norm,
            });
        }

        let weights: Vec<f64> = fit.params.iter().copied().collect();
        for (weight, eff) in weights.iter().zip(constraints.effective_wavelengths()) {
            if *weight <= 0.0 {
                warn!(
                    "mangling weight {:.4} at {:.1} Å is non-positive; the corrected flux flips sign",
                    weight, eff
                );
            }
        }
        debug!(
            "mangling converged in {} iterations, residual norm {:.6e}, weights {:?}",
            fit.iterations, fit.residual_norm, weights
        );

        let spline = weight_spline(&knots, &fit.params)
            .map_err(|e| LsqError::EvaluationFailed(e.to_string()))?;
        let mangled = spectrum.weighted(|w| spline.evaluate(w));

        Ok(Mangled {
            spectrum: mangled,
            weights,
            iterations: fit.iterations,
            residual_norm: fit.residual_norm,
        })
    }
}

struct PreparedConstraint {
    throughput: Vec<f64>,
    area: f64,
    target_flux: f64,
    masked: bool,
}

/// Clamped cubic spline through (knot, weight) pairs with unit boundary
/// weights.
fn weight_spline(knots: &[f64], params: &DVector<f64>) -> Result<CubicSpline, crate::interp::InterpError> {
    let mut weights = Vec::with_capacity(params.len() + 2);
    weights.push(1.0);
    weights.extend(params.iter().copied());
    weights.push(1.0);
    CubicSpline::clamped(knots.to_vec(), weights)
}

/// The spectrum's flux with the current weight spline applied, evaluated on
/// its own grid.
fn weighted_flux(
    spectrum: &Spectrum,
    knots: &[f64],
    params: &DVector<f64>,
) -> Result<Vec<f64>, crate::interp::InterpError> {
    let spline = weight_spline(knots, params)?;
    Ok(spectrum
        .wavelength()
        .iter()
        .zip(spectrum.flux().iter())
        .map(|(w, f)| f * spline.evaluate(*w))
        .collect())
}
