//! Dense nonlinear least squares
//!
//! A small Levenberg-Marquardt implementation over `nalgebra` dynamic
//! vectors, with a forward-difference Jacobian. The mangler is the only
//! in-crate consumer but the solver knows nothing about spectra: it takes a
//! residual closure and reports convergence explicitly so callers can decide
//! what a non-converged fit means.

use log::debug;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Errors that can occur while running the solver
#[derive(Debug, Error)]
pub enum LsqError {
    #[error("residual vector is empty")]
    EmptyResiduals,

    #[error("initial parameter vector is empty")]
    EmptyParameters,

    #[error("residual evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("residuals are not finite")]
    NonFiniteResiduals,
}

/// Solver configuration
#[derive(Debug, Clone, Copy)]
pub struct LsqOptions {
    /// Maximum number of accepted Levenberg-Marquardt steps
    pub max_iterations: usize,

    /// Relative cost-reduction threshold for convergence
    pub cost_tolerance: f64,

    /// Relative step-size threshold for convergence
    pub step_tolerance: f64,
}

impl Default for LsqOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cost_tolerance: 1e-12,
            step_tolerance: 1e-10,
        }
    }
}

/// Result of a least-squares run
#[derive(Debug, Clone)]
pub struct LsqFit {
    /// Final parameter estimate
    pub params: DVector<f64>,

    /// Number of iterations performed
    pub iterations: usize,

    /// Euclidean norm of the final residual vector
    pub residual_norm: f64,

    /// Whether a convergence criterion was met within the iteration budget
    pub converged: bool,
}

/// Minimize the sum of squared residuals with Levenberg-Marquardt.
///
/// # Arguments
///
/// * `residuals` - Closure mapping parameters to the residual vector
/// * `initial` - Starting parameter estimate
/// * `options` - Iteration and tolerance limits
///
/// # Returns
///
/// The fit result; inspect [`LsqFit::converged`] before trusting the
/// parameters.
pub fn levenberg_marquardt<F>(
    mut residuals: F,
    initial: DVector<f64>,
    options: &LsqOptions,
) -> Result<LsqFit, LsqError>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, LsqError>,
{
    if initial.is_empty() {
        return Err(LsqError::EmptyParameters);
    }

    let mut params = initial;
    let mut r = residuals(&params)?;
    if r.is_empty() {
        return Err(LsqError::EmptyResiduals);
    }
    if r.iter().any(|v| !v.is_finite()) {
        return Err(LsqError::NonFiniteResiduals);
    }

    let n_params = params.len();
    let mut cost = r.norm_squared();
    let mut damping: Option<f64> = None;
    let mut converged = false;
    let mut any_accepted = false;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        let jacobian = finite_difference_jacobian(&mut residuals, &params, &r)?;
        let jt = jacobian.transpose();
        let gradient = &jt * &r;
        let hessian_approx = &jt * &jacobian;

        // Initialize damping from the Hessian scale on the first iteration
        let lambda = damping.get_or_insert_with(|| {
            let max_diag = (0..n_params)
                .map(|i| hessian_approx[(i, i)])
                .fold(0.0_f64, f64::max);
            1e-3 * max_diag.max(1e-12)
        });

        // Inner loop: inflate damping until a step reduces the cost
        let mut accepted = false;
        for _ in 0..32 {
            let mut damped = hessian_approx.clone();
            for i in 0..n_params {
                damped[(i, i)] += *lambda * hessian_approx[(i, i)].max(1e-12);
            }

            let step = match damped.cholesky() {
                Some(chol) => chol.solve(&(-&gradient)),
                None => {
                    *lambda *= 4.0;
                    continue;
                }
            };

            let trial = &params + &step;
            let trial_r = residuals(&trial)?;
            let trial_cost = trial_r.norm_squared();

            if trial_cost.is_finite() && trial_cost < cost {
                let cost_drop = cost - trial_cost;
                let step_norm = step.norm();

                params = trial;
                r = trial_r;
                cost = trial_cost;
                *lambda = (*lambda * 0.25).max(1e-14);
                accepted = true;
                any_accepted = true;

                if cost_drop <= options.cost_tolerance * cost.max(1e-30)
                    || step_norm <= options.step_tolerance * (params.norm() + options.step_tolerance)
                    || cost <= 1e-300
                {
                    converged = true;
                }
                break;
            }
            *lambda *= 4.0;
        }

        iterations += 1;

        if !accepted {
            // Damping saturated without improving the cost. That only means a
            // minimum if the fit has already moved downhill or the gradient
            // has vanished; a stall straight from the starting point is a
            // failure, not convergence.
            converged = any_accepted || gradient.norm() <= options.step_tolerance;
            break;
        }
        if converged {
            break;
        }
    }

    debug!(
        "levenberg_marquardt finished: {} iterations, cost {:.6e}, converged: {}",
        iterations, cost, converged
    );

    Ok(LsqFit {
        residual_norm: cost.sqrt(),
        params,
        iterations,
        converged,
    })
}

/// Forward-difference Jacobian of the residual vector.
fn finite_difference_jacobian<F>(
    residuals: &mut F,
    params: &DVector<f64>,
    r0: &DVector<f64>,
) -> Result<DMatrix<f64>, LsqError>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, LsqError>,
{
    let m = r0.len();
    let n = params.len();
    let mut jacobian = DMatrix::zeros(m, n);
    let sqrt_eps = f64::EPSILON.sqrt();

    for j in 0..n {
        let step = sqrt_eps * params[j].abs().max(1.0);
        let mut shifted = params.clone();
        shifted[j] += step;

        let r_shifted = residuals(&shifted)?;
        if r_shifted.len() != m {
            return Err(LsqError::EvaluationFailed(
                "residual length changed between evaluations".to_string(),
            ));
        }
        for i in 0..m {
            jacobian[(i, j)] = (r_shifted[i] - r0[i]) / step;
        }
    }

    Ok(jacobian)
}
