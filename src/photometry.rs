//! Synthetic photometry: band fluxes, zero-points, and magnitudes
//!
//! A [`PhotometricIntegrator`] integrates spectra against filter responses.
//! It borrows an immutable [`ReferenceData`] for the AB and Vega reference
//! spectra rather than reaching for module-level globals, so batch callers
//! control the lifecycle and can share one context across threads.

use std::fmt;

use log::debug;
use thiserror::Error;

use crate::filter::{FilterError, FilterResponse, ResampleOrder, DEFAULT_EDGE_PC};
use crate::reference::ReferenceData;
use crate::simpson::{simpson, SimpsonError};
use crate::spectrum::Spectrum;

/// Errors that can occur during photometric integration
#[derive(Debug, Error)]
pub enum PhotometryError {
    #[error(
        "spectrum covering {have_lo:.1}..{have_hi:.1} Å does not bracket filter '{filter}' \
         ({need_lo:.1}..{need_hi:.1} Å)"
    )]
    DomainMismatch {
        filter: String,
        need_lo: f64,
        need_hi: f64,
        have_lo: f64,
        have_hi: f64,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("quadrature failed: {0}")]
    Quadrature(#[from] SimpsonError),
}

/// Photometric magnitude system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagSystem {
    Ab,
    Vega,
}

impl fmt::Display for MagSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MagSystem::Ab => write!(f, "AB"),
            MagSystem::Vega => write!(f, "Vega"),
        }
    }
}

/// Integrates spectra through filter responses against a fixed set of
/// reference spectra.
#[derive(Debug, Clone, Copy)]
pub struct PhotometricIntegrator<'a> {
    refs: &'a ReferenceData,
}

impl<'a> PhotometricIntegrator<'a> {
    pub fn new(refs: &'a ReferenceData) -> Self {
        Self { refs }
    }

    /// Integrate a spectrum through a filter.
    ///
    /// If the filter is not sampled on the spectrum's wavelength grid, a
    /// working copy is resampled onto it first; the canonical filter is
    /// untouched. The flux is the Simpson integral of T(λ)·F(λ) over the
    /// spectrum grid, divided by the canonical filter's effective area when
    /// `correct_for_area` is set.
    ///
    /// # Errors
    ///
    /// `DomainMismatch` when the spectrum does not bracket the filter's band
    /// edges: loaded spectra are never extrapolated.
    pub fn integrate_flux(
        &self,
        filter: &FilterResponse,
        spectrum: &Spectrum,
        correct_for_area: bool,
    ) -> Result<f64, PhotometryError> {
        let (need_lo, need_hi) = filter.edges(DEFAULT_EDGE_PC)?;
        let (have_lo, have_hi) = spectrum.coverage();
        if have_lo > need_lo || have_hi < need_hi {
            return Err(PhotometryError::DomainMismatch {
                filter: filter.name().to_string(),
                need_lo,
                need_hi,
                have_lo,
                have_hi,
            });
        }

        // Effective area comes from the canonical curve, computed before any
        // resampling
        let area = if correct_for_area {
            Some(filter.effective_area()?)
        } else {
            None
        };

        let resampled;
        let working = if filter.wavelength() == spectrum.wavelength() {
            filter
        } else {
            resampled = filter.resampled(spectrum.wavelength(), ResampleOrder::Linear)?;
            &resampled
        };

        let transmitted: Vec<f64> = working
            .throughput()
            .iter()
            .zip(spectrum.flux().iter())
            .map(|(t, f)| t * f)
            .collect();
        let integrated = simpson(spectrum.wavelength(), &transmitted)?;

        debug!(
            "integrated {} through '{}': {:.6e}",
            spectrum
                .provenance()
                .filename
                .as_deref()
                .unwrap_or("<synthetic>"),
            filter.name(),
            integrated
        );

        match area {
            Some(area) => Ok(integrated / area),
            None => Ok(integrated),
        }
    }

    /// AB zero-point: -2.5 log10 of the area-corrected flux of the analytic
    /// AB pseudo-spectrum through the filter. `NaN` if the flux is not
    /// positive.
    pub fn ab_zeropoint(&self, filter: &FilterResponse) -> Result<f64, PhotometryError> {
        let flux = self.integrate_flux(filter, self.refs.ab(), true)?;
        Ok(log_mag(flux))
    }

    /// Vega zero-point: same integral against the loaded Vega spectrum.
    pub fn vega_zeropoint(&self, filter: &FilterResponse) -> Result<f64, PhotometryError> {
        let flux = self.integrate_flux(filter, self.refs.vega(), true)?;
        Ok(log_mag(flux))
    }

    /// Magnitude of a spectrum through a filter in the given system.
    ///
    /// Non-positive integrated flux yields `NaN` rather than an error, so a
    /// batch over many epochs survives individual non-detections.
    pub fn magnitude(
        &self,
        filter: &FilterResponse,
        spectrum: &Spectrum,
        system: MagSystem,
    ) -> Result<f64, PhotometryError> {
        let flux = self.integrate_flux(filter, spectrum, true)?;
        let zp = match system {
            MagSystem::Ab => self.ab_zeropoint(filter)?,
            MagSystem::Vega => self.vega_zeropoint(filter)?,
        };
        Ok(log_mag(flux) - zp)
    }
}

/// -2.5 log10(flux), with `NaN` for non-positive flux.
fn log_mag(flux: f64) -> f64 {
    if flux > 0.0 {
        -2.5 * flux.log10()
    } else {
        f64::NAN
    }
}
