//! Reference spectra for zero-point calibration
//!
//! The AB system is defined against an analytic flat-in-frequency
//! pseudo-spectrum; the Vega system against an observed spectrum of alpha
//! Lyrae loaded from disk. Both live in an immutable [`ReferenceData`]
//! context constructed once at startup and shared read-only thereafter.

use std::path::Path;

use crate::spectrum::{Provenance, Spectrum, SpectrumError, CGS};

/// Frequency grid for the generated AB pseudo-spectrum: 1000 points spanning
/// 2e13 .. 2e15 Hz (roughly 15 um down to 1500 Å).
const AB_FREQ_LOW_HZ: f64 = 2e13;
const AB_FREQ_HIGH_HZ: f64 = 2e15;
const AB_GRID_POINTS: usize = 1000;

/// Minimum wavelength kept when loading the Vega spectrum (Å).
pub const VEGA_WMIN: f64 = 1500.0;

/// Generate the analytic AB pseudo-spectrum.
///
/// Flat f_nu = 3.63078e-20 erg s⁻¹ cm⁻² Hz⁻¹ over a linear frequency grid,
/// converted to flux per unit wavelength on an ascending wavelength axis.
pub fn ab_pseudospectrum() -> Spectrum {
    let f_nu = CGS::AB_REFERENCE_FLUX_DENSITY;
    let df = (AB_FREQ_HIGH_HZ - AB_FREQ_LOW_HZ) / (AB_GRID_POINTS - 1) as f64;

    let mut wavelength = Vec::with_capacity(AB_GRID_POINTS);
    let mut flux = Vec::with_capacity(AB_GRID_POINTS);

    // Descending frequency so wavelength ascends
    for i in (0..AB_GRID_POINTS).rev() {
        let freq = AB_FREQ_LOW_HZ + df * i as f64;
        let lambda = CGS::SPEED_OF_LIGHT_ANGSTROM / freq;
        wavelength.push(lambda);
        flux.push(freq * f_nu / lambda);
    }

    // The grid is analytic and strictly ascending; construction cannot fail
    Spectrum::new(wavelength, flux)
        .expect("AB pseudo-spectrum grid is valid by construction")
}

/// Load the Vega (alpha Lyrae) reference spectrum, dropping samples below
/// [`VEGA_WMIN`].
pub fn load_vega(path: &Path) -> Result<Spectrum, SpectrumError> {
    Spectrum::load_windowed(path, VEGA_WMIN, crate::spectrum::DEFAULT_WMAX)
}

/// Immutable bundle of the reference spectra used for zero-points.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    ab: Spectrum,
    vega: Spectrum,
}

impl ReferenceData {
    /// Build reference data from a Vega spectrum; the AB pseudo-spectrum is
    /// generated analytically.
    pub fn new(vega: Spectrum) -> Self {
        Self {
            ab: ab_pseudospectrum(),
            vega,
        }
    }

    /// Build reference data loading Vega from a file.
    pub fn from_vega_file(path: &Path) -> Result<Self, SpectrumError> {
        Ok(Self::new(load_vega(path)?))
    }

    pub fn ab(&self) -> &Spectrum {
        &self.ab
    }

    pub fn vega(&self) -> &Spectrum {
        &self.vega
    }
}

/// m_AB - m_Vega offsets for standard bands, after Blanton et al. (2007).
///
/// UBVRI are the Bessell (1990) filters, ugriz the SDSS DR4 ones, and JHKs
/// those of Cohen et al. (2003). Returns `None` for unknown bands.
pub fn ab_vega_offset(band: &str) -> Option<f64> {
    let offset = match band {
        "U" => 0.79,
        "B" => 0.09,
        "V" => 0.02,
        "R" => 0.21,
        "I" => 0.45,
        "u" => 0.91,
        "g" => 0.08,
        "r" => 0.16,
        "i" => 0.37,
        "z" => 0.54,
        "J" => 0.91,
        "H" => 1.39,
        "Ks" => 1.85,
        _ => return None,
    };
    Some(offset)
}

/// Convenience constructor for a synthetic flat-f_nu spectrum restricted to
/// a wavelength window, useful as a stand-in Vega in tests and tools.
///
/// # Panics
///
/// Panics if `points < 2`; an interpolatable spectrum needs at least two
/// samples.
pub fn flat_fnu_spectrum(f_nu: f64, wmin: f64, wmax: f64, points: usize) -> Spectrum {
    assert!(points >= 2, "flat spectrum needs at least two samples");
    let dw = (wmax - wmin) / (points - 1) as f64;
    let mut wavelength = Vec::with_capacity(points);
    let mut flux = Vec::with_capacity(points);
    for i in 0..points {
        let lambda = wmin + dw * i as f64;
        let freq = CGS::SPEED_OF_LIGHT_ANGSTROM / lambda;
        wavelength.push(lambda);
        flux.push(freq * f_nu / lambda);
    }
    Spectrum::new(wavelength, flux)
        .expect("flat spectrum grid is valid by construction")
        .with_provenance(Provenance::default())
}
