//! Supernova filter photometry and spectral mangling
//!
//! This crate ingests filter transmission curves and supernova spectra,
//! computes synthetic photometry (band fluxes, AB/Vega zero-points,
//! magnitudes), and fits smooth multiplicative "mangling" corrections so a
//! template spectrum's synthetic photometry matches observed multi-band
//! fluxes.
//!
//! The main entry points:
//! - [`FilterResponse`] for throughput curves and their derived quantities
//! - [`Spectrum`] for wavelength/flux tables
//! - [`PhotometricIntegrator`] for fluxes, zero-points, and magnitudes over
//!   a shared [`ReferenceData`] context
//! - [`SpectralMangler`] for fitting mangling corrections
//!
//! All operations are synchronous and CPU-bound; filters and spectra are
//! immutable value objects, so batches over many epochs can be parallelized
//! by the caller without sharing mutable state.

pub mod filter;
pub mod interp;
pub mod lsq;
pub mod mangle;
pub mod photometry;
pub mod reference;
pub mod simpson;
pub mod spectrum;

pub use filter::{FilterError, FilterResponse, ResampleOrder};
pub use mangle::{
    ConstraintSet, Mangled, MangleError, MangleOptions, PhotometricConstraint, SpectralMangler,
};
pub use photometry::{MagSystem, PhotometricIntegrator, PhotometryError};
pub use reference::{ab_vega_offset, ReferenceData};
pub use simpson::simpson;
pub use spectrum::{Provenance, Spectrum, SpectrumError};
