//! End-to-end pipeline test: load filters and a spectrum from disk, compute
//! synthetic photometry against the reference context, mangle the spectrum
//! to shifted targets, and verify the corrected photometry.

use std::io::Write;

use approx::assert_relative_eq;
use tempfile::NamedTempFile;

use passband::{
    ConstraintSet, FilterResponse, MagSystem, PhotometricConstraint, PhotometricIntegrator,
    ReferenceData, SpectralMangler, Spectrum,
};

/// Write a triangular filter profile to a temp file as the loader expects it.
fn filter_file(center: f64, half_width: f64) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".dat").tempfile().unwrap();
    let n = 101;
    for i in 0..n {
        let w = center - half_width + 2.0 * half_width * i as f64 / (n - 1) as f64;
        let t = (1.0 - (w - center).abs() / half_width).max(0.0);
        writeln!(file, "{:.3} {:.6}", w, t).unwrap();
    }
    file.flush().unwrap();
    file
}

/// A smooth spectrum file spanning 3500..9500 Å.
fn spectrum_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# synthetic template").unwrap();
    for i in 0..=1200 {
        let w = 3500.0 + 5.0 * i as f64;
        let f = 2.0 + ((w - 3500.0) / 6000.0 * std::f64::consts::PI).sin();
        writeln!(file, "{:.3} {:.6e}", w, f).unwrap();
    }
    file.flush().unwrap();
    file
}

/// A crude flat-ish Vega stand-in file.
fn vega_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..=2000 {
        let w = 1500.0 + 5.0 * i as f64;
        writeln!(file, "{:.3} {:.6e}", w, 3.0e-9 * (5500.0 / w)).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn mangle_pipeline_from_files() {
    let filter_files = [
        filter_file(4400.0, 450.0),
        filter_file(5500.0, 450.0),
        filter_file(6600.0, 450.0),
        filter_file(7700.0, 450.0),
    ];
    let filters: Vec<FilterResponse> = filter_files
        .iter()
        .map(|f| FilterResponse::load(f.path()).unwrap())
        .collect();

    let spec_file = spectrum_file();
    let spectrum = Spectrum::load(spec_file.path()).unwrap();
    assert!(spectrum.provenance().filename.is_some());

    let vega = vega_file();
    let refs = ReferenceData::from_vega_file(vega.path()).unwrap();
    let integrator = PhotometricIntegrator::new(&refs);

    // Synthetic photometry of the template through each band
    let fluxes: Vec<f64> = filters
        .iter()
        .map(|f| integrator.integrate_flux(f, &spectrum, true).unwrap())
        .collect();
    assert!(fluxes.iter().all(|&f| f > 0.0));

    // Magnitudes exist in both systems
    for filter in &filters {
        let ab = integrator
            .magnitude(filter, &spectrum, MagSystem::Ab)
            .unwrap();
        let vega = integrator
            .magnitude(filter, &spectrum, MagSystem::Vega)
            .unwrap();
        assert!(ab.is_finite());
        assert!(vega.is_finite());
    }

    // Mangle toward photometry shifted per band
    let factors = [1.15, 0.9, 1.05, 0.95];
    let constraints = ConstraintSet::new(
        filters
            .iter()
            .zip(fluxes.iter().zip(factors.iter()))
            .map(|(f, (&flux, &k))| PhotometricConstraint::new(f.clone(), k * flux))
            .collect(),
    )
    .unwrap();

    let result = SpectralMangler::new().fit(&spectrum, &constraints).unwrap();

    for (filter, (&flux, &k)) in filters.iter().zip(fluxes.iter().zip(factors.iter())) {
        let mangled_flux = integrator
            .integrate_flux(filter, &result.spectrum, true)
            .unwrap();
        assert_relative_eq!(mangled_flux, k * flux, max_relative = 1e-4);
    }

    // The correction tapers to unity at the spectrum boundaries
    let first_ratio = result.spectrum.flux()[0] / spectrum.flux()[0];
    let last_ratio = result.spectrum.flux().last().unwrap() / spectrum.flux().last().unwrap();
    assert_relative_eq!(first_ratio, 1.0, epsilon = 1e-9);
    assert_relative_eq!(last_ratio, 1.0, epsilon = 1e-9);

    // Provenance carries through to the mangled output
    assert_eq!(
        result.spectrum.provenance().filename,
        spectrum.provenance().filename
    );

    // Saving the mangled spectrum records the original file in a comment
    let out = NamedTempFile::new().unwrap();
    result.spectrum.save(out.path()).unwrap();
    let contents = std::fs::read_to_string(out.path()).unwrap();
    assert!(contents.starts_with('#'));
}
