//! Spectrum model for supernova photometry
//!
//! A [`Spectrum`] is an immutable wavelength/flux table with optional flux
//! errors and provenance metadata. All wavelengths are in Angstroms and
//! fluxes in erg s⁻¹ cm⁻² Å⁻¹ unless stated otherwise. Spectra are never
//! mutated in place: mangling and rescaling produce deep copies.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Constants in CGS units
pub struct CGS {}

impl CGS {
    /// AB magnitude system reference flux density
    /// Units: erg s⁻¹ cm⁻² Hz⁻¹
    pub const AB_REFERENCE_FLUX_DENSITY: f64 = 3.63078e-20;

    /// Speed of light in vacuum
    /// Units: 2.99792458e18 Å/s (Angstroms per second)
    pub const SPEED_OF_LIGHT_ANGSTROM: f64 = 2.99792458e18;
}

/// Default wavelength window applied when loading observed spectra (Å).
///
/// Supernova spectra outside this range are usually noise-dominated, so the
/// loader drops samples beyond it unless told otherwise.
pub const DEFAULT_WMIN: f64 = 3500.0;
pub const DEFAULT_WMAX: f64 = 11000.0;

/// Errors that can occur with spectrum operations
#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("failed to read spectrum file: {0}")]
    Io(#[from] io::Error),

    #[error("malformed spectrum data at line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("wavelength and flux vectors must have the same length")]
    LengthMismatch,

    #[error("wavelengths must be strictly ascending")]
    NotAscending,

    #[error("spectrum contains no samples")]
    Empty,
}

/// Where a spectrum came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    /// Name of the source file, if loaded from disk
    pub filename: Option<String>,

    /// Observation epoch as MJD, if known
    pub mjd_obs: Option<f64>,
}

/// An observed or synthetic spectrum sampled on a strictly ascending
/// wavelength grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    flux_err: Option<Vec<f64>>,
    provenance: Provenance,
}

impl Spectrum {
    /// Create a spectrum from wavelength and flux tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the vectors differ in length, are empty, or the
    /// wavelengths are not strictly ascending.
    pub fn new(wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self, SpectrumError> {
        Self::with_errors(wavelength, flux, None)
    }

    /// Create a spectrum with per-sample flux errors.
    pub fn with_errors(
        wavelength: Vec<f64>,
        flux: Vec<f64>,
        flux_err: Option<Vec<f64>>,
    ) -> Result<Self, SpectrumError> {
        if wavelength.is_empty() {
            return Err(SpectrumError::Empty);
        }
        if wavelength.len() != flux.len() {
            return Err(SpectrumError::LengthMismatch);
        }
        if let Some(errs) = &flux_err {
            if errs.len() != wavelength.len() {
                return Err(SpectrumError::LengthMismatch);
            }
        }
        for i in 1..wavelength.len() {
            if wavelength[i] <= wavelength[i - 1] {
                return Err(SpectrumError::NotAscending);
            }
        }

        Ok(Self {
            wavelength,
            flux,
            flux_err,
            provenance: Provenance::default(),
        })
    }

    /// Attach provenance metadata, consuming self.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Load a spectrum from a 2- or 3-column whitespace-delimited text file,
    /// keeping only samples inside the default wavelength window.
    pub fn load(path: &Path) -> Result<Self, SpectrumError> {
        Self::load_windowed(path, DEFAULT_WMIN, DEFAULT_WMAX)
    }

    /// Load a spectrum keeping only samples with `wmin <= wavelength <= wmax`.
    ///
    /// Lines starting with `#` are comments. Columns are wavelength (Å),
    /// flux, and optionally flux error; the column count must be consistent
    /// across the file.
    pub fn load_windowed(path: &Path, wmin: f64, wmax: f64) -> Result<Self, SpectrumError> {
        let contents = fs::read_to_string(path)?;

        let mut wavelength = Vec::new();
        let mut flux = Vec::new();
        let mut flux_err = Vec::new();
        let mut columns: Option<usize> = None;

        for (idx, line) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            match columns {
                None => {
                    if fields.len() != 2 && fields.len() != 3 {
                        return Err(SpectrumError::Format {
                            line: line_no,
                            reason: format!("expected 2 or 3 columns, found {}", fields.len()),
                        });
                    }
                    columns = Some(fields.len());
                }
                Some(n) if fields.len() != n => {
                    return Err(SpectrumError::Format {
                        line: line_no,
                        reason: format!("expected {} columns, found {}", n, fields.len()),
                    });
                }
                Some(_) => {}
            }

            let parse = |field: &str| -> Result<f64, SpectrumError> {
                field.parse::<f64>().map_err(|_| SpectrumError::Format {
                    line: line_no,
                    reason: format!("non-numeric value '{}'", field),
                })
            };

            let w = parse(fields[0])?;
            if w < wmin || w > wmax {
                continue;
            }
            wavelength.push(w);
            flux.push(parse(fields[1])?);
            if fields.len() == 3 {
                flux_err.push(parse(fields[2])?);
            }
        }

        let errs = if flux_err.is_empty() {
            None
        } else {
            Some(flux_err)
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        Ok(Self::with_errors(wavelength, flux, errs)?.with_provenance(Provenance {
            filename,
            mjd_obs: None,
        }))
    }

    /// Write the spectrum as two whitespace-delimited columns, with the
    /// originating file name recorded in a leading comment.
    pub fn save(&self, path: &Path) -> Result<(), SpectrumError> {
        let mut out = String::new();
        if let Some(orig) = &self.provenance.filename {
            let _ = writeln!(out, "# {}", orig);
        }
        for (w, f) in self.wavelength.iter().zip(self.flux.iter()) {
            let _ = writeln!(out, "{:.5} {:.5e}", w, f);
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Wavelength samples in Å, strictly ascending.
    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    /// Flux samples, one per wavelength.
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    /// Flux errors, if the source file carried a third column.
    pub fn flux_err(&self) -> Option<&[f64]> {
        self.flux_err.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    /// Wavelength coverage as (min, max) in Å.
    pub fn coverage(&self) -> (f64, f64) {
        (self.wavelength[0], *self.wavelength.last().unwrap())
    }

    /// Deep copy with flux (and errors) scaled by a constant.
    pub fn scaled(&self, k: f64) -> Self {
        self.weighted(|_| k)
    }

    /// Deep copy with flux (and errors) multiplied pointwise by a wavelength
    /// dependent weight. The original is untouched.
    pub fn weighted<F>(&self, weight: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let weights: Vec<f64> = self.wavelength.iter().map(|&w| weight(w)).collect();
        let flux = self
            .flux
            .iter()
            .zip(weights.iter())
            .map(|(f, w)| f * w)
            .collect();
        let flux_err = self.flux_err.as_ref().map(|errs| {
            errs.iter()
                .zip(weights.iter())
                .map(|(e, w)| e * w)
                .collect()
        });

        Self {
            wavelength: self.wavelength.clone(),
            flux,
            flux_err,
            provenance: self.provenance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_new_validates() {
        assert!(matches!(
            Spectrum::new(vec![], vec![]),
            Err(SpectrumError::Empty)
        ));
        assert!(matches!(
            Spectrum::new(vec![1.0, 2.0], vec![1.0]),
            Err(SpectrumError::LengthMismatch)
        ));
        assert!(matches!(
            Spectrum::new(vec![1.0, 1.0], vec![1.0, 2.0]),
            Err(SpectrumError::NotAscending)
        ));
    }

    #[test]
    fn test_load_two_columns() {
        let file = write_temp("# a comment\n4000.0 1.0\n5000.0 2.0\n6000.0 1.5\n");
        let spec = Spectrum::load(file.path()).unwrap();

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.flux_err(), None);
        assert_relative_eq!(spec.flux()[1], 2.0);
        assert!(spec.provenance().filename.is_some());
    }

    #[test]
    fn test_load_three_columns() {
        let file = write_temp("4000.0 1.0 0.1\n5000.0 2.0 0.2\n");
        let spec = Spectrum::load(file.path()).unwrap();

        assert_eq!(spec.flux_err().unwrap(), &[0.1, 0.2]);
    }

    #[test]
    fn test_load_applies_window() {
        let file = write_temp("1000.0 9.9\n4000.0 1.0\n5000.0 2.0\n12000.0 9.9\n");
        let spec = Spectrum::load(file.path()).unwrap();

        assert_eq!(spec.coverage(), (4000.0, 5000.0));
    }

    #[test]
    fn test_load_rejects_bad_rows() {
        let file = write_temp("4000.0 1.0\n5000.0\n");
        assert!(matches!(
            Spectrum::load(file.path()),
            Err(SpectrumError::Format { line: 2, .. })
        ));

        let file = write_temp("4000.0 abc\n");
        assert!(matches!(
            Spectrum::load(file.path()),
            Err(SpectrumError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let spec = Spectrum::new(vec![4000.0, 5000.0], vec![1.25, 2.5])
            .unwrap()
            .with_provenance(Provenance {
                filename: Some("orig.dat".to_string()),
                mjd_obs: None,
            });

        let file = NamedTempFile::new().unwrap();
        spec.save(file.path()).unwrap();

        let reloaded = Spectrum::load(file.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_relative_eq!(reloaded.flux()[0], 1.25, epsilon = 1e-4);
        assert_relative_eq!(reloaded.flux()[1], 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_scaled_leaves_original() {
        let spec = Spectrum::with_errors(
            vec![4000.0, 5000.0],
            vec![1.0, 2.0],
            Some(vec![0.1, 0.2]),
        )
        .unwrap();
        let doubled = spec.scaled(2.0);

        assert_relative_eq!(doubled.flux()[0], 2.0);
        assert_relative_eq!(doubled.flux_err().unwrap()[1], 0.4);
        assert_relative_eq!(spec.flux()[0], 1.0);
    }
}
