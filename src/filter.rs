//! Filter throughput curves
//!
//! A [`FilterResponse`] models the fractional transmission of a photometric
//! filter across wavelength. Derived quantities (effective wavelength, band
//! edges, effective area) are computed lazily and cached. Filters are value
//! objects: resampling onto a new wavelength grid returns a new instance and
//! never touches the canonical curve, so the same filter can be shared across
//! spectra and threads.

use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::interp::{invert_monotonic, lerp_lookup, CubicSpline};
use crate::simpson::{simpson, SimpsonError};

/// Default percentage of cumulative throughput excluded when locating band
/// edges: the edges bound the central (100 - pc)% of the mass.
pub const DEFAULT_EDGE_PC: f64 = 3.0;

/// Zero-throughput anchor wavelengths (Å) padded around a curve before
/// resampling, so interpolation decays to zero away from the passband.
const PAD_LOW: [f64; 2] = [0.0, 1.0];
const PAD_HIGH: [f64; 2] = [24999.0, 25000.0];

/// Errors that can occur with filter operations
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to read filter file: {0}")]
    Io(#[from] io::Error),

    #[error("malformed filter data at line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("wavelength and throughput vectors must have the same length")]
    LengthMismatch,

    #[error("wavelengths must be strictly ascending")]
    NotAscending,

    #[error("throughput values must be non-negative")]
    OutOfRange,

    #[error("filter '{0}' has zero total throughput")]
    DegenerateFilter(String),

    #[error("quadrature failed: {0}")]
    Quadrature(#[from] SimpsonError),
}

/// Interpolation order used when resampling a throughput curve.
///
/// Linear is the default: higher orders ring on coarsely sampled filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleOrder {
    #[default]
    Linear,
    Cubic,
}

/// A filter transmission curve sampled on a strictly ascending wavelength
/// grid (Å), with throughput as a fraction.
#[derive(Debug, Clone)]
pub struct FilterResponse {
    name: String,
    wavelength: Vec<f64>,
    throughput: Vec<f64>,

    // Lazily computed derived quantities; edges cached for the default pc only
    effective_wavelength: OnceCell<f64>,
    default_edges: OnceCell<(f64, f64)>,
    effective_area: OnceCell<f64>,
}

impl FilterResponse {
    /// Create a filter from wavelength and throughput tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the vectors differ in length, have fewer than two
    /// samples, the wavelengths are not strictly ascending, or any
    /// throughput is negative.
    pub fn from_table(
        name: impl Into<String>,
        wavelength: Vec<f64>,
        throughput: Vec<f64>,
    ) -> Result<Self, FilterError> {
        if wavelength.len() != throughput.len() || wavelength.len() < 2 {
            return Err(FilterError::LengthMismatch);
        }
        for i in 1..wavelength.len() {
            if wavelength[i] <= wavelength[i - 1] {
                return Err(FilterError::NotAscending);
            }
        }
        if throughput.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(FilterError::OutOfRange);
        }

        Ok(Self {
            name: name.into(),
            wavelength,
            throughput,
            effective_wavelength: OnceCell::new(),
            default_edges: OnceCell::new(),
            effective_area: OnceCell::new(),
        })
    }

    /// Create an idealized boxcar filter of constant throughput over
    /// `[lower, upper]`, sampled every `step` Å, tapering to zero one step
    /// outside the band.
    pub fn boxcar(
        name: impl Into<String>,
        lower: f64,
        upper: f64,
        throughput: f64,
        step: f64,
    ) -> Result<Self, FilterError> {
        let mut wavelengths = vec![lower - step];
        let mut values = vec![0.0];
        let mut w = lower;
        while w < upper {
            wavelengths.push(w);
            values.push(throughput);
            w += step;
        }
        wavelengths.push(upper);
        values.push(throughput);
        wavelengths.push(upper + step);
        values.push(0.0);

        Self::from_table(name, wavelengths, values)
    }

    /// Load a filter from a two-column whitespace-delimited file.
    ///
    /// Throughput is assumed fractional (not percent). The filter identifier
    /// is the file stem.
    pub fn load(path: &Path) -> Result<Self, FilterError> {
        let contents = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut wavelength = Vec::new();
        let mut throughput = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(FilterError::Format {
                    line: line_no,
                    reason: format!("expected 2 columns, found {}", fields.len()),
                });
            }

            let parse = |field: &str| -> Result<f64, FilterError> {
                field.parse::<f64>().map_err(|_| FilterError::Format {
                    line: line_no,
                    reason: format!("non-numeric value '{}'", field),
                })
            };

            wavelength.push(parse(fields[0])?);
            throughput.push(parse(fields[1])?);
        }

        debug!("loaded filter '{}' with {} samples", name, wavelength.len());
        Self::from_table(name, wavelength, throughput)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn throughput(&self) -> &[f64] {
        &self.throughput
    }

    /// Wavelength coverage of the sampled curve as (min, max) in Å.
    pub fn coverage(&self) -> (f64, f64) {
        (self.wavelength[0], *self.wavelength.last().unwrap())
    }

    fn total_throughput(&self) -> f64 {
        self.throughput.iter().sum()
    }

    /// The wavelength at which the wavelength-weighted cumulative throughput
    /// reaches 50%. Cached after the first computation.
    ///
    /// # Errors
    ///
    /// `DegenerateFilter` if the curve has zero total throughput.
    pub fn effective_wavelength(&self) -> Result<f64, FilterError> {
        self.effective_wavelength
            .get_or_try_init(|| {
                let total: f64 = self
                    .wavelength
                    .iter()
                    .zip(self.throughput.iter())
                    .map(|(w, t)| w * t)
                    .sum();
                if total <= 0.0 {
                    return Err(FilterError::DegenerateFilter(self.name.clone()));
                }

                let mut cumulative = Vec::with_capacity(self.wavelength.len());
                let mut running = 0.0;
                for (w, t) in self.wavelength.iter().zip(self.throughput.iter()) {
                    running += w * t;
                    cumulative.push(running / total);
                }

                Ok(invert_monotonic(&cumulative, &self.wavelength, 0.5))
            })
            .copied()
    }

    /// Wavelengths bounding the central (100 - pc)% of cumulative throughput,
    /// as (lower, upper). The default `pc` result is cached.
    pub fn edges(&self, pc: f64) -> Result<(f64, f64), FilterError> {
        if pc == DEFAULT_EDGE_PC {
            return self.default_edges.get_or_try_init(|| self.compute_edges(pc)).copied();
        }
        self.compute_edges(pc)
    }

    fn compute_edges(&self, pc: f64) -> Result<(f64, f64), FilterError> {
        let total = self.total_throughput();
        if total <= 0.0 {
            return Err(FilterError::DegenerateFilter(self.name.clone()));
        }

        let mut cumulative = Vec::with_capacity(self.throughput.len());
        let mut running = 0.0;
        for t in &self.throughput {
            running += t;
            cumulative.push(running / total);
        }

        let tail = 0.5 * (0.01 * pc);
        let lower = invert_monotonic(&cumulative, &self.wavelength, tail);
        let upper = invert_monotonic(&cumulative, &self.wavelength, 1.0 - tail);
        Ok((lower, upper))
    }

    /// Wavelengths bounding the region of non-zero throughput, stepped one
    /// sample outward where the grid allows, as (lower, upper).
    pub fn edges_zero(&self) -> Result<(f64, f64), FilterError> {
        let first = self.throughput.iter().position(|&t| t > 0.0);
        let last = self.throughput.iter().rposition(|&t| t > 0.0);
        match (first, last) {
            (Some(first), Some(last)) => {
                let lo = first.saturating_sub(1);
                let hi = (last + 1).min(self.throughput.len() - 1);
                Ok((self.wavelength[lo], self.wavelength[hi]))
            }
            _ => Err(FilterError::DegenerateFilter(self.name.clone())),
        }
    }

    /// Integral of throughput over wavelength. Cached after the first
    /// computation.
    pub fn effective_area(&self) -> Result<f64, FilterError> {
        self.effective_area
            .get_or_try_init(|| {
                let area = simpson(&self.wavelength, &self.throughput)?;
                if area <= 0.0 {
                    return Err(FilterError::DegenerateFilter(self.name.clone()));
                }
                Ok(area)
            })
            .copied()
    }

    /// Resample the throughput curve onto a new wavelength grid, returning a
    /// new filter. The canonical curve is untouched.
    ///
    /// The curve is padded with zero-throughput anchors near 1 Å and
    /// 25000 Å before interpolation so the response decays to zero outside
    /// the passband, and any negative interpolants are clamped to zero.
    /// Derived-quantity caches are not carried over.
    pub fn resampled(&self, grid: &[f64], order: ResampleOrder) -> Result<Self, FilterError> {
        if grid.len() < 2 {
            return Err(FilterError::LengthMismatch);
        }
        for i in 1..grid.len() {
            if grid[i] <= grid[i - 1] {
                return Err(FilterError::NotAscending);
            }
        }

        let mut padded_w = Vec::with_capacity(self.wavelength.len() + 4);
        let mut padded_t = Vec::with_capacity(self.throughput.len() + 4);
        for &anchor in PAD_LOW.iter().filter(|&&a| a < self.wavelength[0]) {
            padded_w.push(anchor);
            padded_t.push(0.0);
        }
        padded_w.extend_from_slice(&self.wavelength);
        padded_t.extend_from_slice(&self.throughput);
        let top = *self.wavelength.last().unwrap();
        for &anchor in PAD_HIGH.iter().filter(|&&a| a > top) {
            padded_w.push(anchor);
            padded_t.push(0.0);
        }

        let throughput: Vec<f64> = match order {
            ResampleOrder::Linear => grid
                .iter()
                .map(|&w| lerp_lookup(&padded_w, &padded_t, w).unwrap_or(0.0).max(0.0))
                .collect(),
            ResampleOrder::Cubic => {
                let spline = CubicSpline::natural(padded_w.clone(), padded_t)
                    .map_err(|_| FilterError::LengthMismatch)?;
                let (lo, hi) = (padded_w[0], *padded_w.last().unwrap());
                grid.iter()
                    .map(|&w| {
                        if w < lo || w > hi {
                            0.0
                        } else {
                            spline.evaluate(w).max(0.0)
                        }
                    })
                    .collect()
            }
        };

        Ok(Self {
            name: self.name.clone(),
            wavelength: grid.to_vec(),
            throughput,
            effective_wavelength: OnceCell::new(),
            default_edges: OnceCell::new(),
            effective_area: OnceCell::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Uniform boxcar on [4000, 5000] Å with 1 Å sampling; zero anchors one
    /// step outside the band.
    fn test_boxcar() -> FilterResponse {
        FilterResponse::boxcar("box", 4000.0, 5000.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_from_table_valid() {
        let filter = FilterResponse::from_table(
            "test",
            vec![4000.0, 4500.0, 5000.0],
            vec![0.0, 0.8, 0.0],
        )
        .unwrap();
        assert_eq!(filter.name(), "test");
        assert_eq!(filter.coverage(), (4000.0, 5000.0));
    }

    #[rstest]
    #[case(vec![4000.0, 4500.0], vec![0.0], FilterError::LengthMismatch)]
    #[case(vec![4000.0], vec![0.5], FilterError::LengthMismatch)]
    #[case(vec![4000.0, 4000.0], vec![0.0, 0.5], FilterError::NotAscending)]
    #[case(vec![4000.0, 4500.0], vec![0.5, -0.1], FilterError::OutOfRange)]
    fn test_from_table_invalid(
        #[case] wavelength: Vec<f64>,
        #[case] throughput: Vec<f64>,
        #[case] expected: FilterError,
    ) {
        let result = FilterResponse::from_table("bad", wavelength, throughput);
        assert_eq!(
            std::mem::discriminant(&result.unwrap_err()),
            std::mem::discriminant(&expected)
        );
    }

    #[test]
    fn test_load() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "# comment\n4000.0 0.0\n4500.0 0.9\n5000.0 0.0\n").unwrap();
        file.flush().unwrap();

        let filter = FilterResponse::load(file.path()).unwrap();
        assert_eq!(filter.wavelength().len(), 3);
        assert_relative_eq!(filter.throughput()[1], 0.9);
    }

    #[test]
    fn test_load_rejects_three_columns() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "4000.0 0.5 0.1\n").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            FilterResponse::load(file.path()),
            Err(FilterError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_rejects_non_numeric() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "4000.0 half\n").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            FilterResponse::load(file.path()),
            Err(FilterError::Format { .. })
        ));
    }

    #[test]
    fn test_boxcar_effective_wavelength_near_center() {
        let filter = test_boxcar();
        let eff = filter.effective_wavelength().unwrap();

        // The wavelength-weighted cumulative median of a boxcar sits
        // slightly redward of band center (longer wavelengths carry more
        // weight); within 1% of 4500 Å
        assert_relative_eq!(eff, 4500.0, max_relative = 0.01);
    }

    #[test]
    fn test_boxcar_edges() {
        let filter = test_boxcar();
        let (lower, upper) = filter.edges(3.0).unwrap();

        // 3% of the mass split equally between the two tails
        assert_relative_eq!(lower, 4015.0, epsilon = 2.0);
        assert_relative_eq!(upper, 4985.0, epsilon = 2.0);
    }

    #[test]
    fn test_edges_zero_steps_one_sample_outward() {
        let filter = FilterResponse::from_table(
            "notch",
            vec![4000.0, 4100.0, 4200.0, 4300.0, 4400.0, 4500.0],
            vec![0.0, 0.0, 0.6, 0.6, 0.0, 0.0],
        )
        .unwrap();

        let (lower, upper) = filter.edges_zero().unwrap();
        assert_relative_eq!(lower, 4100.0);
        assert_relative_eq!(upper, 4400.0);
    }

    #[test]
    fn test_edges_zero_clamps_at_grid_boundary() {
        // Response already non-zero at the endpoints: nothing to step onto
        let filter = FilterResponse::from_table(
            "hot",
            vec![4000.0, 4100.0, 4200.0],
            vec![0.5, 0.5, 0.5],
        )
        .unwrap();

        let (lower, upper) = filter.edges_zero().unwrap();
        assert_relative_eq!(lower, 4000.0);
        assert_relative_eq!(upper, 4200.0);
    }

    #[test]
    fn test_edges_zero_degenerate() {
        let filter = FilterResponse::from_table(
            "dark",
            vec![4000.0, 4100.0, 4200.0],
            vec![0.0, 0.0, 0.0],
        )
        .unwrap();

        assert!(matches!(
            filter.edges_zero(),
            Err(FilterError::DegenerateFilter(_))
        ));
    }

    #[test]
    fn test_edges_bracket_effective_wavelength() {
        let filter = FilterResponse::from_table(
            "asym",
            vec![4000.0, 4200.0, 4400.0, 4600.0, 4800.0, 5000.0],
            vec![0.0, 0.3, 0.9, 0.6, 0.2, 0.0],
        )
        .unwrap();

        let eff = filter.effective_wavelength().unwrap();
        let (lower, upper) = filter.edges(3.0).unwrap();
        assert!(lower < eff && eff < upper, "{} < {} < {}", lower, eff, upper);
    }

    #[test]
    fn test_boxcar_effective_area() {
        let filter = test_boxcar();
        let area = filter.effective_area().unwrap();

        // 1000 Å wide at unit throughput; the one-step taper adds ~1 Å
        assert_relative_eq!(area, 1000.0, max_relative = 2e-3);
    }

    #[test]
    fn test_degenerate_filter() {
        let filter =
            FilterResponse::from_table("dead", vec![4000.0, 4500.0, 5000.0], vec![0.0, 0.0, 0.0])
                .unwrap();

        assert!(matches!(
            filter.effective_wavelength(),
            Err(FilterError::DegenerateFilter(_))
        ));
        assert!(matches!(
            filter.edges(3.0),
            Err(FilterError::DegenerateFilter(_))
        ));
        assert!(matches!(
            filter.effective_area(),
            Err(FilterError::DegenerateFilter(_))
        ));
    }

    #[test]
    fn test_zero_throughput_plateau_deduplication() {
        // Interior zero-throughput plateau produces duplicate cumulative
        // values; edge lookup must stay well defined
        let filter = FilterResponse::from_table(
            "plateau",
            vec![4000.0, 4100.0, 4200.0, 4300.0, 4400.0, 4500.0],
            vec![0.5, 0.5, 0.0, 0.0, 0.5, 0.5],
        )
        .unwrap();

        let (lower, upper) = filter.edges(3.0).unwrap();
        assert!(lower < upper);
        assert!(filter.effective_wavelength().is_ok());
    }

    #[test]
    fn test_resample_preserves_canonical_filter() {
        let filter = test_boxcar();
        let original_len = filter.wavelength().len();

        let grid: Vec<f64> = (0..=600).map(|i| 3000.0 + 5.0 * i as f64).collect();
        let resampled = filter.resampled(&grid, ResampleOrder::Linear).unwrap();

        assert_eq!(filter.wavelength().len(), original_len);
        assert_eq!(resampled.wavelength().len(), grid.len());
        // Inside the band the throughput survives, outside it is zero
        assert_relative_eq!(resampled.throughput()[300], 1.0); // 4500 Å
        assert_relative_eq!(resampled.throughput()[0], 0.0); // 3000 Å
    }

    #[test]
    fn test_resample_round_trip() {
        let filter = FilterResponse::from_table(
            "smooth",
            vec![4000.0, 4200.0, 4400.0, 4600.0, 4800.0, 5000.0],
            vec![0.0, 0.4, 0.8, 0.8, 0.4, 0.0],
        )
        .unwrap();

        let fine: Vec<f64> = (0..=500).map(|i| 3900.0 + 2.4 * i as f64).collect();
        let there = filter.resampled(&fine, ResampleOrder::Linear).unwrap();
        let back = there
            .resampled(filter.wavelength(), ResampleOrder::Linear)
            .unwrap();

        for (orig, round) in filter.throughput().iter().zip(back.throughput().iter()) {
            assert_relative_eq!(orig, round, epsilon = 0.01);
        }
    }

    #[test]
    fn test_resample_clamps_negative_cubic_overshoot() {
        // Sharp-edged curve makes a cubic spline undershoot below zero
        let filter = FilterResponse::from_table(
            "sharp",
            vec![4000.0, 4010.0, 4020.0, 4500.0, 4980.0, 4990.0, 5000.0],
            vec![0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0],
        )
        .unwrap();

        let grid: Vec<f64> = (0..=1000).map(|i| 3990.0 + 1.02 * i as f64).collect();
        let resampled = filter.resampled(&grid, ResampleOrder::Cubic).unwrap();

        assert!(resampled.throughput().iter().all(|&t| t >= 0.0));
    }

    #[test]
    fn test_resample_rejects_bad_grid() {
        let filter = test_boxcar();
        assert!(matches!(
            filter.resampled(&[4000.0, 3999.0], ResampleOrder::Linear),
            Err(FilterError::NotAscending)
        ));
    }
}
