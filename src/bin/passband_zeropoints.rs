//! Zero-point calculator for filter transmission curves
//!
//! Loads every filter file in a directory and prints its effective
//! wavelength, band edges, and AB (and optionally Vega) zero-points. Useful
//! for sanity-checking a new filter set before running a mangling batch.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use passband::{FilterResponse, PhotometricIntegrator, ReferenceData};

#[derive(Parser, Debug)]
#[command(
    name = "passband_zeropoints",
    about = "Calculates AB/Vega zero-points for a directory of filter curves",
    long_about = None
)]
struct Args {
    /// Directory containing two-column filter transmission files
    filter_dir: PathBuf,

    /// Vega (alpha Lyrae) spectrum file; without it only AB zero-points are
    /// printed
    #[arg(long)]
    vega: Option<PathBuf>,

    /// File extension of filter files
    #[arg(long, default_value = "dat")]
    extension: String,

    /// Edge percentage for the reported band edges
    #[arg(long, default_value_t = 3.0)]
    edge_pc: f64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let refs = match &args.vega {
        Some(path) => ReferenceData::from_vega_file(path)?,
        None => {
            // A placeholder Vega keeps the context constructible; Vega
            // zero-points are simply not printed
            ReferenceData::new(passband::reference::flat_fnu_spectrum(
                1e-20, 2000.0, 11000.0, 1000,
            ))
        }
    };
    let integrator = PhotometricIntegrator::new(&refs);
    let with_vega = args.vega.is_some();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&args.filter_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_string_lossy() == args.extension)
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    if entries.is_empty() {
        return Err(format!(
            "no .{} filter files found in {}",
            args.extension,
            args.filter_dir.display()
        )
        .into());
    }

    if with_vega {
        println!(
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "filter", "eff (Å)", "lower (Å)", "upper (Å)", "zp(AB)", "zp(Vega)"
        );
    } else {
        println!(
            "{:<12} {:>10} {:>10} {:>10} {:>10}",
            "filter", "eff (Å)", "lower (Å)", "upper (Å)", "zp(AB)"
        );
    }

    for path in entries {
        let filter = FilterResponse::load(&path)?;
        let eff = filter.effective_wavelength()?;
        let (lower, upper) = filter.edges(args.edge_pc)?;
        let ab = integrator.ab_zeropoint(&filter)?;

        if with_vega {
            let vega = integrator.vega_zeropoint(&filter)?;
            println!(
                "{:<12} {:>10.1} {:>10.1} {:>10.1} {:>10.4} {:>10.4}",
                filter.name(),
                eff,
                lower,
                upper,
                ab,
                vega
            );
        } else {
            println!(
                "{:<12} {:>10.1} {:>10.1} {:>10.1} {:>10.4}",
                filter.name(),
                eff,
                lower,
                upper,
                ab
            );
        }
    }

    Ok(())
}
