//! Coverage time-series generator.
//!
//! Advances a simulated star through a regular time grid and writes the
//! visible-disk fraction of each surface class at every step as CSV, ready to
//! feed a spectral-synthesis pipeline.
//!
//! Usage:
//! ```
//! cargo run --release --bin photosphere_series -- --end 30 --step 0.1 -o coverage.csv
//! cargo run --release --bin photosphere_series -- -c star.json --spin-up 100 --snapshot state.json
//! cargo run --release --bin photosphere_series -- --write-default-config star.json
//! ```

use clap::Parser;
use log::info;
use photosphere::{Star, StarConfig, SurfaceClass, SurfaceSnapshot};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photosphere_series")]
#[command(about = "Per-class visible-disk coverage time series for a spotted star")]
#[command(version)]
struct Args {
    /// Star configuration JSON (default: built-in M dwarf)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Resume from a surface snapshot instead of starting at the epoch
    #[arg(long, value_name = "FILE")]
    resume: Option<PathBuf>,

    /// First sample time in days (default: the current surface time)
    #[arg(long)]
    start: Option<f64>,

    /// Last sample time in days
    #[arg(long, default_value_t = 30.0)]
    end: f64,

    /// Sampling interval in days
    #[arg(long, default_value_t = 0.1)]
    step: f64,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the configured spin-up duration in days
    #[arg(long, value_name = "DAYS")]
    spin_up: Option<f64>,

    /// Output CSV file
    #[arg(short, long, default_value = "coverage.csv")]
    output: PathBuf,

    /// Write the final surface state to this file
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Write the effective configuration to this file and exit
    #[arg(long, value_name = "FILE")]
    write_default_config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => StarConfig::load_from_file(path)?,
        None => StarConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(spin_up) = args.spin_up {
        config.spin_up_days = spin_up;
    }
    config.validate()?;

    if let Some(path) = &args.write_default_config {
        config.save_to_file(path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    if !(args.step > 0.0) {
        return Err(format!("step must be positive, got {}", args.step).into());
    }

    let mut star = match &args.resume {
        Some(path) => Star::restore(config.clone(), SurfaceSnapshot::load_from_file(path)?)?,
        None => Star::new(config.clone())?,
    };

    let start = args.start.unwrap_or(star.current_time());
    if args.end < start {
        return Err(format!("end {} precedes start {start}", args.end).into());
    }
    let samples = ((args.end - start) / args.step).floor() as usize + 1;
    let times: Vec<f64> = (0..samples)
        .map(|i| start + i as f64 * args.step)
        .collect();

    println!("Photosphere Coverage Series");
    println!("===========================");
    println!("Radius: {} R☉, Teff: {} K", config.radius_solar, config.teff_k);
    println!(
        "Rotation: {} days, inclination: {}°",
        config.rotation_period_days, config.inclination_deg
    );
    println!("Emitters: {}", config.emitters.len());
    println!("Samples: {samples} from {start} to {} days", times[samples - 1]);
    println!();

    let classes = [
        SurfaceClass::Photosphere,
        SurfaceClass::Spot,
        SurfaceClass::Facula,
        SurfaceClass::Umbra,
        SurfaceClass::Penumbra,
    ];
    let mut writer = BufWriter::new(File::create(&args.output)?);
    write!(writer, "time_days")?;
    for class in classes {
        write!(writer, ",{class}")?;
    }
    writeln!(writer, ",live_features")?;

    let mut peak_spot: f64 = 0.0;
    for &t in &times {
        let coverage = star.coverage_at(t)?;
        write!(writer, "{t:.6}")?;
        for class in classes {
            write!(writer, ",{:.9}", coverage.fraction(class))?;
        }
        writeln!(writer, ",{}", star.surface().len())?;
        peak_spot = peak_spot.max(coverage.fraction(SurfaceClass::Spot));
    }
    writer.flush()?;

    info!("Wrote {samples} rows to {}", args.output.display());
    println!("Peak spot coverage: {:.4}%", peak_spot * 100.0);
    println!("Live features at end: {}", star.surface().len());
    println!("Output: {}", args.output.display());

    if let Some(path) = &args.snapshot {
        star.snapshot().save_to_file(path)?;
        println!("Snapshot: {}", path.display());
    }

    Ok(())
}
