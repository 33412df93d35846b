//! vegidx CLI - vegetation index rasters and seasonal samples

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vegidx_algorithms::imagery::SensorRegistry;
use vegidx_algorithms::statistics::{SampleParams, DEFAULT_SAMPLE_SIZE};
use vegidx_core::io::RasterDataset;
use vegidx_pipeline::{aggregate, compute_indices, AggregateOptions, ComputeOptions, FailurePolicy};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vegidx")]
#[command(
    author,
    version,
    about = "Vegetation index rasters and seasonal samples",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute NDVI, EVI, NDWI and SAVI for every raster under a directory
    Compute {
        /// Root directory of the source images
        root: PathBuf,
        /// JSON file mapping sensor tags to band numbers (replaces the built-in landsat entry)
        #[arg(short, long)]
        sensors: Option<PathBuf>,
        /// Fail on files whose sensor tag has no band mapping
        #[arg(long)]
        strict: bool,
        /// Keep going after a file fails instead of stopping
        #[arg(short, long)]
        keep_going: bool,
    },
    /// Sample index rasters and write one CSV table per index
    Sample {
        /// Root directory holding the index subdirectories
        root: PathBuf,
        /// Pixels drawn per raster
        #[arg(short = 'n', long, default_value_t = DEFAULT_SAMPLE_SIZE)]
        sample_size: usize,
        /// Seed for reproducible samples
        #[arg(long)]
        seed: Option<u64>,
        /// Fail on unclassifiable files and non-index directories
        #[arg(long)]
        strict: bool,
        /// Keep going after a file fails instead of stopping
        #[arg(short, long)]
        keep_going: bool,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn failure_policy(keep_going: bool) -> FailurePolicy {
    if keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    }
}

fn load_registry(path: Option<&Path>) -> Result<SensorRegistry> {
    match path {
        Some(path) => SensorRegistry::from_json_file(path)
            .with_context(|| format!("Failed to load sensor table {}", path.display())),
        None => Ok(SensorRegistry::default()),
    }
}

fn report_failures(failed: &[(PathBuf, String)]) {
    for (path, reason) in failed {
        warn!("  {}: {}", path.display(), reason);
    }
}

fn print_info(input: &Path) -> Result<()> {
    let dataset = RasterDataset::open(input).context("Failed to read raster")?;
    let profile = dataset.profile();

    println!("File: {}", input.display());
    println!(
        "Dimensions: {} x {} ({} cells)",
        profile.cols,
        profile.rows,
        profile.pixel_count()
    );
    println!("Bands: {} ({})", dataset.band_count(), profile.sample_format.name());
    let t = &profile.transform;
    println!("Origin: ({:.6}, {:.6})", t.origin_x, t.origin_y);
    println!("Pixel size: {} x {}", t.pixel_width, t.pixel_height);
    let (min_x, min_y, max_x, max_y) = t.bounds(profile.cols, profile.rows);
    println!("Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})", min_x, min_y, max_x, max_y);
    if let Some(crs) = &profile.crs {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = profile.nodata {
        println!("NoData: {}", nodata);
    }

    for band in 1..=dataset.band_count() {
        let raster = dataset.band::<f64>(band)?;
        let stats = raster.statistics();
        println!("\nBand {}:", band);
        if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
            println!("  Min: {:.4}", min);
            println!("  Max: {:.4}", max);
            println!("  Mean: {:.4}", mean);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Compute {
            root,
            sensors,
            strict,
            keep_going,
        } => {
            let options = ComputeOptions {
                registry: load_registry(sensors.as_deref())?,
                strict,
                on_failure: failure_policy(keep_going),
                ..ComputeOptions::default()
            };
            let tags: Vec<&str> = options.registry.tags().collect();
            info!("Sensor tags: {}", tags.join(", "));

            let start = Instant::now();
            let pb = spinner("Computing indices...")?;
            let result = compute_indices(&root, &options);
            pb.finish_and_clear();
            let report = result.context("Index computation failed")?;

            println!(
                "{} raster(s) processed, {} written, {} skipped, {} failed",
                report.processed.len(),
                report.written.len(),
                report.skipped.len(),
                report.failed.len()
            );
            report_failures(&report.failed);
            println!("  Processing time: {:.2?}", start.elapsed());
        }

        Commands::Sample {
            root,
            sample_size,
            seed,
            strict,
            keep_going,
        } => {
            let options = AggregateOptions {
                params: SampleParams { sample_size },
                strict,
                on_failure: failure_policy(keep_going),
            };
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let start = Instant::now();
            let pb = spinner("Sampling index rasters...")?;
            let result = aggregate(&root, &options, &mut rng);
            pb.finish_and_clear();
            let report = result.context("Sampling failed")?;

            for (index, path) in &report.tables {
                println!("{} table saved to: {}", index, path.display());
            }
            if !report.unclassified.is_empty() {
                println!("{} unclassified raster(s) ignored", report.unclassified.len());
            }
            if !report.unknown_dirs.is_empty() {
                println!("{} non-index folder(s) ignored", report.unknown_dirs.len());
            }
            report_failures(&report.failed);
            println!("  Processing time: {:.2?}", start.elapsed());
        }

        Commands::Info { input } => print_info(&input)?,
    }

    Ok(())
}
