//! Index-computation stage
//!
//! For every source raster under a root: resolve its sensor tag, extract
//! and repair the bands, compute all indices and write each one to
//! `<source dir>/<INDEX>/<base><INDEX>.tif` with the source's georeferencing.

use crate::error::{PipelineError, Result};
use crate::layout::{discover_rasters, OutputTree};
use crate::FailurePolicy;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vegidx_algorithms::imagery::{
    compute_all, extract_bands, sensor_tag, IndexParams, SensorRegistry,
};
use vegidx_core::io::{write_geotiff_with_profile, RasterDataset};

/// Settings for [`compute_indices`]
#[derive(Debug, Clone, Default)]
pub struct ComputeOptions {
    pub registry: SensorRegistry,
    pub params: IndexParams,
    /// Treat an unregistered sensor tag as an error instead of a skip
    pub strict: bool,
    pub on_failure: FailurePolicy,
}

/// Why a source raster produced no output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The tag has no entry in the sensor registry
    UnregisteredSensor(String),
    /// No tag could be derived from the file name
    NoSensorTag,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnregisteredSensor(tag) => {
                write!(f, "no band mapping for sensor tag '{}'", tag)
            }
            SkipReason::NoSensorTag => f.write_str("file name carries no sensor tag"),
        }
    }
}

/// Result of processing one source raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterOutcome {
    /// Index rasters written, in `SpectralIndex::ALL` order
    Written(Vec<PathBuf>),
    Skipped(SkipReason),
}

/// Summary of a compute run
#[derive(Debug, Clone, Default)]
pub struct ComputeReport {
    /// Sources that produced index rasters
    pub processed: Vec<PathBuf>,
    pub written: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    /// Only filled under [`FailurePolicy::Continue`]
    pub failed: Vec<(PathBuf, String)>,
}

/// Compute and write every index for one source raster.
///
/// Nothing is written unless all bands were read successfully.
pub fn process_raster(path: &Path, options: &ComputeOptions) -> Result<RasterOutcome> {
    let Some(tag) = sensor_tag(path).filter(|t| !t.is_empty()) else {
        return Ok(RasterOutcome::Skipped(SkipReason::NoSensorTag));
    };
    if options.registry.get(tag).is_none() {
        return Ok(RasterOutcome::Skipped(SkipReason::UnregisteredSensor(tag.to_string())));
    }
    let Some(outputs) = OutputTree::for_source(path) else {
        return Ok(RasterOutcome::Skipped(SkipReason::NoSensorTag));
    };

    info!("Processing {}", path.display());
    let dataset = RasterDataset::open(path)?;
    let Some(bands) = extract_bands(&dataset, tag, &options.registry)? else {
        return Ok(RasterOutcome::Skipped(SkipReason::UnregisteredSensor(tag.to_string())));
    };

    for repair in &bands.repairs {
        if repair.is_unrepairable() {
            warn!(
                "{}: {} band has no valid pixels, NaN left in place",
                path.display(),
                repair.role
            );
        } else if repair.replaced > 0 {
            debug!(
                "{}: filled {} NaN {} pixels with {}",
                path.display(),
                repair.replaced,
                repair.role,
                repair.fill
            );
        }
    }

    let indices = compute_all(&bands, &options.params)?;
    let profile = dataset.profile().single_band_f32();

    let mut written = Vec::with_capacity(indices.len());
    for (index, raster) in indices {
        let out = outputs.index_path(index);
        write_geotiff_with_profile(&out, raster.view(), &profile)?;
        info!("Raster file saved at: {}", out.display());
        written.push(out);
    }

    Ok(RasterOutcome::Written(written))
}

/// Run the compute stage over every raster below `root`
pub fn compute_indices(root: &Path, options: &ComputeOptions) -> Result<ComputeReport> {
    let sources = discover_rasters(root)?;
    debug!("Found {} raster(s) under {}", sources.len(), root.display());

    let mut report = ComputeReport::default();
    for path in sources {
        match process_raster(&path, options) {
            Ok(RasterOutcome::Written(outputs)) => {
                report.written.extend(outputs);
                report.processed.push(path);
            }
            Ok(RasterOutcome::Skipped(reason)) => {
                if options.strict {
                    let tag = match reason {
                        SkipReason::UnregisteredSensor(tag) => tag,
                        SkipReason::NoSensorTag => String::new(),
                    };
                    return Err(PipelineError::UnregisteredSensor { path, tag });
                }
                warn!("Skipping {}: {}", path.display(), reason);
                report.skipped.push((path, reason));
            }
            Err(e) => match options.on_failure {
                FailurePolicy::Abort => return Err(e.in_file(path)),
                FailurePolicy::Continue => {
                    warn!("Failed {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            },
        }
    }

    Ok(report)
}
