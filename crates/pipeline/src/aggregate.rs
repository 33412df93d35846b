//! Seasonal sampling stage
//!
//! Walks `<root>/<INDEX>/<season>/*.tif`, draws a fixed-size sample from
//! every index raster and writes `<INDEX>/<INDEX>_sampled.csv` with one
//! column per season and sensor generation.

use crate::error::{PipelineError, Result};
use crate::layout::{IndexTree, SensorGeneration};
use crate::table::SampleTable;
use crate::FailurePolicy;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vegidx_algorithms::imagery::SpectralIndex;
use vegidx_algorithms::statistics::{sample_pixels, SampleParams};
use vegidx_core::io::read_geotiff;

/// Settings for [`aggregate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    pub params: SampleParams,
    /// Fail on unclassifiable files and non-index directories instead of skipping them
    pub strict: bool,
    pub on_failure: FailurePolicy,
}

/// Summary of a sampling run
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    /// CSV tables written, one per index directory
    pub tables: Vec<(SpectralIndex, PathBuf)>,
    /// Root subdirectories not named after an index
    pub unknown_dirs: Vec<PathBuf>,
    /// Rasters matching neither `landsat_8` nor `landsat_9`
    pub unclassified: Vec<PathBuf>,
    /// Only filled under [`FailurePolicy::Continue`]
    pub failed: Vec<(PathBuf, String)>,
}

impl AggregateReport {
    fn merge(&mut self, other: AggregateReport) {
        self.tables.extend(other.tables);
        self.unknown_dirs.extend(other.unknown_dirs);
        self.unclassified.extend(other.unclassified);
        self.failed.extend(other.failed);
    }
}

/// Sample band 1 of a single index raster
pub fn sample_file<R: Rng + ?Sized>(
    path: &Path,
    params: &SampleParams,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let raster = read_geotiff::<f32, _>(path, Some(1))?;
    Ok(sample_pixels(&raster, params, rng)?)
}

/// Sample one index directory and write its CSV table
pub fn aggregate_index_dir<R: Rng + ?Sized>(
    dir: &Path,
    options: &AggregateOptions,
    rng: &mut R,
) -> Result<AggregateReport> {
    let tree = IndexTree::scan(dir)?;
    let mut report = AggregateReport::default();
    let table = build_table(&tree, options, rng, &mut report)?;

    let out = tree.table_path();
    table.write_csv(&out)?;
    info!(
        "{}: {} column(s), {} row(s) written to {}",
        tree.index,
        table.columns().len(),
        table.row_count(),
        out.display()
    );
    report.tables.push((tree.index, out));
    Ok(report)
}

/// Run the sampling stage over every index directory directly under `root`
pub fn aggregate<R: Rng + ?Sized>(
    root: &Path,
    options: &AggregateOptions,
    rng: &mut R,
) -> Result<AggregateReport> {
    let (trees, unknown) = IndexTree::discover(root)?;

    let mut report = AggregateReport::default();
    for path in unknown {
        if options.strict {
            return Err(PipelineError::UnknownIndexDir { path });
        }
        warn!("Skipping {}: not an index directory", path.display());
        report.unknown_dirs.push(path);
    }

    for tree in trees {
        report.merge(aggregate_index_dir(&tree.dir, options, rng)?);
    }
    Ok(report)
}

fn build_table<R: Rng + ?Sized>(
    tree: &IndexTree,
    options: &AggregateOptions,
    rng: &mut R,
    report: &mut AggregateReport,
) -> Result<SampleTable> {
    let mut table = SampleTable::new();

    for season in &tree.seasons {
        if let Some(path) = season.unclassified.first() {
            if options.strict {
                return Err(PipelineError::UnclassifiedFile { path: path.clone() });
            }
        }
        for path in &season.unclassified {
            warn!("Skipping {}: neither landsat_8 nor landsat_9", path.display());
            report.unclassified.push(path.clone());
        }

        for generation in SensorGeneration::ALL {
            let mut column = Vec::new();
            for path in season.files_for(generation) {
                match sample_file(path, &options.params, rng) {
                    Ok(values) => {
                        debug!("Sampled {} value(s) from {}", values.len(), path.display());
                        column.extend(values);
                    }
                    Err(e) => match options.on_failure {
                        FailurePolicy::Abort => return Err(e.in_file(path.clone())),
                        FailurePolicy::Continue => {
                            warn!("Failed {}: {}", path.display(), e);
                            report.failed.push((path.clone(), e.to_string()));
                        }
                    },
                }
            }
            table.push_column(season.column_name(generation), column);
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vegidx_core::io::write_geotiff_with_profile;
    use vegidx_core::RasterProfile;

    fn write_index(path: &Path, rows: usize, cols: usize) {
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32 / 1000.0);
        write_geotiff_with_profile(path, data.view(), &RasterProfile::new(rows, cols)).unwrap();
    }

    #[test]
    fn test_sample_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_landsat_8NDVI.tif");
        write_index(&path, 30, 30);

        let mut rng = StdRng::seed_from_u64(3);
        let values = sample_file(&path, &SampleParams::default(), &mut rng).unwrap();
        assert_eq!(values.len(), 500);
        assert!(values.contains(&0.899f32.into()));
    }

    #[test]
    fn test_columns_per_season_and_generation() {
        let dir = tempfile::tempdir().unwrap();
        let ndvi = dir.path().join("NDVI");
        write_index(&ndvi.join("summer/a_landsat_9NDVI.tif"), 25, 25);
        write_index(&ndvi.join("spring/a_landsat_8NDVI.tif"), 25, 25);
        write_index(&ndvi.join("spring/b_landsat_8NDVI.tif"), 25, 25);

        let mut rng = StdRng::seed_from_u64(11);
        let mut report = AggregateReport::default();
        let tree = IndexTree::scan(&ndvi).unwrap();
        let options = AggregateOptions::default();
        let table = build_table(&tree, &options, &mut rng, &mut report).unwrap();

        let names: Vec<_> = table.column_names().collect();
        assert_eq!(
            names,
            vec!["spring_landsat_8", "spring_landsat_9", "summer_landsat_8", "summer_landsat_9"]
        );
        assert_eq!(table.column("spring_landsat_8").unwrap().len(), 1000);
        assert!(table.column("spring_landsat_9").unwrap().is_empty());
        assert_eq!(table.column("summer_landsat_9").unwrap().len(), 500);
    }

    #[test]
    fn test_unclassified_and_strict() {
        let dir = tempfile::tempdir().unwrap();
        let evi = dir.path().join("EVI");
        write_index(&evi.join("fall/a_landsat_8EVI.tif"), 25, 25);
        write_index(&evi.join("fall/sentinelEVI.tif"), 25, 25);

        let mut rng = StdRng::seed_from_u64(5);
        let report = aggregate(dir.path(), &AggregateOptions::default(), &mut rng).unwrap();
        assert_eq!(report.unclassified, vec![evi.join("fall/sentinelEVI.tif")]);
        assert_eq!(report.tables, vec![(SpectralIndex::EVI, evi.join("EVI_sampled.csv"))]);

        let strict = AggregateOptions {
            strict: true,
            ..AggregateOptions::default()
        };
        let result = aggregate(dir.path(), &strict, &mut rng);
        assert!(matches!(result, Err(PipelineError::UnclassifiedFile { .. })));
    }

    #[test]
    fn test_small_raster_policy() {
        let dir = tempfile::tempdir().unwrap();
        let savi = dir.path().join("SAVI");
        write_index(&savi.join("winter/a_landsat_8SAVI.tif"), 10, 10);
        write_index(&savi.join("winter/b_landsat_8SAVI.tif"), 25, 25);
        std::fs::create_dir_all(dir.path().join("scenes")).unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let aborted = aggregate(dir.path(), &AggregateOptions::default(), &mut rng);
        assert!(matches!(aborted, Err(PipelineError::File { .. })));

        let options = AggregateOptions {
            on_failure: FailurePolicy::Continue,
            ..AggregateOptions::default()
        };
        let report = aggregate(dir.path(), &options, &mut rng).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.unknown_dirs, vec![dir.path().join("scenes")]);
        assert_eq!(report.tables.len(), 1);
    }
}
