//! Directory conventions shared by both stages
//!
//! Compute stage: a source `dir/landsat_8_x.tif` produces
//! `dir/<INDEX>/landsat_8_x<INDEX>.tif` for every index.
//!
//! Statistics stage: a root holds `<INDEX>/<season>/*.tif`, and each index
//! directory receives `<INDEX>_sampled.csv`.

use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use vegidx_algorithms::imagery::{base_name, SpectralIndex};

const RASTER_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

/// Whether `path` has a GeoTIFF extension (case-insensitive)
pub fn is_raster_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| RASTER_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Whether `path` is named exactly like an index output directory
pub fn is_index_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| SpectralIndex::ALL.iter().any(|index| index.name() == name))
}

/// Sorted entries of a directory, split into (subdirectories, files)
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))? {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| PipelineError::io(entry.path(), e))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

/// Every raster file under `root`, recursively, in sorted order.
///
/// Index output directories are not entered, so a second run over the same
/// tree sees only the original sources.
pub fn discover_rasters(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let (dirs, files) = list_dir(&dir)?;
        found.extend(files.into_iter().filter(|f| is_raster_file(f)));
        // reversed so that popping visits subdirectories in sorted order
        pending.extend(dirs.into_iter().filter(|d| !is_index_dir(d)).rev());
    }

    Ok(found)
}

/// Output locations of the index rasters derived from one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTree {
    source_dir: PathBuf,
    base: String,
}

impl OutputTree {
    /// `None` when the path has no usable file name
    pub fn for_source(path: &Path) -> Option<Self> {
        let base = base_name(path)?.to_string();
        let source_dir = path.parent()?.to_path_buf();
        Some(Self { source_dir, base })
    }

    pub fn index_dir(&self, index: SpectralIndex) -> PathBuf {
        self.source_dir.join(index.name())
    }

    pub fn index_path(&self, index: SpectralIndex) -> PathBuf {
        self.index_dir(index)
            .join(format!("{}{}.tif", self.base, index.name()))
    }
}

/// Sensor generation bucket of the statistics stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorGeneration {
    Landsat8,
    Landsat9,
}

impl SensorGeneration {
    pub const ALL: [SensorGeneration; 2] = [SensorGeneration::Landsat8, SensorGeneration::Landsat9];

    pub fn id(&self) -> &'static str {
        match self {
            SensorGeneration::Landsat8 => "landsat_8",
            SensorGeneration::Landsat9 => "landsat_9",
        }
    }

    /// Case-insensitive substring match on the file name; `landsat_8` wins ties
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        SensorGeneration::ALL
            .into_iter()
            .find(|generation| name.contains(generation.id()))
    }
}

impl fmt::Display for SensorGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Raster files of one season directory, bucketed by sensor generation
#[derive(Debug, Clone, Default)]
pub struct SeasonFiles {
    pub season: String,
    pub files: BTreeMap<SensorGeneration, Vec<PathBuf>>,
    /// Rasters matching neither generation
    pub unclassified: Vec<PathBuf>,
}

impl SeasonFiles {
    pub fn files_for(&self, generation: SensorGeneration) -> &[PathBuf] {
        self.files.get(&generation).map_or(&[], Vec::as_slice)
    }

    /// Column key: `{season}_{generation}`
    pub fn column_name(&self, generation: SensorGeneration) -> String {
        format!("{}_{}", self.season, generation.id())
    }
}

/// One index directory of the statistics stage
#[derive(Debug, Clone)]
pub struct IndexTree {
    pub index: SpectralIndex,
    pub dir: PathBuf,
    /// Seasons sorted by name
    pub seasons: Vec<SeasonFiles>,
}

impl IndexTree {
    /// Scan an index directory. Its name must parse as a [`SpectralIndex`].
    pub fn scan(dir: &Path) -> Result<Self> {
        let index = dir
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<SpectralIndex>().ok())
            .ok_or_else(|| PipelineError::UnknownIndexDir {
                path: dir.to_path_buf(),
            })?;

        let (season_dirs, _) = list_dir(dir)?;
        let seasons = season_dirs
            .iter()
            .map(|season_dir| scan_season(season_dir))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            index,
            dir: dir.to_path_buf(),
            seasons,
        })
    }

    /// Index trees directly under `root`, plus subdirectories that are not index trees
    pub fn discover(root: &Path) -> Result<(Vec<IndexTree>, Vec<PathBuf>)> {
        let (dirs, _) = list_dir(root)?;
        let mut trees = Vec::new();
        let mut unknown = Vec::new();
        for dir in dirs {
            match IndexTree::scan(&dir) {
                Ok(tree) => trees.push(tree),
                Err(PipelineError::UnknownIndexDir { path }) => unknown.push(path),
                Err(e) => return Err(e),
            }
        }
        Ok((trees, unknown))
    }

    /// `<dir>/<dir name>_sampled.csv`
    pub fn table_path(&self) -> PathBuf {
        let name = self
            .dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.index.name());
        self.dir.join(format!("{}_sampled.csv", name))
    }
}

fn scan_season(dir: &Path) -> Result<SeasonFiles> {
    let season = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (_, files) = list_dir(dir)?;

    let mut buckets = SeasonFiles {
        season,
        ..SeasonFiles::default()
    };
    for file in files.into_iter().filter(|f| is_raster_file(f)) {
        match SensorGeneration::classify(&file) {
            Some(generation) => buckets.files.entry(generation).or_default().push(file),
            None => buckets.unclassified.push(file),
        }
    }
    Ok(buckets)
}
