//! Sensor band mapping and band extraction
//!
//! A file's sensor tag is the part of its base name before the first
//! underscore (`landsat_8_spring.tif` → `landsat`). The tag selects a
//! [`BandMapping`] from the [`SensorRegistry`]; files whose tag is not
//! registered yield no bands and the caller decides what to do with them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use vegidx_core::io::RasterDataset;
use vegidx_core::raster::Raster;
use vegidx_core::{Error, Result};

/// Physical spectral channel used by the indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandRole {
    Blue,
    Green,
    Red,
    Nir,
}

impl fmt::Display for BandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BandRole::Blue => "blue",
            BandRole::Green => "green",
            BandRole::Red => "red",
            BandRole::Nir => "nir",
        };
        f.write_str(name)
    }
}

/// 1-indexed band numbers of each channel within a sensor's files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMapping {
    pub blue: usize,
    pub green: usize,
    pub red: usize,
    pub nir: usize,
}

impl BandMapping {
    /// Landsat 8/9 surface reflectance: B2 blue, B3 green, B4 red, B5 NIR
    pub const LANDSAT: BandMapping = BandMapping {
        blue: 2,
        green: 3,
        red: 4,
        nir: 5,
    };

    pub fn band(&self, role: BandRole) -> usize {
        match role {
            BandRole::Blue => self.blue,
            BandRole::Green => self.green,
            BandRole::Red => self.red,
            BandRole::Nir => self.nir,
        }
    }

    fn validate(&self, tag: &str) -> Result<()> {
        for role in [BandRole::Blue, BandRole::Green, BandRole::Red, BandRole::Nir] {
            if self.band(role) == 0 {
                return Err(Error::InvalidParameter {
                    name: "band",
                    value: format!("{}.{} = 0", tag, role),
                    reason: "band numbers are 1-indexed".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Mapping from sensor tag to band layout.
///
/// The default registry knows only `landsat`. Tags such as `sentinel` or
/// `LULC` must be registered explicitly before their files are processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorRegistry {
    sensors: BTreeMap<String, BandMapping>,
}

impl Default for SensorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .sensors
            .insert("landsat".to_string(), BandMapping::LANDSAT);
        registry
    }
}

impl SensorRegistry {
    /// A registry with no sensors
    pub fn empty() -> Self {
        Self {
            sensors: BTreeMap::new(),
        }
    }

    /// Register (or replace) the band layout for a tag
    pub fn register(&mut self, tag: impl Into<String>, mapping: BandMapping) -> Result<()> {
        let tag = tag.into();
        mapping.validate(&tag)?;
        self.sensors.insert(tag, mapping);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&BandMapping> {
        self.sensors.get(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }

    /// Parse `{"landsat": {"blue": 2, "green": 3, "red": 4, "nir": 5}, ...}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: SensorRegistry =
            serde_json::from_str(json).map_err(|e| Error::InvalidParameter {
                name: "sensors",
                value: json.chars().take(60).collect(),
                reason: e.to_string(),
            })?;
        for (tag, mapping) in &registry.sensors {
            mapping.validate(tag)?;
        }
        Ok(registry)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// File name up to its first dot: `landsat_8_x.tif` → `landsat_8_x`
pub fn base_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.split('.').next()
}

/// Sensor tag of a file: its base name up to the first underscore
pub fn sensor_tag(path: &Path) -> Option<&str> {
    base_name(path)?.split('_').next()
}

/// The four channels needed by the indices, as float32 rasters of equal shape
#[derive(Debug, Clone)]
pub struct SpectralBands {
    pub blue: Raster<f32>,
    pub green: Raster<f32>,
    pub red: Raster<f32>,
    pub nir: Raster<f32>,
    /// NaN repair applied to each band, in blue, green, red, nir order
    pub repairs: [NanRepair; 4],
}

/// Outcome of filling NaN cells of one band with the band's mean
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NanRepair {
    pub role: BandRole,
    /// Number of NaN cells overwritten
    pub replaced: usize,
    /// Value written into them; NaN when the band has no valid cell
    pub fill: f32,
}

impl NanRepair {
    /// Band was entirely NaN and therefore left unrepaired
    pub fn is_unrepairable(&self) -> bool {
        self.replaced > 0 && self.fill.is_nan()
    }
}

/// Replace every NaN cell with the mean of the band's non-NaN cells
pub fn repair_nan(raster: &mut Raster<f32>, role: BandRole) -> NanRepair {
    let (sum, count) = raster
        .data()
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(sum, count), &v| (sum + v as f64, count + 1));

    let fill = if count > 0 {
        (sum / count as f64) as f32
    } else {
        f32::NAN
    };

    let replaced = raster.len() - count;
    if replaced > 0 && count > 0 {
        raster.data_mut().mapv_inplace(|v| if v.is_nan() { fill } else { v });
    }

    NanRepair {
        role,
        replaced,
        fill,
    }
}

/// Read, cast and repair the bands of `dataset` according to its sensor tag.
///
/// Returns `Ok(None)` when `tag` is not registered. A registered tag whose
/// mapping refers past the file's last band fails with
/// [`Error::BandOutOfRange`].
pub fn extract_bands(
    dataset: &RasterDataset,
    tag: &str,
    registry: &SensorRegistry,
) -> Result<Option<SpectralBands>> {
    let Some(mapping) = registry.get(tag) else {
        return Ok(None);
    };

    let read = |role: BandRole| -> Result<(Raster<f32>, NanRepair)> {
        let mut band: Raster<f32> = dataset.band(mapping.band(role))?;
        let repair = repair_nan(&mut band, role);
        Ok((band, repair))
    };

    let (blue, blue_fix) = read(BandRole::Blue)?;
    let (green, green_fix) = read(BandRole::Green)?;
    let (red, red_fix) = read(BandRole::Red)?;
    let (nir, nir_fix) = read(BandRole::Nir)?;

    Ok(Some(SpectralBands {
        blue,
        green,
        red,
        nir,
        repairs: [blue_fix, green_fix, red_fix, nir_fix],
    }))
}
