//! File-level spatial metadata
//!
//! A `RasterProfile` is what travels from a source image to every raster
//! derived from it: dimensions, georeferencing, CRS keys and nodata. Derived
//! rasters override only the band count and the sample format.

use crate::crs::CRS;
use crate::raster::GeoTransform;
use serde::{Deserialize, Serialize};

/// GeoKey ids used when resolving or synthesizing a CRS
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Pixel storage type of a raster file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl SampleFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "uint8",
            SampleFormat::U16 => "uint16",
            SampleFormat::U32 => "uint32",
            SampleFormat::I8 => "int8",
            SampleFormat::I16 => "int16",
            SampleFormat::I32 => "int32",
            SampleFormat::F32 => "float32",
            SampleFormat::F64 => "float64",
        }
    }
}

/// Raw GeoTIFF key directory with its parameter tables.
///
/// Kept verbatim so that derived rasters carry exactly the CRS definition
/// of their source, including keys this crate does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoKeys {
    /// GeoKeyDirectoryTag (34735) as SHORT values
    pub directory: Vec<u16>,
    /// GeoDoubleParamsTag (34736)
    pub double_params: Vec<f64>,
    /// GeoAsciiParamsTag (34737)
    pub ascii_params: Option<String>,
}

impl GeoKeys {
    /// Minimal key directory naming an EPSG code
    pub fn from_crs(crs: &CRS) -> Option<Self> {
        let code = u16::try_from(crs.epsg()?).ok()?;
        let (model_type, cs_key) = if crs.is_geographic() {
            (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
        } else {
            (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
        };

        // Version 1.1.0, 3 keys, then (key, location, count, value) entries sorted by key
        #[rustfmt::skip]
        let directory = vec![
            1, 1, 0, 3,
            GT_MODEL_TYPE, 0, 1, model_type,
            GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
            cs_key, 0, 1, code,
        ];

        Some(Self {
            directory,
            double_params: Vec::new(),
            ascii_params: None,
        })
    }

    /// Resolve the CRS: projected code first, then geographic, then citation
    pub fn crs(&self) -> Option<CRS> {
        let mut geographic = None;
        for (key, value) in self.inline_values() {
            match key {
                PROJECTED_CS_TYPE if value > 0 && value != 32767 => {
                    return Some(CRS::from_epsg(u32::from(value)));
                }
                GEOGRAPHIC_TYPE if value > 0 && value != 32767 => {
                    geographic = Some(CRS::from_epsg(u32::from(value)));
                }
                _ => {}
            }
        }

        geographic.or_else(|| {
            self.ascii_params
                .as_deref()
                .map(|s| s.trim_end_matches(['|', '\0']).trim())
                .filter(|s| !s.is_empty())
                .map(CRS::from_citation)
        })
    }

    /// (key, value) pairs whose value is stored inline in the directory
    fn inline_values(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        let num_keys = self.directory.get(3).copied().unwrap_or(0) as usize;
        self.directory
            .get(4..)
            .unwrap_or(&[])
            .chunks_exact(4)
            .take(num_keys)
            .filter(|entry| entry[1] == 0)
            .map(|entry| (entry[0], entry[3]))
    }
}

/// Spatial metadata of a raster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    pub rows: usize,
    pub cols: usize,
    pub band_count: usize,
    pub sample_format: SampleFormat,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    pub geokeys: Option<GeoKeys>,
    pub nodata: Option<f64>,
}

impl RasterProfile {
    /// Profile for a fresh raster with default georeferencing
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            band_count: 1,
            sample_format: SampleFormat::F32,
            transform: GeoTransform::default(),
            crs: None,
            geokeys: None,
            nodata: None,
        }
    }

    /// The profile of a single-band float32 raster derived from this one
    pub fn single_band_f32(&self) -> Self {
        Self {
            band_count: 1,
            sample_format: SampleFormat::F32,
            ..self.clone()
        }
    }

    /// Number of pixels per band
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Keys to write: the source's own directory, else one synthesized from the CRS
    pub fn geokeys_for_write(&self) -> Option<GeoKeys> {
        self.geokeys
            .clone()
            .or_else(|| self.crs.as_ref().and_then(GeoKeys::from_crs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokeys_from_projected_crs() {
        let keys = GeoKeys::from_crs(&CRS::from_epsg(32633)).unwrap();
        assert_eq!(keys.crs(), Some(CRS::from_epsg(32633)));
        assert_eq!(keys.directory[7], MODEL_TYPE_PROJECTED);
    }

    #[test]
    fn test_geokeys_from_geographic_crs() {
        let keys = GeoKeys::from_crs(&CRS::wgs84()).unwrap();
        assert_eq!(keys.crs(), Some(CRS::wgs84()));
        assert_eq!(keys.directory[7], MODEL_TYPE_GEOGRAPHIC);
    }

    #[test]
    fn test_geokeys_citation_fallback() {
        let keys = GeoKeys {
            directory: vec![1, 1, 0, 1, GT_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED],
            double_params: Vec::new(),
            ascii_params: Some("Custom TM|".to_string()),
        };
        assert_eq!(keys.crs(), Some(CRS::from_citation("Custom TM")));
    }

    #[test]
    fn test_single_band_profile_keeps_georeferencing() {
        let mut profile = RasterProfile::new(4, 6);
        profile.band_count = 7;
        profile.sample_format = SampleFormat::U16;
        profile.crs = Some(CRS::wgs84());
        profile.nodata = Some(0.0);

        let derived = profile.single_band_f32();
        assert_eq!(derived.band_count, 1);
        assert_eq!(derived.sample_format, SampleFormat::F32);
        assert_eq!(derived.crs, profile.crs);
        assert_eq!(derived.nodata, Some(0.0));
        assert_eq!((derived.rows, derived.cols), (4, 6));
    }
}
