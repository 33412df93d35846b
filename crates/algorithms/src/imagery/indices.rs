//! Spectral vegetation and water indices
//!
//! Closed-form band algebra over float32 bands. Denominators are not
//! guarded: a zero or near-zero denominator yields an IEEE infinity or NaN
//! in that cell, and it is written out unchanged.

use crate::imagery::SpectralBands;
use crate::maybe_rayon::*;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vegidx_core::raster::Raster;
use vegidx_core::{Error, Result};

/// Indices produced for every extracted image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    NDVI,
    /// Enhanced Vegetation Index
    EVI,
    /// Normalized Difference Water Index (McFeeters)
    NDWI,
    /// Soil Adjusted Vegetation Index
    SAVI,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 4] = [
        SpectralIndex::NDVI,
        SpectralIndex::EVI,
        SpectralIndex::NDWI,
        SpectralIndex::SAVI,
    ];

    /// Name used for output directories and file suffixes
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::NDVI => "NDVI",
            SpectralIndex::EVI => "EVI",
            SpectralIndex::NDWI => "NDWI",
            SpectralIndex::SAVI => "SAVI",
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SpectralIndex::ALL
            .into_iter()
            .find(|index| index.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "expected one of NDVI, EVI, NDWI, SAVI".to_string(),
            })
    }
}

/// Parameters for SAVI
#[derive(Debug, Clone, Copy)]
pub struct SaviParams {
    /// Soil brightness correction factor. Default: 0.5
    pub l_factor: f32,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l_factor: 0.5 }
    }
}

/// Parameters for EVI
#[derive(Debug, Clone, Copy)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f32,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f32,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f32,
    /// Canopy background adjustment (default: 1.0)
    pub l: f32,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Parameters for the full index set
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexParams {
    pub savi: SaviParams,
    pub evi: EviParams,
}

/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f32>, red: &Raster<f32>) -> Result<Raster<f32>> {
    band_algebra([nir, red], |[n, r]| (n - r) / (n + r))
}

/// `EVI = G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
pub fn evi(
    nir: &Raster<f32>,
    red: &Raster<f32>,
    blue: &Raster<f32>,
    params: EviParams,
) -> Result<Raster<f32>> {
    band_algebra([nir, red, blue], |[n, r, b]| {
        params.g * ((n - r) / (n + params.c1 * r - params.c2 * b + params.l))
    })
}

/// `NDWI = (Green - NIR) / (Green + NIR)`
pub fn ndwi(green: &Raster<f32>, nir: &Raster<f32>) -> Result<Raster<f32>> {
    band_algebra([green, nir], |[g, n]| (g - n) / (g + n))
}

/// `SAVI = (NIR - Red) * (1 + L) / (NIR + Red + L)`
pub fn savi(nir: &Raster<f32>, red: &Raster<f32>, params: SaviParams) -> Result<Raster<f32>> {
    let l = params.l_factor;
    band_algebra([nir, red], |[n, r]| ((n - r) * (1.0 + l)) / (n + r + l))
}

/// Compute one index from extracted bands
pub fn compute_index(
    index: SpectralIndex,
    bands: &SpectralBands,
    params: &IndexParams,
) -> Result<Raster<f32>> {
    match index {
        SpectralIndex::NDVI => ndvi(&bands.nir, &bands.red),
        SpectralIndex::EVI => evi(&bands.nir, &bands.red, &bands.blue, params.evi),
        SpectralIndex::NDWI => ndwi(&bands.green, &bands.nir),
        SpectralIndex::SAVI => savi(&bands.nir, &bands.red, params.savi),
    }
}

/// Compute every index in [`SpectralIndex::ALL`] order
pub fn compute_all(
    bands: &SpectralBands,
    params: &IndexParams,
) -> Result<Vec<(SpectralIndex, Raster<f32>)>> {
    SpectralIndex::ALL
        .into_iter()
        .map(|index| Ok((index, compute_index(index, bands, params)?)))
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Apply `f` cell-wise over equally shaped bands; output keeps the first band's metadata
fn band_algebra<const N: usize, F>(bands: [&Raster<f32>; N], f: F) -> Result<Raster<f32>>
where
    F: Fn([f32; N]) -> f32 + Sync + Send,
{
    let template = bands[0];
    for band in &bands[1..] {
        check_dimensions(template, band)?;
    }

    let (rows, cols) = template.shape();
    let views: [ArrayView2<'_, f32>; N] = bands.map(|b| b.view());

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| f(std::array::from_fn(|i| views[i][[row, col]])))
                .collect::<Vec<f32>>()
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut output = template.with_same_meta(array)?;
    output.set_nodata(template.nodata());
    Ok(output)
}

fn check_dimensions(a: &Raster<f32>, b: &Raster<f32>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
