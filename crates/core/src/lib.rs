//! # vegidx core
//!
//! Core types and I/O shared by the index-computation and sampling stages.
//!
//! This crate provides:
//! - `Raster<T>`: single-band georeferenced grid
//! - `GeoTransform`: affine pixel-to-world mapping
//! - `CRS`: coordinate reference system identification
//! - `RasterProfile`: spatial metadata carried from a source file to its outputs
//! - Native GeoTIFF reading (multi-band) and writing (single-band float32)

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoKeys, GeoTransform, Raster, RasterElement, RasterProfile, RasterStatistics};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::io::{read_geotiff, write_geotiff, RasterDataset};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, RasterProfile};
}
