//! Imagery algorithms
//!
//! - Band extraction: per-sensor band mapping with NaN repair
//! - Spectral indices: NDVI, EVI, NDWI, SAVI

mod bands;
mod indices;

pub use bands::{
    base_name, extract_bands, repair_nan, sensor_tag, BandMapping, BandRole, NanRepair,
    SensorRegistry, SpectralBands,
};
pub use indices::{
    compute_all, compute_index, evi, ndvi, ndwi, savi, EviParams, IndexParams, SaviParams,
    SpectralIndex,
};
