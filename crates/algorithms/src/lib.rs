//! # vegidx algorithms
//!
//! Pixel-level algorithms of the index pipeline.
//!
//! - **imagery**: sensor band mapping, NaN repair, NDVI / EVI / NDWI / SAVI
//! - **statistics**: representative random sampling of a raster

pub mod imagery;
pub mod statistics;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        compute_all, compute_index, evi, extract_bands, ndvi, ndwi, savi, BandMapping,
        EviParams, IndexParams, SaviParams, SensorRegistry, SpectralBands, SpectralIndex,
    };
    pub use crate::statistics::{sample_pixels, summarize, PixelSummary, SampleParams};
    pub use vegidx_core::prelude::*;
}
