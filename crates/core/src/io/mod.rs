//! Reading and writing GeoTIFF rasters

mod chunks;
mod native;

pub use native::{
    read_geotiff, write_geotiff, write_geotiff_with_profile, write_multiband_geotiff,
    RasterDataset,
};
