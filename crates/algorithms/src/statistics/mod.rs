//! Raster statistics
//!
//! - Sampling: fixed-size random pixel samples that always carry the
//!   raster's min, mean and max

mod sampling;

pub use sampling::{sample_pixels, summarize, PixelSummary, SampleParams, DEFAULT_SAMPLE_SIZE};
