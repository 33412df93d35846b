//! # vegidx pipeline
//!
//! The two filesystem-level stages:
//!
//! 1. [`compute`]: walk a tree of multi-band images and write NDVI, EVI,
//!    NDWI and SAVI rasters next to each source.
//! 2. [`aggregate`]: walk an index/season tree of index rasters, sample each
//!    one and write one CSV table per index.
//!
//! Both stages share the directory conventions in [`layout`].

pub mod aggregate;
pub mod compute;
pub mod error;
pub mod layout;
pub mod table;

pub use aggregate::{
    aggregate, aggregate_index_dir, sample_file, AggregateOptions, AggregateReport,
};
pub use compute::{
    compute_indices, process_raster, ComputeOptions, ComputeReport, RasterOutcome, SkipReason,
};
pub use error::{PipelineError, Result};
pub use layout::{IndexTree, OutputTree, SeasonFiles, SensorGeneration};
pub use table::SampleTable;

/// What to do when one file fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the whole run at the first failing file
    #[default]
    Abort,
    /// Record the failure in the report and move on to the next file
    Continue,
}
