//! Error types for the pipeline stages

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Raster(#[from] vegidx_core::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No band mapping registered for sensor tag '{tag}' ({path})")]
    UnregisteredSensor { path: PathBuf, tag: String },

    #[error("Cannot classify {path} as landsat_8 or landsat_9")]
    UnclassifiedFile { path: PathBuf },

    #[error("Directory {path} is not named after a known index")]
    UnknownIndexDir { path: PathBuf },

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        PipelineError::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
