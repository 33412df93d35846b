//! Error types for vegidx

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for raster operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error in {path}: {message}")]
    Tiff { path: PathBuf, message: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Band {band} out of range: raster has {count} band(s)")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Cannot draw {required} samples from a raster of {available} pixels")]
    InsufficientPixels { required: usize, available: usize },

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn tiff(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Error::Tiff {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for raster operations
pub type Result<T> = std::result::Result<T, Error>;
