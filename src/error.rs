//! # Error Types Module
//!
//! Error types for the watch-and-optimize pipeline.
//!
//! ## Categories:
//! - `Io`: file vanished, permission denied, log file unwritable
//! - `Image`: decode/encode failures during the resize step
//! - `Json`: malformed config or log record
//! - `Watch`: failures reported by the OS notification backend
//! - `MissingDependency`: pngquant could not be located
//! - `Compression`: pngquant ran but reported a failure
//! - `Resize`: resize step could not be applied (never fatal)
//! - `Validation`: invalid configuration values
//!
//! The optimizer never hands these to its caller: every per-file failure is
//! folded into the `error` field of the resulting `ProcessedFile`.

/// Custom error types for watch-and-optimize processing
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    MissingDependency(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Resize failed: {0}")]
    Resize(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
