//! Error types for cache operations.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to resolve {path}: {reason}")]
    PathResolution { path: String, reason: String },
}

impl CacheError {
    pub fn path_resolution<P: AsRef<Path>>(path: P, reason: impl ToString) -> Self {
        CacheError::PathResolution {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
