//! Error types for workspace model resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, loading, merging or validating a workspace model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("No model base file found in workspace '{workspace}'")]
    MissingBase { workspace: PathBuf },

    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} file '{path}': {message}")]
    ParseFailed {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("Failed to serialize {format} document: {message}")]
    SerializeFailed {
        format: &'static str,
        message: String,
    },

    #[error("Unsupported file format for '{path}'")]
    UnsupportedFormat { path: PathBuf },

    #[error("Fragment '{path}' must contain a mapping at the top level")]
    NotAMapping { path: PathBuf },

    #[error("{0}")]
    Validation(String),

    #[error("Failed to compile model schema: {0}")]
    SchemaCompile(String),

    #[error("Failed to fetch remote partial '{url}': {message}")]
    FetchFailed { url: String, message: String },

    #[error("Partial '{reference}' for entry '{entry_key}' could not be resolved: {reason}")]
    UnresolvedPartial {
        entry_key: String,
        reference: String,
        reason: String,
    },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to watch directory '{path}': {message}")]
    WatchFailed { path: PathBuf, message: String },

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate.
pub type ModelResult<T> = Result<T, ModelError>;
