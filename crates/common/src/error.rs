//! Error types for AutoSmoke

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the AutoSmoke error
pub type Result<T> = std::result::Result<T, Error>;

/// AutoSmoke error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Evidence file not found: {0}")]
    EvidenceNotFound(PathBuf),

    #[error("Malformed evidence in {path}: {source}")]
    InvalidEvidence {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Route mismatch: expected {expected}, got {actual}")]
    RouteMismatch { expected: String, actual: String },

    #[error("Failed to persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

