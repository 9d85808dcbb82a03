//! Error types for catalog database operations.
//!
//! Provides a unified error type covering all failure modes: I/O,
//! serialization, catalog validation and bundle hash verification.

use command_params_core::CatalogError;
use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A loaded command definition failed catalog validation.
    #[error("invalid catalog for {command}: {error}")]
    InvalidCatalog {
        command: String,
        error: CatalogError,
    },

    /// Bundle hash mismatch between declared and computed values.
    #[error("invalid bundle hash: expected {expected}, computed {actual}")]
    InvalidChecksum { expected: String, actual: String },

    /// All configured loader sources failed.
    #[error("no catalog sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
