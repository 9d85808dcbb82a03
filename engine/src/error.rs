//! Error types for engine operations.

use thiserror::Error;

use crate::ItemId;

/// Errors returned by the item tree.
///
/// None of these are fatal to the tree: every mutation that fails leaves the
/// tree in the state it had before the call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The handle does not name a live item.
    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    /// The item's path does not resolve to a catalog keyword.
    #[error("path {0} does not resolve to a keyword")]
    UnresolvedPath(String),

    /// A sequence refused to grow past its maximum or shrink below its
    /// minimum.
    #[error("cannot {action} element of {path}: limit is {limit}")]
    CardinalityViolation {
        path: String,
        action: &'static str,
        limit: usize,
    },

    /// The operation needs a list or sequence item.
    #[error("{0} is not a list or sequence")]
    NotAContainer(String),

    /// An element index outside the sequence.
    #[error("index {index} out of range for {path} ({len} elements)")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// The item has no open linked view.
    #[error("{0} has no linked view")]
    NotLinked(String),

    /// A document does not have the shape the item expects.
    #[error("invalid document for {path}: {message}")]
    InvalidDocument { path: String, message: String },

    /// The keyword provider does not know the command.
    #[error("unknown command {0}")]
    UnknownCommand(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
