//! Error handling for Loopgrid
//!
//! The loop engine itself never fails: degenerate input falls back to
//! well-defined defaults. Errors only come from the edges of the crate
//! (configuration and the event files fed to the CLI).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Loopgrid operations
pub type Result<T> = std::result::Result<T, LoopGridError>;

/// Main error type for Loopgrid operations
#[derive(Error, Debug)]
pub enum LoopGridError {
    // Configuration Errors
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Input Errors
    #[error("Invalid event at index {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },

    #[error("Invalid grid shape: {rows}x{cols} cannot hold {targets} targets")]
    InvalidShape {
        rows: usize,
        cols: usize,
        targets: usize,
    },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoopGridError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LoopGridError::InvalidConfig { .. } => "INVALID_CONFIG",
            LoopGridError::FileReadError { .. } => "FILE_READ_ERROR",
            LoopGridError::InvalidEvent { .. } => "INVALID_EVENT",
            LoopGridError::InvalidShape { .. } => "INVALID_SHAPE",
            LoopGridError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns a user-facing recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            LoopGridError::InvalidConfig { .. } => {
                Some("Remove the offending field to fall back to its default.")
            }
            LoopGridError::FileReadError { .. } => Some("Check the file path and try again."),
            LoopGridError::InvalidEvent { .. } => {
                Some("Event positions must be finite and target ids non-empty.")
            }
            LoopGridError::InvalidShape { .. } => {
                Some("Use a grid shape with at least as many cells as targets.")
            }
            LoopGridError::Serialization(_) => Some("Check that the file is valid JSON."),
        }
    }
}
