//! Common error types for parley.
//!
//! These cover loading, validating and persisting client-side state.

use std::path::PathBuf;

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while handling client state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Reading or writing the state file failed.
    #[error("state file {path}: {source}")]
    Io {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The state file does not contain valid JSON.
    #[error("invalid state JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A server URL could not be parsed or uses an unsupported scheme.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No platform configuration directory could be determined.
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
