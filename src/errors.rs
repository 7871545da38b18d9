//! Error taxonomy for scanning and reclaiming assets.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    /// The asset backend could not be enumerated. Fatal.
    #[error("Asset storage unavailable for container '{container}' at {}: {source}", .root.display())]
    StorageUnavailable {
        container: String,
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single content file or entry could not be read. Recoverable.
    #[error("Could not read content source {source_name}: {reason}")]
    ContentRead { source_name: String, reason: String },

    /// A single asset could not be removed. Recoverable.
    #[error("Failed to delete {path}: {source}")]
    Deletion {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to get operator input: {reason}")]
    Prompt { reason: String },

    #[error("Failed to write report: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
}

impl SweepError {
    /// Whether processing can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SweepError::ContentRead { .. } | SweepError::Deletion { .. }
        )
    }
}
