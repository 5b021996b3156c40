//! Error types for the store and the reconciliation engine.

use std::path::PathBuf;

use pixdex_core::{DirectoryId, MediaId, ScanError};
use thiserror::Error;

/// Errors raised by a [`MediaStore`](crate::MediaStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown directory id {0:?}")]
    UnknownDirectory(DirectoryId),

    #[error("Unknown media id {0:?}")]
    UnknownMedia(MediaId),

    #[error("Directory already indexed: {0}")]
    DuplicateDirectory(PathBuf),

    #[error("Media {name} already indexed in directory {directory:?}")]
    DuplicateMedia { directory: DirectoryId, name: String },

    #[error("Snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    /// A backend broke the [`MediaStore`](crate::MediaStore) contract.
    #[error("Inconsistent store response: {0}")]
    Inconsistent(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Request-fatal errors of a listing call.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The requested directory is missing, unreadable or not a directory.
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
