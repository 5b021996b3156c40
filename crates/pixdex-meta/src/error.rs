//! Error types for metadata parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the metadata parsers.
///
/// The extractors never return these; they log and degrade the record.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Reading a file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The section the parser looks for is not present.
    #[error("No {section} section found")]
    Missing { section: &'static str },

    /// The section is present but malformed.
    #[error("Malformed {section} section: {message}")]
    Malformed {
        section: &'static str,
        message: String,
    },

    /// An external probe failed.
    #[error("Probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },
}

impl MetadataError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-section error.
    pub fn malformed(section: &'static str, message: impl ToString) -> Self {
        Self::Malformed {
            section,
            message: message.to_string(),
        }
    }
}

/// Result alias for parser operations.
pub type Result<T> = std::result::Result<T, MetadataError>;
