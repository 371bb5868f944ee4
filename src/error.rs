use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures of the on-disk link database.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading, writing or renaming the database file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The database file exists but is not a JSON object of strings.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode links: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Rejected user input. The `Display` text is sent back as the 400 body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("key cannot be empty")]
    EmptyKey,

    #[error("key too long (max {max} characters)")]
    KeyTooLong { max: usize },

    #[error("key must contain only alphanumeric characters, hyphens, and underscores")]
    InvalidKey,

    #[error("URL cannot be empty")]
    EmptyUrl,

    #[error("URL too long (max {max} characters)")]
    UrlTooLong { max: usize },

    #[error("invalid URL (must be http or https)")]
    InvalidUrl,
}
