//! Ingestion error types.
//!
//! These never abort a run: the ingester logs them, counts them and moves on
//! to the next file or item.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{} does not contain a top-level {expected}", path.display())]
    UnexpectedShape {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("malformed item: {0}")]
    MalformedItem(#[from] serde_json::Error),

    #[error("item has no usable identifier")]
    MissingId,
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        IngestError::Json {
            path: path.into(),
            source,
        }
    }
}
