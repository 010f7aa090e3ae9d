//! Loader-level error classification.
//!
//! These never cross the engine boundary: a failed source is logged and
//! skipped, and validation/migration outcomes travel as structured data
//! rather than errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading one schema-definition source.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
