//! Error types for the dump tool.

use std::path::PathBuf;

use thiserror::Error;

/// Why a dump could not be produced.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tables incomplete ({0})")]
    Incomplete(&'static str),
}
