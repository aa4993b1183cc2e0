//! Error types for the relay core and its configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::prefix::Suite;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("{what} capacity of {limit} exceeded")]
    CapacityExceeded { what: &'static str, limit: usize },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("{0} already present")]
    AlreadyPresent(&'static str),

    #[error("buffer of {capacity} bytes too small")]
    BufferTooSmall { capacity: usize },

    #[error("operation not supported for suite {0}")]
    UnsupportedSuite(Suite),
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
