use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or cleaning the tabular source. Fatal at startup;
/// no partial dashboard is shown.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("dataset source not found: {path}")]
    SourceMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required column '{column}' missing in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("malformed row {row} in {path}: {message}")]
    MalformedRow {
        path: PathBuf,
        row: usize,
        message: String,
    },

    /// Only raised under `DuplicatePolicy::Reject`.
    #[error("duplicate observation for {country} in {year}")]
    DuplicateObservation { country: String, year: u16 },

    #[error("failed to write cache {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Failures while loading the geographic boundary source.
#[derive(Debug, Error)]
pub enum GeoLoadError {
    #[error("geo source not found: {path}")]
    SourceMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed geo feature in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while reading the optional configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
