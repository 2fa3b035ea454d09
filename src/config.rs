use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// What to do with duplicate (country, year) rows in the raw source. The raw
/// data is not expected to contain them, so there is no single right answer;
/// the policy is a configuration choice rather than a baked-in guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep every row as-is.
    Keep,
    /// Keep only the last row seen for each (country, year) pair.
    LastWins,
    /// Treat a duplicate as a load error.
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Raw tabular source.
    pub data_path: PathBuf,
    /// Boundary file for the map chart.
    pub geo_path: PathBuf,
    /// Directory for the read-through caches of the cleaned data.
    pub cache_dir: PathBuf,
    /// Directory the renderers write chart files into.
    pub output_dir: PathBuf,
    /// Every Nth distinct year for the coarse slider variant.
    pub year_step: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_path: PathBuf::from("data/raw/gapminder_data_graphs.csv"),
            geo_path: PathBuf::from("data/raw/world_boundaries.json"),
            cache_dir: PathBuf::from("tmp"),
            output_dir: PathBuf::from("out"),
            year_step: 4,
            duplicate_policy: DuplicatePolicy::Keep,
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file, or fall back to the defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(DashboardConfig::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| ConfigError::Invalid {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}
