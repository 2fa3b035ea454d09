use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::{DashboardConfig, DuplicatePolicy};
use crate::error::{DataLoadError, GeoLoadError};
use crate::models::{Dataset, GeoDataset, GeoFeature, Record};

/// Bumped whenever the cleaning rule changes, so stale caches rebuild.
const CLEANING_RULE_VERSION: u32 = 1;

const REQUIRED_COLUMNS: [&str; 8] = [
    "country",
    "continent",
    "year",
    "life_exp",
    "hdi_index",
    "co2_consump",
    "gdp",
    "services",
];

/// Raw csv row before cleaning. Every field is optional; a row missing any of
/// them is dropped, a row that fails to parse at all is a load error.
#[derive(Debug, Deserialize)]
struct RawRecord {
    country: Option<String>,
    continent: Option<String>,
    year: Option<u16>,
    life_exp: Option<f64>,
    hdi_index: Option<f64>,
    co2_consump: Option<f64>,
    gdp: Option<f64>,
    services: Option<f64>,
}

impl RawRecord {
    fn cleaned(self) -> Option<Record> {
        let country = self.country.filter(|c| !c.is_empty())?;
        let continent = self.continent.filter(|c| !c.is_empty())?;
        Some(Record {
            country,
            continent,
            year: self.year?,
            life_exp: self.life_exp?,
            hdi_index: self.hdi_index?,
            co2_consump: self.co2_consump?,
            gdp: self.gdp?,
            services: self.services?,
        })
    }
}

/// Sidecar describing what a cache file was derived from. The cache is only
/// served when the source digest and cleaning rule both match.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct CacheMeta {
    source_digest: String,
    cleaning_rule: u32,
}

/// Owns loading and cleaning of the tabular and boundary sources, with a
/// disk-level memo of both. The returned datasets are immutable by contract;
/// nothing else writes to them.
pub struct DatasetStore {
    config: DashboardConfig,
}

impl DatasetStore {
    pub fn new(config: DashboardConfig) -> Self {
        DatasetStore { config }
    }

    /// Load the cleaned dataset, serving the cache when it matches the
    /// current source, rebuilding it otherwise. Idempotent either way.
    pub fn load(&self) -> Result<Dataset, DataLoadError> {
        let path = &self.config.data_path;
        let raw = fs::read(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => DataLoadError::SourceMissing {
                path: path.clone(),
                source,
            },
            _ => DataLoadError::Io {
                path: path.clone(),
                source,
            },
        })?;
        let meta = CacheMeta {
            source_digest: hex::encode(Sha256::digest(&raw)),
            cleaning_rule: CLEANING_RULE_VERSION,
        };

        let cache_path = self.config.cache_dir.join("cleaned.csv");
        let meta_path = self.config.cache_dir.join("cleaned.meta.json");
        if cache_meta_matches(&meta_path, &meta) {
            if let Ok(dataset) = read_record_cache(&cache_path) {
                info!(cache = %cache_path.display(), rows = dataset.len(), "serving cached dataset");
                return Ok(dataset);
            }
        }

        let dataset = clean_rows(&raw, path, self.config.duplicate_policy)?;
        info!(
            source = %path.display(),
            rows = dataset.len(),
            "cleaned dataset from source"
        );
        write_record_cache(&cache_path, &meta_path, &meta, &dataset)?;
        Ok(dataset)
    }

    /// Load the boundary file, with the same digest-keyed cache scheme.
    pub fn load_geo(&self) -> Result<GeoDataset, GeoLoadError> {
        let path = &self.config.geo_path;
        let raw = fs::read(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => GeoLoadError::SourceMissing {
                path: path.clone(),
                source,
            },
            _ => GeoLoadError::Io {
                path: path.clone(),
                source,
            },
        })?;
        let meta = CacheMeta {
            source_digest: hex::encode(Sha256::digest(&raw)),
            cleaning_rule: CLEANING_RULE_VERSION,
        };

        let cache_path = self.config.cache_dir.join("boundaries.json");
        let meta_path = self.config.cache_dir.join("boundaries.meta.json");
        if cache_meta_matches(&meta_path, &meta) {
            if let Ok(text) = fs::read_to_string(&cache_path) {
                if let Ok(geo) = serde_json::from_str::<Vec<GeoFeature>>(&text) {
                    info!(cache = %cache_path.display(), features = geo.len(), "serving cached boundaries");
                    return Ok(index_features(geo));
                }
            }
        }

        let features: Vec<GeoFeature> =
            serde_json::from_slice(&raw).map_err(|source| GeoLoadError::Malformed {
                path: path.clone(),
                source,
            })?;
        info!(source = %path.display(), features = features.len(), "parsed boundary file");
        if let Some(parent) = cache_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(text) = serde_json::to_string(&features) {
            let _ = fs::write(&cache_path, text);
            let _ = fs::write(
                &meta_path,
                serde_json::to_string(&meta).unwrap_or_default(),
            );
        }
        Ok(index_features(features))
    }
}

fn index_features(features: Vec<GeoFeature>) -> GeoDataset {
    features
        .into_iter()
        .map(|f| (f.country.clone(), f))
        .collect()
}

fn cache_meta_matches(meta_path: &Path, expected: &CacheMeta) -> bool {
    fs::read_to_string(meta_path)
        .ok()
        .and_then(|text| serde_json::from_str::<CacheMeta>(&text).ok())
        .map_or(false, |found| found == *expected)
}

fn clean_rows(
    raw: &[u8],
    path: &PathBuf,
    policy: DuplicatePolicy,
) -> Result<Dataset, DataLoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(raw);
    let headers = rdr
        .headers()
        .map_err(|e| DataLoadError::MalformedRow {
            path: path.clone(),
            row: 1,
            message: e.to_string(),
        })?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DataLoadError::MissingColumn {
                column: column.to_string(),
                path: path.clone(),
            });
        }
    }

    let mut dataset: Dataset = Vec::new();
    let mut seen: HashMap<(String, u16), usize> = HashMap::new();
    for (i, result) in rdr.deserialize::<RawRecord>().enumerate() {
        let row = i + 2; // header is line 1
        let raw_record = result.map_err(|e| DataLoadError::MalformedRow {
            path: path.clone(),
            row,
            message: e.to_string(),
        })?;
        let Some(record) = raw_record.cleaned() else {
            continue; // drop-missing-rows policy
        };
        let key = (record.country.clone(), record.year);
        match (seen.get(&key), policy) {
            (Some(_), DuplicatePolicy::Reject) => {
                return Err(DataLoadError::DuplicateObservation {
                    country: record.country,
                    year: record.year,
                });
            }
            (Some(&idx), DuplicatePolicy::LastWins) => {
                dataset[idx] = record;
            }
            _ => {
                if policy != DuplicatePolicy::Keep {
                    seen.insert(key, dataset.len());
                }
                dataset.push(record);
            }
        }
    }
    Ok(dataset)
}

fn read_record_cache(path: &Path) -> Result<Dataset, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut dataset = Vec::new();
    for result in rdr.deserialize::<Record>() {
        dataset.push(result?);
    }
    Ok(dataset)
}

fn write_record_cache(
    cache_path: &Path,
    meta_path: &Path,
    meta: &CacheMeta,
    dataset: &Dataset,
) -> Result<(), DataLoadError> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).map_err(|source| DataLoadError::Io {
            path: cache_path.to_path_buf(),
            source,
        })?;
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(cache_path)
        .map_err(|source| DataLoadError::CacheWrite {
            path: cache_path.to_path_buf(),
            source,
        })?;
    for record in dataset {
        wtr.serialize(record)
            .map_err(|source| DataLoadError::CacheWrite {
                path: cache_path.to_path_buf(),
                source,
            })?;
    }
    wtr.flush().map_err(|source| DataLoadError::Io {
        path: cache_path.to_path_buf(),
        source,
    })?;
    fs::write(
        meta_path,
        serde_json::to_string(meta).unwrap_or_default(),
    )
    .map_err(|source| DataLoadError::Io {
        path: meta_path.to_path_buf(),
        source,
    })?;
    Ok(())
}
