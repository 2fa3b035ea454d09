use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The five metrics every observation carries. The serde names match the
/// column headers of the raw csv.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricId {
    #[serde(rename = "life_exp")]
    LifeExp,
    #[serde(rename = "hdi_index")]
    HdiIndex,
    #[serde(rename = "co2_consump")]
    Co2Consump,
    #[serde(rename = "gdp")]
    Gdp,
    #[serde(rename = "services")]
    Services,
}

impl MetricId {
    pub const ALL: [MetricId; 5] = [
        MetricId::LifeExp,
        MetricId::HdiIndex,
        MetricId::Co2Consump,
        MetricId::Gdp,
        MetricId::Services,
    ];

    /// Column key in the tabular source.
    pub fn key(self) -> &'static str {
        match self {
            MetricId::LifeExp => "life_exp",
            MetricId::HdiIndex => "hdi_index",
            MetricId::Co2Consump => "co2_consump",
            MetricId::Gdp => "gdp",
            MetricId::Services => "services",
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One (country, year) observation. All metric fields are guaranteed present;
/// rows missing any required value are dropped at load time and never reach
/// this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub country: String,
    pub continent: String,
    pub year: u16,
    pub life_exp: f64,
    pub hdi_index: f64,
    pub co2_consump: f64,
    pub gdp: f64,
    pub services: f64,
}

impl Record {
    pub fn metric(&self, id: MetricId) -> f64 {
        match id {
            MetricId::LifeExp => self.life_exp,
            MetricId::HdiIndex => self.hdi_index,
            MetricId::Co2Consump => self.co2_consump,
            MetricId::Gdp => self.gdp,
            MetricId::Services => self.services,
        }
    }
}

/// Cleaned dataset, ordered as loaded. Owned by the store, read-only to
/// everything else.
pub type Dataset = Vec<Record>;

/// Boundary polygons for one country. Rings are (longitude, latitude) pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    pub country: String,
    pub rings: Vec<Vec<(f64, f64)>>,
}

/// Country name -> boundary geometry, keyed the same way the tabular data
/// names countries.
pub type GeoDataset = BTreeMap<String, GeoFeature>;

/// Catalog entry for one metric: id, display label and a short definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricInfo {
    pub id: MetricId,
    pub label: &'static str,
    pub definition: &'static str,
}
