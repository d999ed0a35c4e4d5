use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single ingested record: field name to untyped JSON value
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// The entity types the engine processes. Doubles as the `DataType` metric dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artists,
    Venues,
    Concerts,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artists => "Artists",
            EntityKind::Venues => "Venues",
            EntityKind::Concerts => "Concerts",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A near-duplicate found by the clusterer.
///
/// The duplicate is dropped from the output dataset; the source is never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicatePair {
    pub duplicate_id: String,
    pub master_id: String,
    pub similarity_score: f64,
    pub matched_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MetricUnit {
    Percent,
    Count,
    Seconds,
    None,
}

/// One emitted data-quality measurement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityMetric {
    pub namespace: String,
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub dimensions: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// Summary statistics and outlier counts for one numeric column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnAnomaly {
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-column anomaly statistics. Columns with fewer than two values are absent.
pub type AnomalyReport = BTreeMap<String, ColumnAnomaly>;
