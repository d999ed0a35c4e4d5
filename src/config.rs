use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::pipeline::processing::dedupe::{DEFAULT_MULTI_FIELD_THRESHOLD, DEFAULT_SINGLE_FIELD_THRESHOLD};

pub const DEFAULT_CONFIG_PATH: &str = "etl.toml";
pub const CONFIG_PATH_ENV: &str = "SMS_ETL_CONFIG";
pub const MAX_PARTITIONS: usize = 1024;
pub const MAX_DATE_WINDOW_YEARS: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub dates: DateWindow,
    pub artists: ArtistConfig,
    pub venues: VenueConfig,
    pub concerts: ConcertConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Namespace every emitted quality metric is tagged with
    pub namespace: String,
    /// Number of partitions for row-wise transforms
    pub partitions: usize,
    /// Reference date for date plausibility checks, `YYYY-MM-DD`. Today when unset.
    pub as_of: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            namespace: "sms_etl".to_string(),
            partitions: 4,
            as_of: None,
        }
    }
}

/// Accepted distance of a date from the run's reference date
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DateWindow {
    pub max_years_past: u32,
    pub max_years_future: u32,
}

impl Default for DateWindow {
    fn default() -> Self {
        Self {
            max_years_past: 50,
            max_years_future: 5,
        }
    }
}

/// Columns and threshold used for near-duplicate detection
#[derive(Debug, Clone, Deserialize)]
pub struct DedupeConfig {
    pub match_columns: Vec<String>,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ArtistWeights {
    pub name: u32,
    pub genre: u32,
    pub popularity: u32,
    pub formed_date: u32,
}

impl Default for ArtistWeights {
    fn default() -> Self {
        Self {
            name: 25,
            genre: 25,
            popularity: 25,
            formed_date: 25,
        }
    }
}

impl ArtistWeights {
    pub fn total(&self) -> u32 {
        self.name + self.genre + self.popularity + self.formed_date
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct VenueWeights {
    pub name: u32,
    pub city: u32,
    pub capacity: u32,
    pub venue_type: u32,
    pub coordinates: u32,
}

impl Default for VenueWeights {
    fn default() -> Self {
        Self {
            name: 20,
            city: 20,
            capacity: 20,
            venue_type: 20,
            coordinates: 20,
        }
    }
}

impl VenueWeights {
    pub fn total(&self) -> u32 {
        self.name + self.city + self.capacity + self.venue_type + self.coordinates
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ConcertWeights {
    pub references: u32,
    pub event_date: u32,
    pub attendance: u32,
    pub ticket_price: u32,
}

impl Default for ConcertWeights {
    fn default() -> Self {
        Self {
            references: 25,
            event_date: 25,
            attendance: 25,
            ticket_price: 25,
        }
    }
}

impl ConcertWeights {
    pub fn total(&self) -> u32 {
        self.references + self.event_date + self.attendance + self.ticket_price
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtistConfig {
    pub weights: ArtistWeights,
    pub high_quality_cutoff: u32,
    pub dedupe: DedupeConfig,
}

impl Default for ArtistConfig {
    fn default() -> Self {
        Self {
            weights: ArtistWeights::default(),
            high_quality_cutoff: 75,
            dedupe: DedupeConfig {
                match_columns: vec!["name_normalized".to_string()],
                threshold: DEFAULT_SINGLE_FIELD_THRESHOLD,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VenueConfig {
    pub weights: VenueWeights,
    pub high_quality_cutoff: u32,
    pub dedupe: DedupeConfig,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            weights: VenueWeights::default(),
            high_quality_cutoff: 80,
            dedupe: DedupeConfig {
                match_columns: vec![
                    "name_normalized".to_string(),
                    "address_normalized".to_string(),
                ],
                threshold: DEFAULT_MULTI_FIELD_THRESHOLD,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcertConfig {
    pub weights: ConcertWeights,
    pub high_quality_cutoff: u32,
}

impl Default for ConcertConfig {
    fn default() -> Self {
        Self {
            weights: ConcertWeights::default(),
            high_quality_cutoff: 75,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record metrics into the Prometheus recorder
    pub prometheus: bool,
    /// Append every metric event as NDJSON to this file
    pub events_path: Option<PathBuf>,
    /// Push the rendered Prometheus snapshot here after a run
    pub pushgateway_url: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus: true,
            events_path: None,
            pushgateway_url: None,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `SMS_ETL_CONFIG` is consulted,
    /// then `etl.toml` in the working directory; with neither present the
    /// defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var(CONFIG_PATH_ENV)
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                    default.exists().then_some(default)
                }),
        };

        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    EtlError::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                info!(path = %path.display(), "Loaded configuration");
                Self::from_toml(&content)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject configurations whose score weights do not add up to 100 or
    /// whose thresholds are out of range
    pub fn validate(&self) -> Result<()> {
        let totals = [
            ("artists", self.artists.weights.total()),
            ("venues", self.venues.weights.total()),
            ("concerts", self.concerts.weights.total()),
        ];
        for (entity, total) in totals {
            if total != 100 {
                return Err(EtlError::Config(format!(
                    "{} quality weights must sum to 100, got {}",
                    entity, total
                )));
            }
        }

        for (entity, cutoff) in [
            ("artists", self.artists.high_quality_cutoff),
            ("venues", self.venues.high_quality_cutoff),
            ("concerts", self.concerts.high_quality_cutoff),
        ] {
            if cutoff > 100 {
                return Err(EtlError::Config(format!(
                    "{} high_quality_cutoff must be at most 100, got {}",
                    entity, cutoff
                )));
            }
        }

        for (entity, dedupe) in [("artists", &self.artists.dedupe), ("venues", &self.venues.dedupe)] {
            if !(dedupe.threshold > 0.0 && dedupe.threshold <= 1.0) {
                return Err(EtlError::Config(format!(
                    "{} dedupe threshold must be in (0, 1], got {}",
                    entity, dedupe.threshold
                )));
            }
            if dedupe.match_columns.is_empty() {
                return Err(EtlError::Config(format!(
                    "{} dedupe needs at least one match column",
                    entity
                )));
            }
        }

        if !(1..=MAX_PARTITIONS).contains(&self.run.partitions) {
            return Err(EtlError::Config(format!(
                "run.partitions must be in 1..={}, got {}",
                MAX_PARTITIONS, self.run.partitions
            )));
        }

        for (bound, years) in [
            ("max_years_past", self.dates.max_years_past),
            ("max_years_future", self.dates.max_years_future),
        ] {
            if years > MAX_DATE_WINDOW_YEARS {
                return Err(EtlError::Config(format!(
                    "dates.{} must be at most {}, got {}",
                    bound, MAX_DATE_WINDOW_YEARS, years
                )));
            }
        }

        self.as_of()?;
        Ok(())
    }

    /// The configured reference date, if any
    pub fn as_of(&self) -> Result<Option<NaiveDate>> {
        match &self.run.as_of {
            Some(s) => Ok(Some(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)),
            None => Ok(None),
        }
    }
}
