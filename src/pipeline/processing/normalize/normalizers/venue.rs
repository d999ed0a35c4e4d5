use serde_json::Value;

use super::super::{
    canonicalize_vocab, clamp_number, clean_name, is_present, number_value, rewrite,
    EntityNormalizer, NormalizeContext, NAME_NORMALIZED_FIELD,
};
use crate::config::{DedupeConfig, VenueConfig};
use crate::domain::{EntityKind, RawRecord};
use crate::pipeline::processing::text;

pub const ADDRESS_NORMALIZED_FIELD: &str = "address_normalized";

/// Venue type vocabulary. Amphitheater precedes Theater so the longer word wins.
pub const VENUE_TYPES: &[(&[&str], &str)] = &[
    (&["arena"], "Arena"),
    (&["amphitheater", "amphitheatre", "pavilion"], "Amphitheater"),
    (&["stadium", "ballpark", "field"], "Stadium"),
    (&["theater", "theatre", "auditorium", "opera house"], "Theater"),
    (&["hall", "ballroom"], "Hall"),
    (&["club", "lounge", "bar", "tavern", "pub"], "Club"),
];

pub const OTHER_VENUE_TYPE: &str = "Other";

const CAPACITY_RANGE: (f64, f64) = (0.0, 200_000.0);
const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Normalizer for venue records
pub struct VenueNormalizer {
    config: VenueConfig,
}

impl VenueNormalizer {
    pub fn new(config: VenueConfig) -> Self {
        Self { config }
    }
}

impl Default for VenueNormalizer {
    fn default() -> Self {
        Self::new(VenueConfig::default())
    }
}

impl EntityNormalizer for VenueNormalizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Venues
    }

    fn id_column(&self) -> &'static str {
        "venue_id"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["venue_id", "name", "city", "capacity", "venue_type"]
    }

    fn numeric_columns(&self) -> &'static [&'static str] {
        &["capacity"]
    }

    fn normalize_record(&self, mut record: RawRecord, _ctx: &NormalizeContext) -> RawRecord {
        rewrite(&mut record, "name", |v| clean_name(v).map(Value::String));
        rewrite(&mut record, "city", |v| clean_name(v).map(Value::String));
        rewrite(&mut record, "address", |v| clean_name(v).map(Value::String));
        rewrite(&mut record, "venue_type", |v| {
            canonicalize_vocab(v, VENUE_TYPES, OTHER_VENUE_TYPE)
                .map(|t| Value::String(t.to_string()))
        });
        rewrite(&mut record, "capacity", |v| {
            clamp_number(v, CAPACITY_RANGE.0, CAPACITY_RANGE.1).map(number_value)
        });
        rewrite(&mut record, "latitude", |v| {
            clamp_number(v, LATITUDE_RANGE.0, LATITUDE_RANGE.1).map(number_value)
        });
        rewrite(&mut record, "longitude", |v| {
            clamp_number(v, LONGITUDE_RANGE.0, LONGITUDE_RANGE.1).map(number_value)
        });

        let name = record.get("name").map(text::normalize_value).unwrap_or_default();
        let address = record.get("address").map(text::normalize_value).unwrap_or_default();
        record.insert(NAME_NORMALIZED_FIELD.to_string(), Value::String(name));
        record.insert(ADDRESS_NORMALIZED_FIELD.to_string(), Value::String(address));
        record
    }

    fn quality_score(&self, record: &RawRecord) -> u32 {
        if !is_present(record, "venue_id") || !is_present(record, "name") {
            return 0;
        }
        let has_number = |field: &str| record.get(field).is_some_and(Value::is_number);
        let w = &self.config.weights;
        let checks = [
            (true, w.name),
            (is_present(record, "city"), w.city),
            (has_number("capacity"), w.capacity),
            (is_present(record, "venue_type"), w.venue_type),
            (has_number("latitude") && has_number("longitude"), w.coordinates),
        ];
        checks
            .iter()
            .filter(|(ok, _)| *ok)
            .map(|(_, weight)| weight)
            .sum::<u32>()
            .min(100)
    }

    fn high_quality_cutoff(&self) -> u32 {
        self.config.high_quality_cutoff
    }

    fn dedupe(&self) -> Option<&DedupeConfig> {
        Some(&self.config.dedupe)
    }
}
