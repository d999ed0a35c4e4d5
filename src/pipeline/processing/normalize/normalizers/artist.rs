use serde_json::Value;

use super::super::{
    canonicalize_vocab, clamp_number, clean_name, is_present, number_value, parse_date, rewrite,
    trim_array, EntityNormalizer, NormalizeContext, NAME_NORMALIZED_FIELD,
};
use crate::config::{ArtistConfig, DedupeConfig};
use crate::domain::{EntityKind, RawRecord};
use crate::pipeline::processing::text;

/// Genre vocabulary. Order matters: the first matching entry wins, and every
/// canonical value must map back to itself.
pub const GENRES: &[(&[&str], &str)] = &[
    (&["hip hop", "hip-hop", "hiphop", "rap", "trap"], "Hip-Hop"),
    (&["electronic", "edm", "house", "techno", "dubstep", "trance"], "Electronic"),
    (&["latin", "salsa", "reggaeton", "cumbia"], "Latin"),
    (&["reggae", "ska", "dub"], "Reggae"),
    (&["metal"], "Metal"),
    (&["punk", "hardcore"], "Punk"),
    (&["rock", "grunge"], "Rock"),
    (&["pop"], "Pop"),
    (&["r&b", "rnb", "soul", "funk"], "R&B"),
    (&["jazz", "swing", "bebop"], "Jazz"),
    (&["blues"], "Blues"),
    (&["country", "americana", "bluegrass"], "Country"),
    (&["classical", "orchestra", "symphony", "opera"], "Classical"),
    (&["folk", "singer-songwriter", "acoustic"], "Folk"),
];

pub const OTHER_GENRE: &str = "Other";

const POPULARITY_RANGE: (f64, f64) = (0.0, 100.0);

/// Normalizer for artist records
pub struct ArtistNormalizer {
    config: ArtistConfig,
}

impl ArtistNormalizer {
    pub fn new(config: ArtistConfig) -> Self {
        Self { config }
    }
}

impl Default for ArtistNormalizer {
    fn default() -> Self {
        Self::new(ArtistConfig::default())
    }
}

impl EntityNormalizer for ArtistNormalizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Artists
    }

    fn id_column(&self) -> &'static str {
        "artist_id"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["artist_id", "name", "genre", "popularity", "formed_date"]
    }

    fn numeric_columns(&self) -> &'static [&'static str] {
        &["popularity"]
    }

    fn normalize_record(&self, mut record: RawRecord, ctx: &NormalizeContext) -> RawRecord {
        rewrite(&mut record, "name", |v| clean_name(v).map(Value::String));
        rewrite(&mut record, "genre", |v| {
            canonicalize_vocab(v, GENRES, OTHER_GENRE).map(|g| Value::String(g.to_string()))
        });
        rewrite(&mut record, "popularity", |v| {
            clamp_number(v, POPULARITY_RANGE.0, POPULARITY_RANGE.1).map(number_value)
        });
        rewrite(&mut record, "formed_date", |v| {
            parse_date(v, ctx).map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        });
        rewrite(&mut record, "members", |v| trim_array(v).map(Value::Array));

        let canonical = record
            .get("name")
            .map(text::normalize_value)
            .unwrap_or_default();
        record.insert(NAME_NORMALIZED_FIELD.to_string(), Value::String(canonical));
        record
    }

    fn quality_score(&self, record: &RawRecord) -> u32 {
        if !is_present(record, "artist_id") || !is_present(record, "name") {
            return 0;
        }
        let w = &self.config.weights;
        let checks = [
            (true, w.name),
            (is_present(record, "genre"), w.genre),
            (
                record.get("popularity").is_some_and(Value::is_number),
                w.popularity,
            ),
            (is_present(record, "formed_date"), w.formed_date),
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
