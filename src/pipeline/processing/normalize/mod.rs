//! Entity normalization: field-level cleaning plus a composite quality score.
//!
//! Every field operation here is idempotent, so running a normalizer over its
//! own output leaves the normalized fields unchanged.

pub mod normalizers;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use crate::config::{Config, DateWindow, DedupeConfig};
use crate::domain::{EntityKind, RawRecord};
use crate::pipeline::dataset::Dataset;

pub use normalizers::artist::ArtistNormalizer;
pub use normalizers::concert::ConcertNormalizer;
pub use normalizers::venue::VenueNormalizer;

/// Field written by every normalizer with the composite 0-100 score
pub const QUALITY_SCORE_FIELD: &str = "quality_score";
/// Canonical form of the display name, used for matching
pub const NAME_NORMALIZED_FIELD: &str = "name_normalized";

/// Inputs that must be identical across partitions for results to be deterministic
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext {
    pub as_of: NaiveDate,
    pub dates: DateWindow,
}

/// Trait implemented by the artist, venue and concert normalizers
pub trait EntityNormalizer: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Primary identifier column
    fn id_column(&self) -> &'static str;

    /// Columns whose presence is measured for completeness
    fn required_columns(&self) -> &'static [&'static str];

    /// Numeric columns inspected for outliers
    fn numeric_columns(&self) -> &'static [&'static str];

    /// Clean a single record. Pure; must not touch shared state.
    fn normalize_record(&self, record: RawRecord, ctx: &NormalizeContext) -> RawRecord;

    /// Composite score of an already normalized record
    fn quality_score(&self, record: &RawRecord) -> u32;

    /// Score at or above which a record counts as high quality
    fn high_quality_cutoff(&self) -> u32;

    /// Duplicate detection settings, `None` for entities assumed unique upstream
    fn dedupe(&self) -> Option<&DedupeConfig>;

    /// Normalize and score every record, partition-parallel
    fn normalize(&self, dataset: Dataset, partitions: usize, ctx: &NormalizeContext) -> Dataset {
        dataset.map_partitions(partitions, |record| {
            let mut record = self.normalize_record(record, ctx);
            let score = self.quality_score(&record);
            record.insert(QUALITY_SCORE_FIELD.to_string(), Value::from(score));
            record
        })
    }

    /// Percentage of records scoring at or above the high-quality cutoff
    fn high_quality_percentage(&self, dataset: &Dataset) -> f64 {
        if dataset.is_empty() {
            return 0.0;
        }
        let cutoff = self.high_quality_cutoff();
        let high = dataset.count_where(|r| score_of(r) >= cutoff);
        high as f64 / dataset.len() as f64 * 100.0
    }
}

/// Build the normalizer for an entity kind from configuration
pub fn normalizer_for(kind: EntityKind, config: &Config) -> Box<dyn EntityNormalizer> {
    match kind {
        EntityKind::Artists => Box::new(ArtistNormalizer::new(config.artists.clone())),
        EntityKind::Venues => Box::new(VenueNormalizer::new(config.venues.clone())),
        EntityKind::Concerts => Box::new(ConcertNormalizer::new(config.concerts.clone())),
    }
}

/// The `quality_score` of a normalized record, 0 when absent
pub fn score_of(record: &RawRecord) -> u32 {
    record
        .get(QUALITY_SCORE_FIELD)
        .and_then(Value::as_u64)
        .map(|s| s.min(100) as u32)
        .unwrap_or(0)
}

/// True when the field holds a non-blank value
pub fn is_present(record: &RawRecord, field: &str) -> bool {
    match record.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

/// Keep letters, digits, whitespace and a small set of name punctuation;
/// collapse whitespace. Returns `None` when nothing is left.
pub fn clean_name(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "&'-.,!?()/+:#".contains(*c))
        .collect();
    let cleaned = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Map free text onto a canonical vocabulary by lower-case substring lookup.
///
/// The first table entry with a matching pattern wins; unmatched text maps to
/// `fallback`. Blank input maps to `None`.
pub fn canonicalize_vocab(
    value: &Value,
    table: &[(&[&str], &'static str)],
    fallback: &'static str,
) -> Option<&'static str> {
    let text = value.as_str()?.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    let canonical = table
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| text.contains(p)))
        .map(|(_, canonical)| *canonical)
        .unwrap_or(fallback);
    Some(canonical)
}

/// Numbers or numeric strings, clamped into `[min, max]`
pub fn clamp_number(value: &Value, min: f64, max: f64) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then(|| n.clamp(min, max))
}

/// JSON representation of a clamped number: integral values stay integers
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a date and accept it only inside the plausibility window around
/// `ctx.as_of`
pub fn parse_date(value: &Value, ctx: &NormalizeContext) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    let date = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        })?;

    let earliest = ctx
        .as_of
        .checked_sub_months(Months::new(ctx.dates.max_years_past.checked_mul(12)?))?;
    let latest = ctx
        .as_of
        .checked_add_months(Months::new(ctx.dates.max_years_future.checked_mul(12)?))?;

    (date >= earliest && date <= latest && date.year() > 0).then_some(date)
}

/// Trim string elements and drop empty ones; anything but an array becomes `None`
pub fn trim_array(value: &Value) -> Option<Vec<Value>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => {
                    let t = s.split_whitespace().collect::<Vec<_>>().join(" ");
                    (!t.is_empty()).then(|| Value::String(t))
                }
                Value::Null => None,
                other => Some(other.clone()),
            })
            .collect(),
    )
}

/// Overwrite `field` with the result of `f` applied to its current value.
/// Absent fields stay absent; a `None` result becomes null.
pub(crate) fn rewrite<F>(record: &mut RawRecord, field: &str, f: F)
where
    F: FnOnce(&Value) -> Option<Value>,
{
    if let Some(current) = record.get(field) {
        let next = f(current).unwrap_or(Value::Null);
        record.insert(field.to_string(), next);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ctx;
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_name_whitelist() {
        assert_eq!(
            clean_name(&json!("  Guns N' Roses™  ")),
            Some("Guns N' Roses".to_string())
        );
        assert_eq!(clean_name(&json!("<<>>")), None);
        assert_eq!(clean_name(&Value::Null), None);
        let once = clean_name(&json!("Sigur Rós\t\t(live)")).unwrap();
        assert_eq!(clean_name(&Value::String(once.clone())), Some(once));
    }

    #[test]
    fn vocab_first_match_wins() {
        let table: &[(&[&str], &'static str)] = &[(&["metal"], "Metal"), (&["rock"], "Rock")];
        assert_eq!(canonicalize_vocab(&json!("Heavy Metal Rock"), table, "Other"), Some("Metal"));
        assert_eq!(canonicalize_vocab(&json!("indie rock"), table, "Other"), Some("Rock"));
        assert_eq!(canonicalize_vocab(&json!("polka"), table, "Other"), Some("Other"));
        assert_eq!(canonicalize_vocab(&json!("   "), table, "Other"), None);
    }

    #[test]
    fn clamp_and_render() {
        assert_eq!(clamp_number(&json!(150), 0.0, 100.0), Some(100.0));
        assert_eq!(clamp_number(&json!("-3"), 0.0, 100.0), Some(0.0));
        assert_eq!(clamp_number(&json!("1,500"), 0.0, 2000.0), Some(1500.0));
        assert_eq!(clamp_number(&json!("lots"), 0.0, 100.0), None);
        assert_eq!(number_value(42.0), json!(42));
        assert_eq!(number_value(42.5), json!(42.5));
    }

    #[test]
    fn dates_inside_window() {
        let ctx = ctx();
        assert_eq!(
            parse_date(&json!("2023-10-05"), &ctx),
            NaiveDate::from_ymd_opt(2023, 10, 5)
        );
        assert_eq!(
            parse_date(&json!("10/05/2023"), &ctx),
            NaiveDate::from_ymd_opt(2023, 10, 5)
        );
        assert_eq!(
            parse_date(&json!("2023-10-05T20:00:00Z"), &ctx),
            NaiveDate::from_ymd_opt(2023, 10, 5)
        );
        assert_eq!(
            parse_date(&json!("2023-10-05 20:00:00"), &ctx),
            NaiveDate::from_ymd_opt(2023, 10, 5)
        );
    }

    #[test]
    fn dates_outside_window_are_rejected() {
        let ctx = ctx();
        assert_eq!(parse_date(&json!("1960-01-01"), &ctx), None);
        assert_eq!(parse_date(&json!("2035-01-01"), &ctx), None);
        assert_eq!(parse_date(&json!("not a date"), &ctx), None);
        assert!(parse_date(&json!("1974-06-01"), &ctx).is_some());
        assert!(parse_date(&json!("2029-06-01"), &ctx).is_some());
    }

    #[test]
    fn oversized_window_rejects_instead_of_overflowing() {
        let ctx = NormalizeContext {
            as_of: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            dates: DateWindow {
                max_years_past: u32::MAX,
                max_years_future: u32::MAX,
            },
        };
        assert_eq!(parse_date(&json!("2023-10-05"), &ctx), None);
    }

    #[test]
    fn arrays_are_trimmed() {
        assert_eq!(
            trim_array(&json!([" Paul ", "", null, "John  Lennon"])),
            Some(vec![json!("Paul"), json!("John Lennon")])
        );
        assert_eq!(trim_array(&json!("Paul")), None);
    }

    #[test]
    fn presence() {
        let r = super::test_support::record(json!({"a": " ", "b": [], "c": 0, "d": null}));
        assert!(!is_present(&r, "a"));
        assert!(!is_present(&r, "b"));
        assert!(is_present(&r, "c"));
        assert!(!is_present(&r, "d"));
        assert!(!is_present(&r, "missing"));
    }
}
