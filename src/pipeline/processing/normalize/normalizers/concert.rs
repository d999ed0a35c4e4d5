use serde_json::Value;

use super::super::{
    canonicalize_vocab, clamp_number, clean_name, is_present, number_value, parse_date, rewrite,
    trim_array, EntityNormalizer, NormalizeContext,
};
use crate::config::{ConcertConfig, DedupeConfig};
use crate::domain::{EntityKind, RawRecord};

pub const STATUSES: &[(&[&str], &str)] = &[
    (&["cancel"], "cancelled"),
    (&["postpone", "resched", "delayed"], "postponed"),
    (&["complete", "played", "finished", "past"], "completed"),
    (&["schedul", "upcoming", "on sale", "announced", "sold out"], "scheduled"),
];

pub const DEFAULT_STATUS: &str = "scheduled";

const ATTENDANCE_RANGE: (f64, f64) = (0.0, 200_000.0);
const TICKET_PRICE_RANGE: (f64, f64) = (0.0, 10_000.0);
const REVENUE_RANGE: (f64, f64) = (0.0, 1.0e9);

/// Normalizer for concert records. Concerts are unique by construction
/// upstream, so no duplicate detection runs for them.
pub struct ConcertNormalizer {
    config: ConcertConfig,
}

impl ConcertNormalizer {
    pub fn new(config: ConcertConfig) -> Self {
        Self { config }
    }
}

impl Default for ConcertNormalizer {
    fn default() -> Self {
        Self::new(ConcertConfig::default())
    }
}

impl EntityNormalizer for ConcertNormalizer {
    fn kind(&self) -> EntityKind {
        EntityKind::Concerts
    }

    fn id_column(&self) -> &'static str {
        "concert_id"
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["concert_id", "title", "artist_id", "venue_id", "event_date", "attendance"]
    }

    fn numeric_columns(&self) -> &'static [&'static str] {
        &["attendance", "ticket_price", "revenue"]
    }

    fn normalize_record(&self, mut record: RawRecord, ctx: &NormalizeContext) -> RawRecord {
        rewrite(&mut record, "title", |v| clean_name(v).map(Value::String));
        rewrite(&mut record, "event_date", |v| {
            parse_date(v, ctx).map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        });
        rewrite(&mut record, "status", |v| {
            canonicalize_vocab(v, STATUSES, DEFAULT_STATUS).map(|s| Value::String(s.to_string()))
        });
        rewrite(&mut record, "attendance", |v| {
            clamp_number(v, ATTENDANCE_RANGE.0, ATTENDANCE_RANGE.1).map(number_value)
        });
        rewrite(&mut record, "ticket_price", |v| {
            clamp_number(v, TICKET_PRICE_RANGE.0, TICKET_PRICE_RANGE.1).map(number_value)
        });
        rewrite(&mut record, "revenue", |v| {
            clamp_number(v, REVENUE_RANGE.0, REVENUE_RANGE.1).map(number_value)
        });
        rewrite(&mut record, "supporting_acts", |v| trim_array(v).map(Value::Array));
        record
    }

    fn quality_score(&self, record: &RawRecord) -> u32 {
        if !is_present(record, "concert_id") || !is_present(record, "title") {
            return 0;
        }
        let has_number = |field: &str| record.get(field).is_some_and(Value::is_number);
        let w = &self.config.weights;
        let checks = [
            (
                is_present(record, "artist_id") && is_present(record, "venue_id"),
                w.references,
            ),
            (is_present(record, "event_date"), w.event_date),
            (has_number("attendance"), w.attendance),
            (has_number("ticket_price"), w.ticket_price),
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
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::Dataset;
    use crate::pipeline::processing::normalize::test_support::{ctx, record};
    use serde_json::json;

    fn show() -> RawRecord {
        record(json!({
            "concert_id": "c-1",
            "title": " Pearl Jam  @ Key Arena ",
            "artist_id": "a-1",
            "venue_id": "v-1",
            "event_date": "06/20/2024",
            "status": "SOLD OUT",
            "attendance": 17000.0,
            "ticket_price": "89.50",
            "revenue": -5,
            "supporting_acts": ["  Mudhoney ", " "]
        }))
    }

    #[test]
    fn cleans_all_fields() {
        let n = ConcertNormalizer::default();
        let out = n.normalize_record(show(), &ctx());
        assert_eq!(out["title"], json!("Pearl Jam Key Arena"));
        assert_eq!(out["event_date"], json!("2024-06-20"));
        assert_eq!(out["status"], json!("scheduled"));
        assert_eq!(out["attendance"], json!(17000));
        assert_eq!(out["ticket_price"], json!(89.5));
        assert_eq!(out["revenue"], json!(0));
        assert_eq!(out["supporting_acts"], json!(["Mudhoney"]));
        assert_eq!(n.quality_score(&out), 100);
    }

    #[test]
    fn status_vocabulary() {
        for (raw, expected) in [
            ("Cancelled", "cancelled"),
            ("Canceled - refunds available", "cancelled"),
            ("rescheduled", "postponed"),
            ("played", "completed"),
            ("tba", "scheduled"),
        ] {
            assert_eq!(
                canonicalize_vocab(&json!(raw), STATUSES, DEFAULT_STATUS),
                Some(expected),
                "{}",
                raw
            );
        }
        for (_, canonical) in STATUSES {
            assert_eq!(
                canonicalize_vocab(&json!(canonical), STATUSES, DEFAULT_STATUS),
                Some(*canonical)
            );
        }
    }

    #[test]
    fn missing_concert_id_scores_zero() {
        let n = ConcertNormalizer::default();
        let mut r = show();
        r.remove("concert_id");
        let out = n.normalize_record(r, &ctx());
        assert_eq!(n.quality_score(&out), 0);
    }

    #[test]
    fn missing_or_unusable_title_scores_zero() {
        let n = ConcertNormalizer::default();

        let mut untitled = show();
        untitled.remove("title");
        let out = n.normalize_record(untitled, &ctx());
        assert_eq!(n.quality_score(&out), 0);

        let mut garbage = show();
        garbage.insert("title".into(), json!("<<>>"));
        let out = n.normalize_record(garbage, &ctx());
        assert_eq!(out["title"], Value::Null);
        assert_eq!(n.quality_score(&out), 0);
    }

    #[test]
    fn references_need_both_ids() {
        let n = ConcertNormalizer::default();
        let mut r = show();
        r.remove("venue_id");
        let out = n.normalize_record(r, &ctx());
        assert_eq!(n.quality_score(&out), 75);
    }

    #[test]
    fn implausible_dates_fail_the_check() {
        let n = ConcertNormalizer::default();
        let mut r = show();
        r.insert("event_date".into(), json!("2099-01-01"));
        let out = n.normalize_record(r, &ctx());
        assert_eq!(out["event_date"], Value::Null);
        assert_eq!(n.quality_score(&out), 75);
    }

    #[test]
    fn no_dedupe_for_concerts() {
        assert!(ConcertNormalizer::default().dedupe().is_none());
    }

    #[test]
    fn idempotent() {
        let n = ConcertNormalizer::default();
        let once = n.normalize(Dataset::new(vec![show()]), 1, &ctx());
        let twice = n.normalize(once.clone(), 1, &ctx());
        assert_eq!(once, twice);
    }
}
