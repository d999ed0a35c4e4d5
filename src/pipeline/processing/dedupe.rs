//! Near-duplicate detection within a single dataset.
//!
//! Single pass, anchor-ordered clustering. Every record is compared against
//! every later record (O(n²), no blocking), so the match columns for the whole
//! working set must be consolidated into one local frame first.
//!
//! Clusters are not transitively closed: if A matches B and B matches C but A
//! does not match C, C does not join A's cluster.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info};

use super::similarity::similarity_canonical;
use super::text;
use crate::domain::DuplicatePair;
use crate::error::{EtlError, Result};
use crate::pipeline::dataset::Dataset;

/// Threshold for a single strongly discriminating field (e.g. artist name)
pub const DEFAULT_SINGLE_FIELD_THRESHOLD: f64 = 0.85;
/// Threshold when a secondary column adds discriminating power
pub const DEFAULT_MULTI_FIELD_THRESHOLD: f64 = 0.80;

/// Render an id cell as a string, `None` for null or missing ids
pub fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Find near-duplicate records.
///
/// The pair score is the maximum similarity over `match_columns`; a strong
/// match on any one column is enough. The first record of a cluster is its
/// master and is never reported as a duplicate.
pub fn find_duplicates(
    dataset: &Dataset,
    match_columns: &[String],
    id_column: &str,
    threshold: f64,
) -> Result<Vec<DuplicatePair>> {
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(EtlError::Config(format!(
            "duplicate threshold must be in (0, 1], got {}",
            threshold
        )));
    }
    if dataset.is_empty() {
        return Ok(Vec::new());
    }
    if !dataset.has_column(id_column) {
        return Err(EtlError::MissingColumn(id_column.to_string()));
    }

    let mut projection = Vec::with_capacity(match_columns.len() + 1);
    projection.push(id_column.to_string());
    projection.extend(match_columns.iter().cloned());
    let frame = dataset.materialize(&projection);

    // Canonicalize every cell once up front
    let rows: Vec<(String, Vec<String>)> = frame
        .rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| match id_string(row.first()) {
            Some(id) => Some((id, row[1..].iter().map(text::normalize_value).collect())),
            None => {
                debug!(row = idx, "Skipping record without id in duplicate detection");
                None
            }
        })
        .collect();

    let mut processed = vec![false; rows.len()];
    let mut seen_duplicates: HashSet<&str> = HashSet::new();
    let mut pairs = Vec::new();

    for i in 0..rows.len() {
        if processed[i] {
            continue;
        }
        let (anchor_id, anchor_values) = &rows[i];
        let mut cluster: Vec<(usize, f64)> = Vec::new();

        for (j, (_, candidate_values)) in rows.iter().enumerate().skip(i + 1) {
            if processed[j] {
                continue;
            }
            let score = anchor_values
                .iter()
                .zip(candidate_values)
                .map(|(a, b)| similarity_canonical(a, b))
                .fold(0.0_f64, f64::max);

            if score >= threshold {
                cluster.push((j, score));
            }
        }

        if cluster.is_empty() {
            continue;
        }

        processed[i] = true;
        for (j, score) in cluster {
            processed[j] = true;
            let duplicate_id = rows[j].0.as_str();
            // Repeated ids in the input collapse to a single report entry
            if duplicate_id == anchor_id || !seen_duplicates.insert(duplicate_id) {
                continue;
            }
            pairs.push(DuplicatePair {
                duplicate_id: duplicate_id.to_string(),
                master_id: anchor_id.clone(),
                similarity_score: score,
                matched_columns: match_columns.to_vec(),
            });
        }
    }

    info!(
        records = rows.len(),
        duplicates = pairs.len(),
        threshold,
        "Duplicate detection finished"
    );

    Ok(pairs)
}

/// Drop every record whose id appears as a `duplicate_id`
pub fn exclude_duplicates(dataset: Dataset, pairs: &[DuplicatePair], id_column: &str) -> Dataset {
    if pairs.is_empty() {
        return dataset;
    }
    let duplicate_ids: HashSet<&str> = pairs.iter().map(|p| p.duplicate_id.as_str()).collect();
    let masters: HashSet<&str> = pairs.iter().map(|p| p.master_id.as_str()).collect();

    dataset.filter(|record| match id_string(record.get(id_column)) {
        Some(id) => masters.contains(id.as_str()) || !duplicate_ids.contains(id.as_str()),
        None => true,
    })
}
