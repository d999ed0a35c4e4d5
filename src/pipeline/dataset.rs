//! Record-oriented tabular dataset.
//!
//! Row-wise transforms go through [`Dataset::map_partitions`] and can run in
//! parallel. Anything that needs a whole-dataset view (the duplicate clusterer)
//! must call [`Dataset::materialize`] explicitly.

use rayon::prelude::*;
use serde_json::Value;

use crate::domain::RawRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<RawRecord>,
}

/// A local, column-projected copy of a dataset
#[derive(Debug, Clone)]
pub struct LocalFrame {
    /// `rows[i][c]` is the value of the `c`-th materialized column for record
    /// `i`, in dataset order
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        self.records
    }

    /// Values of one column, `None` where the field is absent
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.records.iter().map(move |r| r.get(name))
    }

    /// True when at least one record carries the field (even as null)
    pub fn has_column(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.contains_key(name))
    }

    /// Apply a pure per-row function across `partitions` slices in parallel.
    ///
    /// Row order is preserved.
    pub fn map_partitions<F>(self, partitions: usize, f: F) -> Self
    where
        F: Fn(RawRecord) -> RawRecord + Send + Sync,
    {
        let partitions = partitions.max(1);
        let chunk = self.records.len().div_ceil(partitions).max(1);

        let mut records = self.records;
        let mut slices: Vec<Vec<RawRecord>> = Vec::with_capacity(partitions.min(records.len()));
        while !records.is_empty() {
            let rest = records.split_off(chunk.min(records.len()));
            slices.push(records);
            records = rest;
        }

        let records = slices
            .into_par_iter()
            .map(|slice| slice.into_iter().map(&f).collect::<Vec<_>>())
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        Self { records }
    }

    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&RawRecord) -> bool,
    {
        Self {
            records: self.records.into_iter().filter(|r| predicate(r)).collect(),
        }
    }

    /// Count rows matching a predicate
    pub fn count_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&RawRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).count()
    }

    /// Project the given columns into local memory, preserving row order
    pub fn materialize(&self, columns: &[String]) -> LocalFrame {
        let rows = self
            .records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        LocalFrame { rows }
    }
}

impl From<Vec<RawRecord>> for Dataset {
    fn from(records: Vec<RawRecord>) -> Self {
        Self::new(records)
    }
}
