//! Dataset-level quality statistics and metric emission.

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::app::ports::MetricsSinkPort;
use crate::domain::{AnomalyReport, ColumnAnomaly, EntityKind, MetricUnit, QualityMetric};
use crate::observability::metrics::MetricName;
use crate::pipeline::dataset::Dataset;
use crate::pipeline::processing::normalize::is_present;

/// Number of standard deviations past which a value is an outlier
pub const OUTLIER_SIGMAS: f64 = 3.0;

/// Lower bound on the reference standard deviation, relative to the reference mean
pub const STDDEV_FLOOR_RATIO: f64 = 0.01;

/// Dimension key every metric carries to identify the entity type
pub const DATA_TYPE_DIMENSION: &str = "DataType";

/// Collects quality metrics for a run and forwards them to external sinks.
///
/// Forwarding is fire-and-forget: a failing sink is logged and skipped.
pub struct QualityMonitor {
    namespace: String,
    sinks: Vec<Arc<dyn MetricsSinkPort>>,
    history: Mutex<Vec<QualityMetric>>,
}

impl QualityMonitor {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            sinks: Vec::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSinkPort>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Record a metric and forward it to every sink
    pub fn track_metric(&self, name: &str, value: f64, unit: MetricUnit, dimensions: &[(&str, &str)]) {
        let metric = QualityMetric {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            value,
            unit,
            dimensions: dimensions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timestamp: Utc::now(),
        };

        debug!(metric = name, value, "Tracking quality metric");

        for sink in &self.sinks {
            if let Err(e) = sink.emit(&metric) {
                warn!(sink = sink.name(), metric = name, error = %e, "Failed to forward metric");
            }
        }

        if let Ok(mut history) = self.history.lock() {
            history.push(metric);
        }
    }

    /// Shorthand for metrics tagged only with the `DataType` dimension
    pub fn track(&self, name: MetricName, value: f64, kind: EntityKind) {
        self.track_metric(
            name.as_str(),
            value,
            name.unit(),
            &[(DATA_TYPE_DIMENSION, kind.as_str())],
        );
    }

    /// Every metric tracked so far, in emission order
    pub fn metrics(&self) -> Vec<QualityMetric> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Average share of rows, across `required_columns`, where the column is
    /// present and non-blank, as a percentage. 0.0 for an empty dataset.
    pub fn completeness_score(&self, dataset: &Dataset, required_columns: &[&str]) -> f64 {
        if dataset.is_empty() || required_columns.is_empty() {
            return 0.0;
        }
        let rows = dataset.len() as f64;
        let total: f64 = required_columns
            .iter()
            .map(|col| dataset.count_where(|r| is_present(r, col)) as f64 / rows)
            .sum();
        total / required_columns.len() as f64 * 100.0
    }

    /// Distinct key values over row count, as a percentage. Null counts as
    /// one distinct value. 100.0 for an empty dataset.
    pub fn uniqueness_score(&self, dataset: &Dataset, key_column: &str) -> f64 {
        if dataset.is_empty() {
            return 100.0;
        }
        let distinct: HashSet<String> = dataset
            .column(key_column)
            .map(|v| v.unwrap_or(&Value::Null).to_string())
            .collect();
        distinct.len() as f64 / dataset.len() as f64 * 100.0
    }

    /// Outlier statistics for each numeric column with at least two values.
    ///
    /// A value is an outlier when it lies more than three standard deviations
    /// from the mean of the other values in its column. With only two values
    /// in a column the full-column statistics are used instead. The reference
    /// standard deviation is never taken below 1% of the reference mean.
    pub fn detect_anomalies(&self, dataset: &Dataset, numeric_columns: &[&str]) -> AnomalyReport {
        let mut report = BTreeMap::new();

        for column in numeric_columns {
            let values: Vec<f64> = dataset.column(column).filter_map(numeric).collect();
            if values.len() < 2 {
                debug!(column, values = values.len(), "Skipping anomaly detection");
                continue;
            }

            let stats = ColumnStats::from_values(&values);
            let outlier_count = values.iter().filter(|v| stats.is_outlier(**v)).count();

            report.insert(
                column.to_string(),
                ColumnAnomaly {
                    outlier_count,
                    outlier_percentage: outlier_count as f64 / dataset.len() as f64 * 100.0,
                    mean: stats.mean,
                    stddev: stats.stddev,
                    min: stats.min,
                    max: stats.max,
                },
            );
        }

        report
    }

    /// Emit the outlier count of every reported column
    pub fn report_anomalies(&self, report: &AnomalyReport, kind: EntityKind) {
        for (column, anomaly) in report {
            if anomaly.outlier_count > 0 {
                warn!(
                    column = %column,
                    outliers = anomaly.outlier_count,
                    mean = anomaly.mean,
                    stddev = anomaly.stddev,
                    "Outliers detected"
                );
            }
            self.track_metric(
                MetricName::OutlierCount.as_str(),
                anomaly.outlier_count as f64,
                MetricName::OutlierCount.unit(),
                &[(DATA_TYPE_DIMENSION, kind.as_str()), ("Column", column.as_str())],
            );
        }
    }
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Full-column statistics, enough to derive leave-one-out statistics
struct ColumnStats {
    count: f64,
    mean: f64,
    /// Sum of squared deviations from `mean`
    m2: f64,
    stddev: f64,
    min: f64,
    max: f64,
}

impl ColumnStats {
    fn from_values(values: &[f64]) -> Self {
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let m2: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

        Self {
            count,
            mean,
            m2,
            stddev: (m2 / (count - 1.0)).sqrt(),
            min,
            max,
        }
    }

    /// Mean and sample standard deviation of the column with `value` removed,
    /// or of the whole column when fewer than two values would remain.
    ///
    /// Removal is a Welford downdate on deviations from the full mean, so the
    /// result stays exact for values far from zero.
    fn reference_for(&self, value: f64) -> (f64, f64) {
        let rest = self.count - 1.0;
        if rest < 2.0 {
            return (self.mean, self.stddev);
        }
        let delta = value - self.mean;
        let mean = self.mean - delta / rest;
        let m2 = (self.m2 - delta * delta * self.count / rest).max(0.0);
        (mean, (m2 / (rest - 1.0)).sqrt())
    }

    fn is_outlier(&self, value: f64) -> bool {
        let (mean, stddev) = self.reference_for(value);
        // Near-constant reference values would otherwise flag any deviation
        let floor = STDDEV_FLOOR_RATIO * mean.abs();
        let tolerance = 1e-9 * mean.abs().max(1.0);
        (value - mean).abs() > OUTLIER_SIGMAS * stddev.max(floor) + tolerance
    }
}
