//! One batch run of an entity's ETL stage: read, measure, normalize,
//! deduplicate, measure again, write.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::app::ports::{DatasetSinkPort, DatasetSourcePort};
use crate::config::Config;
use crate::domain::{AnomalyReport, DuplicatePair, EntityKind};
use crate::observability::metrics::MetricName;
use crate::pipeline::dataset::Dataset;
use crate::pipeline::processing::dedupe::{exclude_duplicates, find_duplicates};
use crate::pipeline::processing::normalize::{score_of, EntityNormalizer, NormalizeContext};
use crate::pipeline::processing::quality::QualityMonitor;

/// Everything a stage needs besides its ports. Passed explicitly; there is no
/// process-wide session.
#[derive(Clone)]
pub struct ExecutionContext {
    pub config: Arc<Config>,
    pub monitor: Arc<QualityMonitor>,
    pub as_of: NaiveDate,
    pub run_id: Uuid,
}

impl ExecutionContext {
    /// `as_of` falls back to the configured reference date, then to today (UTC)
    pub fn new(config: Config, monitor: QualityMonitor, as_of: Option<NaiveDate>) -> Result<Self> {
        let as_of = match as_of {
            Some(d) => d,
            None => config
                .as_of()
                .context("Invalid run.as_of in configuration")?
                .unwrap_or_else(|| Utc::now().date_naive()),
        };

        Ok(Self {
            config: Arc::new(config),
            monitor: Arc::new(monitor),
            as_of,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn normalize_context(&self) -> NormalizeContext {
        NormalizeContext {
            as_of: self.as_of,
            dates: self.config.dates,
        }
    }
}

/// Input and output locations for one stage run
#[derive(Debug, Clone)]
pub struct StageJob {
    pub input: String,
    pub output: String,
    pub duplicates_report: Option<String>,
}

impl StageJob {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            duplicates_report: None,
        }
    }

    pub fn with_duplicates_report(mut self, location: impl Into<String>) -> Self {
        self.duplicates_report = Some(location.into());
        self
    }
}

/// What a stage run measured
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub kind: EntityKind,
    pub run_id: Uuid,
    pub records_read: usize,
    pub records_written: usize,
    pub completeness_score: f64,
    pub high_quality_percentage: f64,
    pub average_quality_score: f64,
    pub duplicates: Vec<DuplicatePair>,
    pub uniqueness_score: Option<f64>,
    pub anomalies: AnomalyReport,
    pub duration_secs: f64,
}

pub struct PipelineStage {
    ctx: ExecutionContext,
    source: Box<dyn DatasetSourcePort>,
    sink: Box<dyn DatasetSinkPort>,
}

impl PipelineStage {
    pub fn new(
        ctx: ExecutionContext,
        source: Box<dyn DatasetSourcePort>,
        sink: Box<dyn DatasetSinkPort>,
    ) -> Self {
        Self { ctx, source, sink }
    }

    pub async fn run(&self, normalizer: &dyn EntityNormalizer, job: &StageJob) -> Result<StageSummary> {
        let span = info_span!("stage", entity = %normalizer.kind(), run_id = %self.ctx.run_id);
        self.run_inner(normalizer, job).instrument(span).await
    }

    async fn run_inner(&self, normalizer: &dyn EntityNormalizer, job: &StageJob) -> Result<StageSummary> {
        let started = Instant::now();
        let kind = normalizer.kind();
        let monitor = &self.ctx.monitor;

        info!(input = %job.input, "Starting stage");

        let raw = self
            .source
            .read_dataset(&job.input)
            .await
            .with_context(|| format!("Failed to read {} dataset from {}", kind, job.input))?;
        let records_read = raw.len();
        monitor.track(MetricName::RecordsRead, records_read as f64, kind);

        let completeness = monitor.completeness_score(&raw, normalizer.required_columns());
        monitor.track(MetricName::CompletenessScore, completeness, kind);

        let normalized = normalizer.normalize(
            raw,
            self.ctx.config.run.partitions,
            &self.ctx.normalize_context(),
        );
        let high_quality = normalizer.high_quality_percentage(&normalized);
        let average_score = average_quality_score(&normalized);
        monitor.track(MetricName::HighQualityPercentage, high_quality, kind);
        monitor.track(MetricName::AverageQualityScore, average_score, kind);

        let (output, duplicates, uniqueness) = match normalizer.dedupe() {
            Some(dedupe) => {
                let id_column = normalizer.id_column();
                let pairs = find_duplicates(&normalized, &dedupe.match_columns, id_column, dedupe.threshold)
                    .map_err(|e| {
                        error!(entity = %kind, error = %e, "Duplicate detection failed");
                        e
                    })
                    .with_context(|| format!("Duplicate detection failed for {}", kind))?;
                let output = exclude_duplicates(normalized, &pairs, id_column);
                let uniqueness = monitor.uniqueness_score(&output, id_column);
                monitor.track(MetricName::DuplicatesFound, pairs.len() as f64, kind);
                monitor.track(MetricName::UniquenessScore, uniqueness, kind);
                (output, pairs, Some(uniqueness))
            }
            None => (normalized, Vec::new(), None),
        };

        let anomalies = monitor.detect_anomalies(&output, normalizer.numeric_columns());
        monitor.report_anomalies(&anomalies, kind);

        // The dataset is committed last so a failed run leaves nothing behind
        let report = job.duplicates_report.as_deref().filter(|_| !duplicates.is_empty());
        if let Some(location) = report {
            self.sink
                .write_duplicates(location, &duplicates)
                .await
                .with_context(|| format!("Failed to write duplicates report to {}", location))?;
        }

        if let Err(e) = self.sink.write_dataset(&job.output, &output).await {
            error!(entity = %kind, error = %e, "Failed to write dataset");
            if let Some(location) = report {
                if let Err(discard_err) = self.sink.discard(location).await {
                    warn!(location, error = %discard_err, "Failed to remove duplicates report");
                }
            }
            return Err(e).with_context(|| format!("Failed to write {} dataset to {}", kind, job.output));
        }

        let records_written = output.len();
        let duration = started.elapsed().as_secs_f64();
        monitor.track(MetricName::RecordsWritten, records_written as f64, kind);
        monitor.track(MetricName::StageDuration, duration, kind);

        info!(
            records_read,
            records_written,
            duplicates = duplicates.len(),
            completeness,
            high_quality,
            duration_secs = duration,
            "Stage finished"
        );

        Ok(StageSummary {
            kind,
            run_id: self.ctx.run_id,
            records_read,
            records_written,
            completeness_score: completeness,
            high_quality_percentage: high_quality,
            average_quality_score: average_score,
            duplicates,
            uniqueness_score: uniqueness,
            anomalies,
            duration_secs: duration,
        })
    }
}

/// Mean `quality_score` over the dataset, 0.0 when empty
pub fn average_quality_score(dataset: &Dataset) -> f64 {
    if dataset.is_empty() {
        return 0.0;
    }
    let total: u64 = dataset.records().iter().map(|r| u64::from(score_of(r))).sum();
    total as f64 / dataset.len() as f64
}
