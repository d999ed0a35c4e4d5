//! Metric names and the process-wide Prometheus recorder.
//!
//! Names here are bare; sinks prefix them with the run's namespace.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::domain::MetricUnit;

/// Every quality metric a pipeline stage emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RecordsRead,
    RecordsWritten,
    CompletenessScore,
    HighQualityPercentage,
    AverageQualityScore,
    DuplicatesFound,
    UniquenessScore,
    OutlierCount,
    StageDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsRead => "records_read",
            MetricName::RecordsWritten => "records_written",
            MetricName::CompletenessScore => "completeness_score",
            MetricName::HighQualityPercentage => "high_quality_percentage",
            MetricName::AverageQualityScore => "average_quality_score",
            MetricName::DuplicatesFound => "duplicates_found",
            MetricName::UniquenessScore => "uniqueness_score",
            MetricName::OutlierCount => "outlier_count",
            MetricName::StageDuration => "stage_duration",
        }
    }

    pub fn unit(&self) -> MetricUnit {
        match self {
            MetricName::RecordsRead
            | MetricName::RecordsWritten
            | MetricName::DuplicatesFound
            | MetricName::OutlierCount => MetricUnit::Count,
            MetricName::CompletenessScore
            | MetricName::HighQualityPercentage
            | MetricName::UniquenessScore => MetricUnit::Percent,
            MetricName::AverageQualityScore => MetricUnit::None,
            MetricName::StageDuration => MetricUnit::Seconds,
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RecordsRead,
            RecordsWritten,
            CompletenessScore,
            HighQualityPercentage,
            AverageQualityScore,
            DuplicatesFound,
            UniquenessScore,
            OutlierCount,
            StageDuration,
        ]
        .into_iter()
    }
}

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Idempotent.
///
/// No scrape listener is started: a stage run exits long before a scraper
/// would see it, so the snapshot leaves the process through the Pushgateway.
pub fn init() {
    if HANDLE.get().is_some() {
        return;
    }

    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Prometheus handle already set");
            }
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Current Prometheus text exposition, empty when no recorder is installed
pub fn render() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

/// Push the current snapshot to a Prometheus Pushgateway.
///
/// Failures are logged and swallowed; a run never fails because the gateway
/// is down.
pub async fn push_to_pushgateway(pushgateway_url: &str, job: &str, instance: &str) {
    let body = render();
    if body.is_empty() {
        warn!("No metrics recorded, skipping Pushgateway push");
        return;
    }

    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        pushgateway_url.trim_end_matches('/'),
        job,
        instance
    );

    let client = reqwest::Client::new();
    match client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            info!("Pushed metrics to Pushgateway for instance={}", instance);
        }
        Ok(resp) => {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!("Pushgateway returned status {}: {}", status, text);
        }
        Err(e) => warn!("Failed to push metrics to {}: {}", push_url, e),
    }
}
