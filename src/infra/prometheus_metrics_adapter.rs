use metrics::Label;

use crate::app::ports::MetricsSinkPort;
use crate::domain::QualityMetric;

/// Records each quality metric as a Prometheus gauge named
/// `<namespace>_<metric>` with the metric dimensions as labels
#[derive(Debug, Default, Clone)]
pub struct PrometheusMetricsSink;

impl PrometheusMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

/// Prometheus metric and label names allow `[a-zA-Z0-9_]` only
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

pub fn gauge_name(metric: &QualityMetric) -> String {
    sanitize(&format!("{}_{}", metric.namespace, metric.name))
}

impl MetricsSinkPort for PrometheusMetricsSink {
    fn emit(&self, metric: &QualityMetric) -> anyhow::Result<()> {
        let labels: Vec<Label> = metric
            .dimensions
            .iter()
            .map(|(k, v)| Label::new(sanitize(k), v.clone()))
            .collect();
        metrics::gauge!(gauge_name(metric), labels).set(metric.value);
        Ok(())
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}
