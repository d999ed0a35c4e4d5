use async_trait::async_trait;

use crate::domain::{DuplicatePair, QualityMetric};
use crate::pipeline::dataset::Dataset;

/// Where raw datasets come from (object store, local file, memory)
#[async_trait]
pub trait DatasetSourcePort: Send + Sync {
    async fn read_dataset(&self, location: &str) -> anyhow::Result<Dataset>;
}

/// Where normalized datasets and duplicate reports go.
///
/// Implementations must not leave partial output behind on failure.
#[async_trait]
pub trait DatasetSinkPort: Send + Sync {
    async fn write_dataset(&self, location: &str, dataset: &Dataset) -> anyhow::Result<()>;
    async fn write_duplicates(&self, location: &str, pairs: &[DuplicatePair]) -> anyhow::Result<()>;

    /// Remove previously written output. Missing output is not an error.
    async fn discard(&self, location: &str) -> anyhow::Result<()>;
}

/// External collector for quality metrics. Called synchronously and treated
/// as fire-and-forget by the monitor.
pub trait MetricsSinkPort: Send + Sync {
    fn emit(&self, metric: &QualityMetric) -> anyhow::Result<()>;

    fn name(&self) -> &str;
}
