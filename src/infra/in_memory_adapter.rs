use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::app::ports::{DatasetSinkPort, DatasetSourcePort, MetricsSinkPort};
use crate::domain::{DuplicatePair, QualityMetric};
use crate::pipeline::dataset::Dataset;

/// In-memory dataset store for development and testing
#[derive(Default, Clone)]
pub struct InMemoryDatasetStore {
    datasets: Arc<Mutex<HashMap<String, Dataset>>>,
    duplicates: Arc<Mutex<HashMap<String, Vec<DuplicatePair>>>>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &str, dataset: Dataset) {
        if let Ok(mut datasets) = self.datasets.lock() {
            datasets.insert(location.to_string(), dataset);
        }
    }

    pub fn dataset(&self, location: &str) -> Option<Dataset> {
        self.datasets.lock().ok()?.get(location).cloned()
    }

    pub fn duplicates(&self, location: &str) -> Option<Vec<DuplicatePair>> {
        self.duplicates.lock().ok()?.get(location).cloned()
    }
}

#[async_trait]
impl DatasetSourcePort for InMemoryDatasetStore {
    async fn read_dataset(&self, location: &str) -> anyhow::Result<Dataset> {
        self.dataset(location)
            .ok_or_else(|| anyhow!("no dataset at {}", location))
    }
}

#[async_trait]
impl DatasetSinkPort for InMemoryDatasetStore {
    async fn write_dataset(&self, location: &str, dataset: &Dataset) -> anyhow::Result<()> {
        debug!("Storing {} records at {}", dataset.len(), location);
        self.insert(location, dataset.clone());
        Ok(())
    }

    async fn write_duplicates(&self, location: &str, pairs: &[DuplicatePair]) -> anyhow::Result<()> {
        let mut duplicates = self
            .duplicates
            .lock()
            .map_err(|_| anyhow!("duplicate store poisoned"))?;
        duplicates.insert(location.to_string(), pairs.to_vec());
        Ok(())
    }

    async fn discard(&self, location: &str) -> anyhow::Result<()> {
        self.datasets
            .lock()
            .map_err(|_| anyhow!("dataset store poisoned"))?
            .remove(location);
        self.duplicates
            .lock()
            .map_err(|_| anyhow!("duplicate store poisoned"))?
            .remove(location);
        Ok(())
    }
}

/// Metrics sink that keeps every metric it receives
#[derive(Default)]
pub struct InMemoryMetricsSink {
    metrics: Mutex<Vec<QualityMetric>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> Vec<QualityMetric> {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Value of the last metric with this name and `DataType`
    pub fn latest(&self, name: &str, data_type: &str) -> Option<f64> {
        self.metrics()
            .iter()
            .rev()
            .find(|m| {
                m.name == name && m.dimensions.get("DataType").map(String::as_str) == Some(data_type)
            })
            .map(|m| m.value)
    }
}

impl MetricsSinkPort for InMemoryMetricsSink {
    fn emit(&self, metric: &QualityMetric) -> anyhow::Result<()> {
        self.metrics
            .lock()
            .map_err(|_| anyhow!("metric buffer poisoned"))?
            .push(metric.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
