// Infrastructure adapters implementing the application ports

pub mod file_dataset_adapter;
pub mod file_metrics_adapter;
pub mod in_memory_adapter;
pub mod prometheus_metrics_adapter;

pub use file_dataset_adapter::FileDatasetAdapter;
pub use file_metrics_adapter::FileMetricsSink;
pub use in_memory_adapter::{InMemoryDatasetStore, InMemoryMetricsSink};
pub use prometheus_metrics_adapter::PrometheusMetricsSink;
