use anyhow::anyhow;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::app::ports::MetricsSinkPort;
use crate::domain::QualityMetric;

/// Appends every quality metric as one NDJSON line
pub struct FileMetricsSink {
    file_writer: Mutex<BufWriter<std::fs::File>>,
}

impl FileMetricsSink {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        info!("Appending metric events to {}", path.display());

        let file_writer = BufWriter::new(OpenOptions::new().create(true).append(true).open(path)?);

        Ok(Self {
            file_writer: Mutex::new(file_writer),
        })
    }
}

impl MetricsSinkPort for FileMetricsSink {
    fn emit(&self, metric: &QualityMetric) -> anyhow::Result<()> {
        let json_line = serde_json::to_string(metric)?;

        let mut writer = self
            .file_writer
            .lock()
            .map_err(|_| anyhow!("metric event writer poisoned"))?;
        writeln!(writer, "{}", json_line)?;
        writer.flush()?;

        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
