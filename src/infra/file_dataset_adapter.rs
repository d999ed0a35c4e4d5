use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{DatasetSinkPort, DatasetSourcePort};
use crate::domain::{DuplicatePair, RawRecord};
use crate::error::{EtlError, Result};
use crate::pipeline::dataset::Dataset;

/// Local-file implementation of the dataset ports.
///
/// Reads NDJSON or a single JSON array; writes NDJSON. Writes go to a sibling
/// temp file that is renamed into place, so a failed run leaves no partial
/// output behind.
#[derive(Debug, Default, Clone)]
pub struct FileDatasetAdapter;

impl FileDatasetAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Parse file contents into records. Blank lines are ignored.
pub fn parse_records(content: &str) -> Result<Vec<RawRecord>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed)?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, v)| into_record(v, i + 1))
            .collect();
    }

    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| EtlError::InvalidRecord {
            line: idx + 1,
            message: e.to_string(),
        })?;
        records.push(into_record(value, idx + 1)?);
    }
    Ok(records)
}

fn into_record(value: Value, line: usize) -> Result<RawRecord> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(EtlError::InvalidRecord {
            line,
            message: format!("expected a JSON object, found {}", type_name(&other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render items as NDJSON
pub fn to_ndjson<T: Serialize>(items: impl IntoIterator<Item = T>) -> Result<String> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(&item)?);
        out.push('\n');
    }
    Ok(out)
}

async fn write_atomic(location: &str, content: String) -> anyhow::Result<()> {
    let path = Path::new(location);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let mut tmp = PathBuf::from(location);
    tmp.set_extension(format!("tmp-{}", uuid::Uuid::new_v4()));

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to write {}", tmp.display()));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to move output into place at {}", location));
    }
    Ok(())
}

#[async_trait]
impl DatasetSourcePort for FileDatasetAdapter {
    async fn read_dataset(&self, location: &str) -> anyhow::Result<Dataset> {
        let content = tokio::fs::read_to_string(location)
            .await
            .with_context(|| format!("Failed to read input {}", location))?;
        let records =
            parse_records(&content).with_context(|| format!("Failed to parse input {}", location))?;
        info!("Read {} records from {}", records.len(), location);
        Ok(Dataset::new(records))
    }
}

#[async_trait]
impl DatasetSinkPort for FileDatasetAdapter {
    async fn write_dataset(&self, location: &str, dataset: &Dataset) -> anyhow::Result<()> {
        let content = to_ndjson(dataset.records())?;
        write_atomic(location, content).await?;
        info!("Wrote {} records to {}", dataset.len(), location);
        Ok(())
    }

    async fn write_duplicates(&self, location: &str, pairs: &[DuplicatePair]) -> anyhow::Result<()> {
        let content = to_ndjson(pairs)?;
        write_atomic(location, content).await?;
        debug!("Wrote {} duplicate pairs to {}", pairs.len(), location);
        Ok(())
    }

    async fn discard(&self, location: &str) -> anyhow::Result<()> {
        match tokio::fs::remove_file(location).await {
            Ok(()) => {
                info!("Removed {}", location);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", location)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ndjson_and_arrays() {
        let ndjson = "{\"a\":1}\n\n{\"a\":2}\n";
        assert_eq!(parse_records(ndjson).unwrap().len(), 2);

        let array = "  [{\"a\":1},{\"a\":2},{\"a\":3}]";
        let records = parse_records(array).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["a"], json!(3));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = parse_records("{\"a\":1}\n{oops\n").unwrap_err();
        match err {
            EtlError::InvalidRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_object_rows_are_rejected() {
        assert!(matches!(
            parse_records("[1, 2]"),
            Err(EtlError::InvalidRecord { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/artists.ndjson");
        let location = out.to_str().unwrap();

        let adapter = FileDatasetAdapter::new();
        let ds = Dataset::new(vec![
            json!({"artist_id": "1", "name": "Heart"}).as_object().cloned().unwrap(),
        ]);
        adapter.write_dataset(location, &ds).await.unwrap();

        let back = adapter.read_dataset(location).await.unwrap();
        assert_eq!(back, ds);

        let leftovers: Vec<_> = std::fs::read_dir(out.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn discard_removes_output_and_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dupes.ndjson");
        let location = out.to_str().unwrap();

        let adapter = FileDatasetAdapter::new();
        adapter.write_duplicates(location, &[]).await.unwrap();
        assert!(out.exists());

        adapter.discard(location).await.unwrap();
        assert!(!out.exists());
        adapter.discard(location).await.unwrap();
    }

    #[tokio::test]
    async fn missing_input_is_an_error() {
        let adapter = FileDatasetAdapter::new();
        assert!(adapter.read_dataset("/nonexistent/input.ndjson").await.is_err());
    }
}
