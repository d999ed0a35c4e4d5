use anyhow::Result;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use sms_etl::config::Config;
use sms_etl::domain::{DuplicatePair, EntityKind, QualityMetric};
use sms_etl::infra::{FileDatasetAdapter, FileMetricsSink, InMemoryMetricsSink};
use sms_etl::pipeline::processing::normalize::normalizer_for;
use sms_etl::pipeline::processing::quality::QualityMonitor;
use sms_etl::pipeline::{ExecutionContext, PipelineStage, StageJob, StageSummary};

fn write_ndjson(path: &Path, rows: &[Value]) -> Result<()> {
    let content: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
    std::fs::write(path, content.join("\n"))?;
    Ok(())
}

fn read_ndjson(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}

async fn run_stage(
    kind: EntityKind,
    monitor: QualityMonitor,
    job: &StageJob,
) -> Result<StageSummary> {
    let config = Config::default();
    let normalizer = normalizer_for(kind, &config);
    let ctx = ExecutionContext::new(config, monitor, NaiveDate::from_ymd_opt(2024, 6, 1))?;
    let stage = PipelineStage::new(
        ctx,
        Box::new(FileDatasetAdapter::new()),
        Box::new(FileDatasetAdapter::new()),
    );
    stage.run(normalizer.as_ref(), job).await
}

#[tokio::test]
async fn test_artist_stage_end_to_end() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("artists.ndjson");
    let output = temp_dir.path().join("out/artists.ndjson");
    let dupes = temp_dir.path().join("out/artist_duplicates.ndjson");

    write_ndjson(
        &input,
        &[
            json!({"artist_id": 1, "name": "Beatles", "genre": "british rock", "popularity": 95, "formed_date": "1990-08-01"}),
            json!({"artist_id": 2, "name": "The Beatles", "genre": "Rock", "popularity": "88"}),
            json!({"artist_id": 3, "name": "Rolling Stones", "genre": "rock", "popularity": 90}),
        ],
    )?;

    let sink = Arc::new(InMemoryMetricsSink::new());
    let monitor = QualityMonitor::new("sms_etl").with_sink(sink.clone());
    let job = StageJob::new(input.to_str().unwrap(), output.to_str().unwrap())
        .with_duplicates_report(dupes.to_str().unwrap());

    let summary = run_stage(EntityKind::Artists, monitor, &job).await?;

    assert_eq!(
        summary.duplicates,
        vec![DuplicatePair {
            duplicate_id: "2".to_string(),
            master_id: "1".to_string(),
            similarity_score: 1.0,
            matched_columns: vec!["name_normalized".to_string()],
        }]
    );

    let rows = read_ndjson(&output)?;
    let ids: Vec<&Value> = rows.iter().map(|r| &r["artist_id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!(3)]);
    assert_eq!(rows[0]["genre"], json!("Rock"));
    assert_eq!(rows[0]["quality_score"], json!(100));
    assert_eq!(rows[1]["name_normalized"], json!("rolling stones"));

    let report: Vec<DuplicatePair> = read_ndjson(&dupes)?
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(report, summary.duplicates);

    assert_eq!(sink.latest("records_read", "Artists"), Some(3.0));
    assert_eq!(sink.latest("records_written", "Artists"), Some(2.0));
    assert_eq!(sink.latest("uniqueness_score", "Artists"), Some(100.0));

    Ok(())
}

#[tokio::test]
async fn test_venue_stage_matches_abbreviated_names() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("venues.json");
    let output = temp_dir.path().join("venues.ndjson");
    let dupes = temp_dir.path().join("venue_duplicates.ndjson");

    let venues = json!([
        {"venue_id": "v1", "name": "Madison Square Garden", "city": "New York", "address": "4 Pennsylvania Plaza",
         "capacity": 20789, "venue_type": "arena", "latitude": 40.7505, "longitude": -73.9934},
        {"venue_id": "v2", "name": "MSG Madison Sq Garden", "city": "New York", "address": "4 Penn Plaza",
         "capacity": "20000", "venue_type": "Arena"},
        {"venue_id": "v3", "name": "The Showbox", "city": "Seattle", "address": "1426 1st Ave",
         "capacity": 1100, "venue_type": "music hall"}
    ]);
    std::fs::write(&input, venues.to_string())?;

    let job = StageJob::new(input.to_str().unwrap(), output.to_str().unwrap())
        .with_duplicates_report(dupes.to_str().unwrap());
    let summary = run_stage(EntityKind::Venues, QualityMonitor::new("sms_etl"), &job).await?;

    assert_eq!(summary.duplicates.len(), 1);
    assert_eq!(summary.duplicates[0].duplicate_id, "v2");
    assert_eq!(summary.duplicates[0].master_id, "v1");
    assert!(summary.duplicates[0].similarity_score >= 0.80);
    assert_eq!(
        summary.duplicates[0].matched_columns,
        vec!["name_normalized".to_string(), "address_normalized".to_string()]
    );

    let rows = read_ndjson(&output)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["venue_type"], json!("Hall"));
    assert!(dupes.exists());

    Ok(())
}

#[tokio::test]
async fn test_concert_stage_reports_outliers() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("concerts.ndjson");
    let output = temp_dir.path().join("concerts_out.ndjson");
    let dupes = temp_dir.path().join("concert_duplicates.ndjson");
    let events = temp_dir.path().join("metrics/events.ndjson");

    let rows: Vec<Value> = [10, 10, 10, 10, 1000]
        .iter()
        .enumerate()
        .map(|(i, attendance)| {
            json!({
                "concert_id": format!("c{}", i),
                "title": format!("Night {}", i + 1),
                "artist_id": "a1",
                "venue_id": "v1",
                "event_date": "2024-05-01",
                "attendance": attendance,
                "ticket_price": 25
            })
        })
        .collect();
    write_ndjson(&input, &rows)?;

    let monitor = QualityMonitor::new("sms_etl").with_sink(Arc::new(FileMetricsSink::new(&events)?));
    let job = StageJob::new(input.to_str().unwrap(), output.to_str().unwrap())
        .with_duplicates_report(dupes.to_str().unwrap());
    let summary = run_stage(EntityKind::Concerts, monitor, &job).await?;

    assert_eq!(summary.records_written, 5);
    assert_eq!(summary.anomalies["attendance"].outlier_count, 1);
    assert_eq!(summary.anomalies["attendance"].outlier_percentage, 20.0);
    assert_eq!(summary.anomalies["ticket_price"].outlier_count, 0);
    assert_eq!(summary.high_quality_percentage, 100.0);
    // Concerts are never deduplicated, so no report is written
    assert!(!dupes.exists());

    let metrics: Vec<QualityMetric> = read_ndjson(&events)?
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<_, _>>()?;
    assert!(!metrics.is_empty());
    assert!(metrics
        .iter()
        .all(|m| m.namespace == "sms_etl" && m.dimensions["DataType"] == "Concerts"));
    assert!(metrics
        .iter()
        .any(|m| m.name == "outlier_count" && m.dimensions.get("Column").map(String::as_str) == Some("attendance")));

    Ok(())
}

#[tokio::test]
async fn test_empty_input_produces_empty_output() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("empty.ndjson");
    let output = temp_dir.path().join("empty_out.ndjson");
    let dupes = temp_dir.path().join("empty_dupes.ndjson");
    std::fs::write(&input, "")?;

    let sink = Arc::new(InMemoryMetricsSink::new());
    let monitor = QualityMonitor::new("sms_etl").with_sink(sink.clone());
    let job = StageJob::new(input.to_str().unwrap(), output.to_str().unwrap())
        .with_duplicates_report(dupes.to_str().unwrap());
    let summary = run_stage(EntityKind::Artists, monitor, &job).await?;

    assert_eq!(summary.records_written, 0);
    assert_eq!(summary.completeness_score, 0.0);
    assert_eq!(summary.uniqueness_score, Some(100.0));
    assert!(summary.anomalies.is_empty());
    assert!(output.exists());
    assert!(!dupes.exists());
    assert_eq!(sink.latest("completeness_score", "Artists"), Some(0.0));

    Ok(())
}

#[tokio::test]
async fn test_malformed_input_leaves_no_output() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("bad.ndjson");
    let output = temp_dir.path().join("bad_out.ndjson");
    std::fs::write(&input, "{\"artist_id\": 1, \"name\": \"Heart\"}\nnot json\n")?;

    let job = StageJob::new(input.to_str().unwrap(), output.to_str().unwrap());
    let result = run_stage(EntityKind::Artists, QualityMonitor::new("sms_etl"), &job).await;

    let err = result.expect_err("malformed input must fail the stage");
    assert!(format!("{:#}", err).contains("line 2"));
    assert!(!output.exists());

    Ok(())
}
