use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use sms_etl::config::Config;
use sms_etl::domain::EntityKind;
use sms_etl::infra::{FileDatasetAdapter, FileMetricsSink, PrometheusMetricsSink};
use sms_etl::observability;
use sms_etl::pipeline::processing::normalize::normalizer_for;
use sms_etl::pipeline::processing::quality::QualityMonitor;
use sms_etl::pipeline::{ExecutionContext, PipelineStage, StageJob, StageSummary};

#[derive(Parser)]
#[command(name = "sms_etl")]
#[command(about = "Seattle Music Scene data quality and deduplication ETL")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file (defaults to $SMS_ETL_CONFIG, then ./etl.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference date for date plausibility checks (YYYY-MM-DD)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct JobArgs {
    /// Raw dataset, NDJSON or a JSON array
    #[arg(long)]
    input: String,
    /// Where to write the normalized NDJSON dataset
    #[arg(long)]
    output: String,
    /// Where to write the duplicate pairs, if any are found
    #[arg(long)]
    duplicates: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and deduplicate artists
    Artists(JobArgs),
    /// Normalize and deduplicate venues
    Venues(JobArgs),
    /// Normalize concerts
    Concerts(JobArgs),
}

impl Commands {
    fn into_parts(self) -> (EntityKind, StageJob) {
        let (kind, args) = match self {
            Commands::Artists(args) => (EntityKind::Artists, args),
            Commands::Venues(args) => (EntityKind::Venues, args),
            Commands::Concerts(args) => (EntityKind::Concerts, args),
        };
        let mut job = StageJob::new(args.input, args.output);
        job.duplicates_report = args.duplicates;
        (kind, job)
    }
}

fn build_monitor(config: &Config) -> Result<QualityMonitor> {
    let mut monitor = QualityMonitor::new(config.run.namespace.clone());

    if config.metrics.prometheus {
        observability::metrics::init();
        monitor = monitor.with_sink(Arc::new(PrometheusMetricsSink::new()));
    }
    if let Some(path) = &config.metrics.events_path {
        let sink = FileMetricsSink::new(path)
            .with_context(|| format!("Failed to open metric event file {}", path.display()))?;
        monitor = monitor.with_sink(Arc::new(sink));
    }

    Ok(monitor)
}

fn print_summary(summary: &StageSummary) {
    println!("\n📊 {} stage results (run {}):", summary.kind, summary.run_id);
    println!("   Records read: {}", summary.records_read);
    println!("   Records written: {}", summary.records_written);
    println!("   Completeness: {:.1}%", summary.completeness_score);
    println!("   High quality: {:.1}%", summary.high_quality_percentage);
    println!("   Average quality score: {:.1}", summary.average_quality_score);
    if let Some(uniqueness) = summary.uniqueness_score {
        println!("   Duplicates removed: {}", summary.duplicates.len());
        println!("   Uniqueness: {:.1}%", uniqueness);
    }
    for (column, anomaly) in &summary.anomalies {
        if anomaly.outlier_count > 0 {
            println!(
                "   ⚠️  {} outliers in {} ({:.1}%)",
                anomaly.outlier_count, column, anomaly.outlier_percentage
            );
        }
    }
    println!("   Duration: {:.2}s", summary.duration_secs);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    observability::init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let pushgateway_url = config
        .metrics
        .pushgateway_url
        .clone()
        .or_else(|| std::env::var("SMS_PUSHGATEWAY_URL").ok());

    let (kind, job) = cli.command.into_parts();
    let normalizer = normalizer_for(kind, &config);
    let monitor = build_monitor(&config)?;
    let ctx = ExecutionContext::new(config, monitor, cli.as_of)?;
    let run_id = ctx.run_id;

    info!(entity = %kind, run_id = %run_id, as_of = %ctx.as_of, "Running ETL stage");

    let stage = PipelineStage::new(
        ctx,
        Box::new(FileDatasetAdapter::new()),
        Box::new(FileDatasetAdapter::new()),
    );
    let result = stage.run(normalizer.as_ref(), &job).await;

    if let Some(url) = pushgateway_url {
        let instance = format!("{}-{}", kind.as_str().to_lowercase(), run_id);
        observability::metrics::push_to_pushgateway(&url, "sms_etl", &instance).await;
    }

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            error!("{} stage failed: {:#}", kind, e);
            Err(e)
        }
    }
}
