//! CLI entry point for the road stability report job.
//!
//! Computes one report for a city and date from the normalized segment
//! aggregates and raw vehicle passes, then upserts it to the local store or
//! S3, or prints it with `--dry-run`.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use road_stability::config::{DEFAULT_LOOKBACK_DAYS, DEFAULT_TOP_N, ReportRequest};
use road_stability::output::{
    LocalReportSink, ReportSink, RunSummary, S3ReportSink, append_worst_segments,
    persist_report, print_pretty, to_json,
};
use road_stability::pipeline::generate_report_within;
use road_stability::store::{LocalStore, StoreLayout};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "road_stability")]
#[command(about = "Road-segment stability and repeatability report", long_about = None)]
struct Cli {
    /// City to report on (required)
    #[arg(long = "cityId", value_name = "CITY_ID")]
    city_id: Option<String>,

    /// Report date, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long)]
    date: Option<String>,

    /// Number of worst segments to list
    #[arg(long = "topN", default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Days of vehicle passes to use for repeatability
    #[arg(long = "lookbackDays", default_value_t = DEFAULT_LOOKBACK_DAYS)]
    lookback_days: u32,

    /// Compute and print the report without persisting it
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Root directory of the document store export
    #[arg(long, env = "STABILITY_DATA_DIR", default_value = "data")]
    data_dir: String,

    /// Optional JSON file overriding the store layout
    #[arg(long)]
    layout: Option<String>,

    /// Optional: S3 bucket to upsert the report to instead of the local store
    #[arg(long, env = "STABILITY_S3_BUCKET")]
    s3_bucket: Option<String>,

    /// Optional: CSV file to append the ranked worst segments to
    #[arg(long)]
    csv: Option<String>,

    /// Optional: fail the run if computing the report takes longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/road_stability.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("road_stability.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // usage errors exit 1 like every other failure; help and version exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            e.print()?;
            error!(kind = ?e.kind(), "Invalid command line");
            return Err(anyhow::anyhow!("invalid command line: {:?}", e.kind()));
        }
    };

    if let Err(e) = run(cli).await {
        error!(error = %e, "Unable to generate report");
        return Err(e);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let request = ReportRequest::new(
        cli.city_id.as_deref(),
        cli.date.as_deref(),
        cli.top_n,
        cli.lookback_days,
        Utc::now(),
    )?;

    let layout = match &cli.layout {
        Some(path) => StoreLayout::load(path)?,
        None => StoreLayout::default(),
    };

    info!(
        city_id = %request.city_id,
        date = %request.date,
        compare_date = %request.compare_date(),
        top_n = request.top_n,
        lookback_days = request.lookback_days,
        data_dir = %cli.data_dir,
        "Starting stability report"
    );

    let store = LocalStore::new(&cli.data_dir);
    let report = generate_report_within(
        &store,
        &layout,
        &request,
        cli.timeout_secs.map(Duration::from_secs),
    )
    .await?;
    print_pretty(&report);

    if let Some(csv_path) = &cli.csv {
        append_worst_segments(csv_path, &report)?;
    }

    let destination = if cli.dry_run {
        println!("{}", to_json(&report)?);
        "dry-run".to_string()
    } else {
        let sink: Box<dyn ReportSink> = match &cli.s3_bucket {
            Some(bucket) => {
                let config = aws_config::load_from_env().await;
                info!(bucket = %bucket, "S3 upload enabled");
                Box::new(S3ReportSink::new(aws_sdk_s3::Client::new(&config), bucket))
            }
            None => Box::new(LocalReportSink::new(&cli.data_dir)),
        };
        let path = layout.report_path_for(&request.city_id, request.date);
        persist_report(sink.as_ref(), &path, &report).await?
    };

    let summary = RunSummary::new(&report, &destination);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
