//! Output formatting and persistence for stability reports.
//!
//! Supports pretty-printing, a one-line run summary, CSV export of the
//! ranked segments, and merge-upserting the report document to a sink.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::StabilityError;
use crate::model::StabilityReport;

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &StabilityReport) {
    debug!("{:#?}", report);
}

/// Pretty-printed JSON for a report.
pub fn to_json(report: &StabilityReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Headline numbers printed after every successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub city_id: String,
    pub date: String,
    pub segments_today: usize,
    pub segments_compare: usize,
    pub overlap: usize,
    pub median_delta: Option<f64>,
    pub improved: usize,
    pub worsened: usize,
    pub grades_changed: usize,
    pub repeatability_segments: usize,
    pub repeatability_mean: Option<f64>,
    pub worst_listed: usize,
    pub destination: String,
}

impl RunSummary {
    pub fn new(report: &StabilityReport, destination: &str) -> Self {
        let wow = &report.stats.week_over_week;
        RunSummary {
            city_id: report.city_id.clone(),
            date: report.date.to_string(),
            segments_today: report.stats.total_segments_today,
            segments_compare: report.stats.total_segments_compare,
            overlap: report.stats.overlap_segments,
            median_delta: wow.median_delta,
            improved: wow.improved_count,
            worsened: wow.worsened_count,
            grades_changed: report.stats.grade_changes.changed,
            repeatability_segments: report.stats.repeatability.segment_count,
            repeatability_mean: report.stats.repeatability.mean,
            worst_listed: report.worst_segments.len(),
            destination: destination.to_string(),
        }
    }
}

#[derive(Serialize)]
struct WorstSegmentRow<'a> {
    city_id: &'a str,
    date: String,
    rank: usize,
    h3: &'a str,
    normalized_median: f64,
    grade_all: Option<&'a str>,
    grade_within_type: Option<&'a str>,
    road_type: Option<&'a str>,
    road_name: Option<&'a str>,
    week_over_week_delta: Option<f64>,
    grade_changed: Option<bool>,
}

/// Appends the ranked worst segments to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_worst_segments(path: &str, report: &StabilityReport) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = report.worst_segments.len(), "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    let date = report.date.to_string();
    for seg in &report.worst_segments {
        writer.serialize(WorstSegmentRow {
            city_id: &report.city_id,
            date: date.clone(),
            rank: seg.rank,
            h3: &seg.h3,
            normalized_median: seg.normalized_median,
            grade_all: seg.grade_all.as_deref(),
            grade_within_type: seg.grade_within_type.as_deref(),
            road_type: seg.road_type.as_deref(),
            road_name: seg.road_name.as_deref(),
            week_over_week_delta: seg.week_over_week_delta,
            grade_changed: seg.grade_changed,
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Recursively merges `patch` into `base`. Objects merge key by key; any
/// other value in `patch` replaces what was there.
pub fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Destination for report documents. Writes merge into whatever is stored
/// at the path, so re-running a report overwrites it in place.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    /// Merge-upserts `document` at `path`; returns where it was written.
    async fn upsert(&self, path: &str, document: Value) -> Result<String>;
}

/// Writes reports as `<root>/<path>.json`.
pub struct LocalReportSink {
    root: PathBuf,
}

impl LocalReportSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl ReportSink for LocalReportSink {
    async fn upsert(&self, path: &str, document: Value) -> Result<String> {
        let file = self.root.join(format!("{path}.json"));
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut merged = if file.exists() {
            serde_json::from_str(&std::fs::read_to_string(&file)?)?
        } else {
            Value::Object(Default::default())
        };
        merge_json(&mut merged, document);

        std::fs::write(&file, serde_json::to_vec_pretty(&merged)?)?;
        Ok(file.display().to_string())
    }
}

/// Writes reports to S3 as `<path>.json` with `application/json` content type.
pub struct S3ReportSink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ReportSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    async fn read_existing(&self, key: &str) -> Result<Value> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(Value::Object(Default::default()));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = resp.body.collect().await?.into_bytes();
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait::async_trait]
impl ReportSink for S3ReportSink {
    async fn upsert(&self, path: &str, document: Value) -> Result<String> {
        let key = format!("{path}.json");

        let mut merged = self.read_existing(&key).await?;
        merge_json(&mut merged, document);
        let body = serde_json::to_vec(&merged)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

/// Upserts the report. On failure the full report is logged so the
/// computation is not lost, and a persistence error is returned.
#[tracing::instrument(skip(sink, report), fields(city_id = %report.city_id, date = %report.date))]
pub async fn persist_report(
    sink: &dyn ReportSink,
    path: &str,
    report: &StabilityReport,
) -> std::result::Result<String, StabilityError> {
    let document = serde_json::to_value(report)?;

    match sink.upsert(path, document).await {
        Ok(destination) => {
            info!(destination = %destination, "Report persisted");
            Ok(destination)
        }
        Err(e) => {
            let json = to_json(report).unwrap_or_default();
            error!(error = %e, report = %json, "Report write failed");
            Err(StabilityError::Persistence {
                destination: path.to_string(),
                reason: format!("{e:#}"),
            })
        }
    }
}
