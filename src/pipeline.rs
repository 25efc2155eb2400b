//! Runs one report end to end, minus persistence.
//!
//! The today and compare-day segment reads run concurrently. The pass stream
//! is scoped to today's segments, so it starts as soon as today's read is in,
//! still overlapping the compare-day read. Assembly waits for both branches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::analyzers::repeatability::compute_repeatability_scores;
use crate::analyzers::report::assemble_report;
use crate::analyzers::segments::fetch_normalized_segments;
use crate::analyzers::vehicles::load_segment_vehicle_metrics;
use crate::config::ReportRequest;
use crate::error::{Result, StabilityError};
use crate::model::StabilityReport;
use crate::store::{DocumentStore, StoreLayout};

#[tracing::instrument(
    skip(store, layout, request),
    fields(city_id = %request.city_id, date = %request.date)
)]
pub async fn generate_report(
    store: &dyn DocumentStore,
    layout: &StoreLayout,
    request: &ReportRequest,
) -> Result<StabilityReport> {
    let today_branch = async {
        let today = fetch_normalized_segments(store, layout, &request.city_id, request.date).await;
        let allowed: Arc<HashSet<String>> =
            Arc::new(today.segments.keys().map(str::to_string).collect());

        let loaded = load_segment_vehicle_metrics(
            store,
            &layout.telemetry_collection,
            &layout.pass_fields,
            &request.city_id,
            request.cutoff_ms(),
            allowed,
        )
        .await?;

        Ok::<_, StabilityError>((today, compute_repeatability_scores(&loaded.metrics)))
    };
    let compare_branch =
        fetch_normalized_segments(store, layout, &request.city_id, request.compare_date());

    let (today_result, compare) = tokio::join!(today_branch, compare_branch);
    let (today, repeatability) = today_result?;

    let report = assemble_report(request, &today, &compare, &repeatability);
    info!(
        today = report.stats.total_segments_today,
        compare = report.stats.total_segments_compare,
        overlap = report.stats.overlap_segments,
        scored = report.stats.repeatability.segment_count,
        "Report computed"
    );

    Ok(report)
}

/// [`generate_report`] bounded by `timeout`. Expiry fails the run like any
/// other read error, before anything is written.
pub async fn generate_report_within(
    store: &dyn DocumentStore,
    layout: &StoreLayout,
    request: &ReportRequest,
    timeout: Option<Duration>,
) -> Result<StabilityReport> {
    match timeout {
        None => generate_report(store, layout, request).await,
        Some(limit) => tokio::time::timeout(limit, generate_report(store, layout, request))
            .await
            .map_err(|_| StabilityError::Timeout(limit))?,
    }
}
