//! Loads raw vehicle passes and groups a per-pass roughness metric by
//! segment and vehicle.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, StabilityError};
use crate::fallback::{describe_errors, first_success};
use crate::fields::{number_field, string_field, timestamp_millis_field};
use crate::store::{Document, DocumentStore, DocumentStream, Filter, PassFieldNames};

/// Metric values grouped by h3, then by vehicle hash.
pub type VehicleMetrics = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// One vehicle's traversal of one segment, resolved from a raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPass {
    pub h3: String,
    pub vehicle_hash: String,
    /// Event time in epoch millis, if any candidate field resolved.
    pub event_ms: Option<i64>,
    pub energy: Option<f64>,
    pub sample_count: Option<f64>,
}

impl TelemetryPass {
    /// Resolves a raw record. `None` when the segment or vehicle is missing.
    pub fn from_document(data: &Value, fields: &PassFieldNames) -> Option<Self> {
        let h3 = string_field(data, fields.segment.as_slice())?;
        let vehicle_hash = string_field(data, fields.vehicle.as_slice())?;

        Some(TelemetryPass {
            h3,
            vehicle_hash,
            event_ms: timestamp_millis_field(data, fields.timestamp.as_slice()),
            energy: number_field(data, fields.energy.as_slice()),
            sample_count: number_field(data, fields.sample_count.as_slice()),
        })
    }

    /// Roughness energy per sample; needs a positive sample count.
    pub fn metric(&self) -> Option<f64> {
        let energy = self.energy.filter(|e| e.is_finite())?;
        let count = self.sample_count.filter(|c| c.is_finite() && *c > 0.0)?;
        Some(energy / count).filter(|m| m.is_finite())
    }
}

/// Server-side query forms, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStrategy {
    /// City plus numeric start timestamp at or after the cutoff.
    NumericTimestamp,
    /// City plus structured timestamp at or after the cutoff.
    StructuredTimestamp,
    /// City only; time is filtered client side.
    CityOnly,
}

impl QueryStrategy {
    pub const ORDER: [QueryStrategy; 3] = [
        QueryStrategy::NumericTimestamp,
        QueryStrategy::StructuredTimestamp,
        QueryStrategy::CityOnly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QueryStrategy::NumericTimestamp => "numeric_timestamp",
            QueryStrategy::StructuredTimestamp => "structured_timestamp",
            QueryStrategy::CityOnly => "city_only",
        }
    }

    pub fn filters(self, fields: &PassFieldNames, city_id: &str, cutoff_ms: i64) -> Vec<Filter> {
        let mut filters = vec![Filter::eq(&fields.city, city_id)];
        match self {
            QueryStrategy::NumericTimestamp => filters.push(Filter::NumberAtLeast {
                field: fields.numeric_timestamp.clone(),
                min: cutoff_ms as f64,
            }),
            QueryStrategy::StructuredTimestamp => filters.push(Filter::TimestampAtLeast {
                field: fields.structured_timestamp.clone(),
                min_ms: cutoff_ms,
            }),
            QueryStrategy::CityOnly => {}
        }
        filters
    }
}

/// Counters describing one fold over the pass stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub scanned: usize,
    pub malformed: usize,
    pub stale: usize,
    pub out_of_scope: usize,
    pub without_metric: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentVehicleMetrics {
    pub metrics: VehicleMetrics,
    pub stats: LoadStats,
    pub strategy: Option<QueryStrategy>,
}

/// Streams passes for `city_id` since `cutoff_ms` and groups their metric.
///
/// Strict: when every query strategy fails the error is returned, since an
/// empty result would pass for "no telemetry" and shrink the population the
/// repeatability score is computed from. An `allowed` set that is non-empty
/// restricts the output to those segments.
#[tracing::instrument(skip(store, fields, allowed), fields(allowed = allowed.len()))]
pub async fn load_segment_vehicle_metrics(
    store: &dyn DocumentStore,
    collection: &str,
    fields: &PassFieldNames,
    city_id: &str,
    cutoff_ms: i64,
    allowed: Arc<HashSet<String>>,
) -> Result<SegmentVehicleMetrics> {
    let attempted = first_success(
        QueryStrategy::ORDER.into_iter().map(|strategy| {
            move || async move {
                let filters = strategy.filters(fields, city_id, cutoff_ms);
                let stream = store.query(collection, &filters).await?;
                Ok::<_, StabilityError>((strategy, stream))
            }
        }),
        |_| true,
    )
    .await;

    for (idx, e) in &attempted.errors {
        warn!(
            strategy = QueryStrategy::ORDER[*idx].name(),
            error = %e,
            "Pass query rejected, trying next strategy"
        );
    }

    let failures = describe_errors(&attempted.errors);
    let Some((strategy, stream)) = attempted.value() else {
        return Err(StabilityError::SourceUnavailable {
            source_name: collection.to_string(),
            reason: format!("every pass query strategy failed ({failures})"),
        });
    };
    debug!(strategy = strategy.name(), "Streaming vehicle passes");

    let fields = fields.clone();
    let mut loaded = tokio::task::spawn_blocking(move || {
        fold_passes(stream, &fields, cutoff_ms, &allowed)
    })
    .await
    .map_err(|e| StabilityError::store(format!("pass fold task failed: {e}")))??;
    loaded.strategy = Some(strategy);

    info!(
        strategy = strategy.name(),
        scanned = loaded.stats.scanned,
        kept = loaded.stats.kept,
        malformed = loaded.stats.malformed,
        stale = loaded.stats.stale,
        out_of_scope = loaded.stats.out_of_scope,
        segments = loaded.metrics.len(),
        "Vehicle metrics loaded"
    );

    Ok(loaded)
}

/// Folds the stream one record at a time into the grouping map.
///
/// Records without a segment or vehicle are skipped. A record whose time
/// resolves to before `cutoff_ms` is dropped; one with no resolvable time is
/// kept. A read error aborts the fold.
pub fn fold_passes(
    stream: DocumentStream,
    fields: &PassFieldNames,
    cutoff_ms: i64,
    allowed: &HashSet<String>,
) -> Result<SegmentVehicleMetrics> {
    let mut out = SegmentVehicleMetrics::default();

    for item in stream {
        let doc: Document = item?;
        out.stats.scanned += 1;

        let Some(pass) = TelemetryPass::from_document(&doc.data, fields) else {
            out.stats.malformed += 1;
            continue;
        };
        if pass.event_ms.is_some_and(|ts| ts < cutoff_ms) {
            out.stats.stale += 1;
            continue;
        }
        if !allowed.is_empty() && !allowed.contains(&pass.h3) {
            out.stats.out_of_scope += 1;
            continue;
        }
        let Some(metric) = pass.metric() else {
            out.stats.without_metric += 1;
            continue;
        };

        out.metrics
            .entry(pass.h3)
            .or_default()
            .entry(pass.vehicle_hash)
            .or_default()
            .push(metric);
        out.stats.kept += 1;
    }

    Ok(out)
}
