//! Collection reader for normalized segment aggregates.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::fallback::first_success;
use crate::model::{SegmentAggregate, SegmentMap};
use crate::store::{Document, DocumentStore, StoreLayout};

/// Segments for one city and date together with the path they came from.
#[derive(Debug, Clone, Default)]
pub struct SegmentSnapshot {
    pub segments: SegmentMap,
    /// `None` when no candidate path produced data.
    pub source: Option<String>,
}

/// Probes every known path shape in order and returns the first non-empty
/// collection.
///
/// Best effort: failing or empty paths are logged and skipped, and when
/// nothing yields data the result is an empty snapshot. A day without data
/// is a normal state for a city that has not been processed yet.
#[tracing::instrument(skip(store, layout))]
pub async fn fetch_normalized_segments(
    store: &dyn DocumentStore,
    layout: &StoreLayout,
    city_id: &str,
    date: NaiveDate,
) -> SegmentSnapshot {
    let paths = layout.segment_paths_for(city_id, date);

    let attempted = first_success(
        paths.iter().map(|path| {
            move || async move {
                let docs = store.list_documents(path).await?;
                debug!(path = %path, documents = docs.len(), "Probed segment path");
                Ok::<_, crate::error::StabilityError>((path.clone(), docs))
            }
        }),
        |(_, docs): &(String, Vec<Document>)| !docs.is_empty(),
    )
    .await;

    for (idx, e) in &attempted.errors {
        warn!(path = %paths[*idx], error = %e, "Segment path read failed, trying next");
    }

    match attempted.value() {
        Some((path, docs)) => {
            let segments: SegmentMap = docs
                .iter()
                .map(|d| SegmentAggregate::from_document(&d.id, &d.data))
                .collect();
            info!(path = %path, segments = segments.len(), "Loaded normalized segments");
            SegmentSnapshot {
                segments,
                source: Some(path),
            }
        }
        None => {
            warn!(candidates = paths.len(), "No segment data found for date");
            SegmentSnapshot::default()
        }
    }
}
