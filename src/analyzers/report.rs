//! Combines the analysis branches into the report document. No I/O.

use crate::analyzers::comparison::{
    compute_grade_change, compute_week_over_week, compute_worst_segments,
};
use crate::analyzers::repeatability::RepeatabilityResult;
use crate::analyzers::segments::SegmentSnapshot;
use crate::config::ReportRequest;
use crate::model::{ReportSources, ReportStats, StabilityReport};

pub const SCHEMA_VERSION: u8 = 1;
pub const ALGORITHM_VERSION: u8 = 1;

pub fn assemble_report(
    request: &ReportRequest,
    today: &SegmentSnapshot,
    compare: &SegmentSnapshot,
    repeatability: &RepeatabilityResult,
) -> StabilityReport {
    let week_over_week = compute_week_over_week(&today.segments, &compare.segments);
    let grade_changes = compute_grade_change(&today.segments, &compare.segments);
    let worst_segments =
        compute_worst_segments(&today.segments, &compare.segments, request.top_n);

    StabilityReport {
        schema_version: SCHEMA_VERSION,
        algorithm_version: ALGORITHM_VERSION,
        city_id: request.city_id.clone(),
        date: request.date,
        compare_date: request.compare_date(),
        window_days: request.lookback_days,
        generated_at: request.generated_at,
        stats: ReportStats {
            total_segments_today: today.segments.len(),
            total_segments_compare: compare.segments.len(),
            overlap_segments: week_over_week.overlap,
            week_over_week,
            grade_changes,
            repeatability: repeatability.summary.clone(),
        },
        worst_segments,
        repeatability_samples: repeatability.samples.clone(),
        sources: ReportSources {
            today: today.source.clone(),
            compare: compare.source.clone(),
        },
    }
}
