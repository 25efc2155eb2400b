//! Data types for segment aggregates and the stability report document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::fields::{number_field, string_field};

/// One h3 cell's normalized aggregate for a single city and date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAggregate {
    pub h3: String,
    pub normalized_median: Option<f64>,
    pub percentile_all: Option<f64>,
    pub grade_all: Option<String>,
    pub percentile_within_type: Option<f64>,
    pub grade_within_type: Option<String>,
    pub road_type: Option<String>,
    pub sample_count: Option<f64>,
    pub unique_vehicles: Option<f64>,
    pub road_name: Option<String>,
}

impl SegmentAggregate {
    /// Builds an aggregate from a loosely typed document. Fields with the
    /// wrong type or non-finite numbers are treated as absent. The `h3` field
    /// wins over the document id when present.
    pub fn from_document(doc_id: &str, data: &Value) -> Self {
        let h3 = string_field(data, &["h3", "h3Index"]).unwrap_or_else(|| doc_id.to_string());

        SegmentAggregate {
            h3,
            normalized_median: number_field(data, &["normalizedMedian"]),
            percentile_all: number_field(data, &["percentileAll"]),
            grade_all: string_field(data, &["gradeAll"]),
            percentile_within_type: number_field(data, &["percentileWithinType"]),
            grade_within_type: string_field(data, &["gradeWithinType"]),
            road_type: string_field(data, &["roadType"]),
            sample_count: number_field(data, &["sampleCount"]),
            unique_vehicles: number_field(data, &["uniqueVehicles"]),
            road_name: string_field(data, &["roadName"]),
        }
    }

    /// `normalized_median` only if it is finite.
    pub fn finite_value(&self) -> Option<f64> {
        self.normalized_median.filter(|v| v.is_finite())
    }

    /// Grade used for comparisons: within-type when present, overall otherwise.
    pub fn preferred_grade(&self) -> Option<&str> {
        self.grade_within_type
            .as_deref()
            .or(self.grade_all.as_deref())
    }
}

/// Segments keyed by h3, iterated in insertion order.
///
/// Ranking ties are broken by this order, so it must not depend on hashing.
#[derive(Debug, Clone, Default)]
pub struct SegmentMap {
    entries: Vec<SegmentAggregate>,
    index: HashMap<String, usize>,
}

impl SegmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces by h3. A replaced entry keeps its original position.
    pub fn insert(&mut self, segment: SegmentAggregate) {
        match self.index.get(&segment.h3) {
            Some(&pos) => self.entries[pos] = segment,
            None => {
                self.index.insert(segment.h3.clone(), self.entries.len());
                self.entries.push(segment);
            }
        }
    }

    pub fn get(&self, h3: &str) -> Option<&SegmentAggregate> {
        self.index.get(h3).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentAggregate> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.h3.as_str())
    }
}

impl FromIterator<SegmentAggregate> for SegmentMap {
    fn from_iter<I: IntoIterator<Item = SegmentAggregate>>(iter: I) -> Self {
        let mut map = SegmentMap::new();
        for segment in iter {
            map.insert(segment);
        }
        map
    }
}

/// One entry of the ranked worst-N list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorstSegment {
    pub rank: usize,
    pub h3: String,
    pub normalized_median: f64,
    pub percentile_all: Option<f64>,
    pub grade_all: Option<String>,
    pub percentile_within_type: Option<f64>,
    pub grade_within_type: Option<String>,
    pub road_type: Option<String>,
    pub sample_count: Option<f64>,
    pub unique_vehicles: Option<f64>,
    pub week_over_week_delta: Option<f64>,
    pub grade_changed: Option<bool>,
    pub previous_grade: Option<String>,
    pub road_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverWeekStats {
    pub today_average: Option<f64>,
    pub compare_average: Option<f64>,
    pub overlap: usize,
    pub median_delta: Option<f64>,
    pub improved_count: usize,
    pub worsened_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeChangeStats {
    pub overlap: usize,
    pub changed: usize,
    pub percent_changed: Option<f64>,
    pub improved: usize,
    pub worsened: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatabilitySummary {
    pub segment_count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
}

/// A scored segment in the best/worst repeatability exemplars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatabilitySample {
    pub h3: String,
    pub vehicle_count: usize,
    pub variance: Option<f64>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepeatabilitySamples {
    pub best: Vec<RepeatabilitySample>,
    pub worst: Vec<RepeatabilitySample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total_segments_today: usize,
    pub total_segments_compare: usize,
    pub overlap_segments: usize,
    pub week_over_week: WeekOverWeekStats,
    pub grade_changes: GradeChangeStats,
    pub repeatability: RepeatabilitySummary,
}

/// Storage paths the segment reads resolved to; `None` when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSources {
    pub today: Option<String>,
    pub compare: Option<String>,
}

/// The report document written once per city and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityReport {
    pub schema_version: u8,
    pub algorithm_version: u8,
    pub city_id: String,
    pub date: NaiveDate,
    pub compare_date: NaiveDate,
    pub window_days: u32,
    pub generated_at: DateTime<Utc>,
    pub stats: ReportStats,
    pub worst_segments: Vec<WorstSegment>,
    pub repeatability_samples: RepeatabilitySamples,
    pub sources: ReportSources,
}
