//! Cross-vehicle repeatability scoring.
//!
//! A segment is trustworthy when different vehicles driving it report
//! similar roughness. Each vehicle is represented by the median of its own
//! passes, and the spread of those medians becomes a score in (0, 1]:
//! `1 / (1 + variance)`.

use crate::analyzers::vehicles::VehicleMetrics;
use crate::model::{RepeatabilitySample, RepeatabilitySamples, RepeatabilitySummary};
use crate::numeric::{average, median, quantile, round_number, round4, round_opt, variance};

/// Exemplars kept at each end of the ranking.
pub const SAMPLE_SIZE: usize = 5;

/// A segment with at least two vehicle medians.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSegment {
    pub h3: String,
    pub vehicle_count: usize,
    pub variance: f64,
    pub score: f64,
}

impl ScoredSegment {
    fn sample(&self) -> RepeatabilitySample {
        RepeatabilitySample {
            h3: self.h3.clone(),
            vehicle_count: self.vehicle_count,
            variance: round_number(self.variance, 6),
            score: round_number(self.score, 6),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepeatabilityResult {
    pub summary: RepeatabilitySummary,
    pub samples: RepeatabilitySamples,
}

/// Maps a variance to the (0, 1] score.
pub fn score_from_variance(variance: f64) -> f64 {
    1.0 / (1.0 + variance)
}

/// Scores one segment's per-vehicle metric lists. `None` with fewer than two
/// vehicle medians.
pub fn score_segment<'a>(
    h3: &str,
    vehicles: impl IntoIterator<Item = &'a Vec<f64>>,
) -> Option<ScoredSegment> {
    let medians: Vec<f64> = vehicles.into_iter().filter_map(|v| median(v)).collect();
    if medians.len() < 2 {
        return None;
    }
    let var = variance(&medians)?;

    Some(ScoredSegment {
        h3: h3.to_string(),
        vehicle_count: medians.len(),
        variance: var,
        score: score_from_variance(var),
    })
}

/// Scores every segment and summarizes the population.
///
/// `best` holds the highest scores, highest first; `worst` the lowest,
/// lowest first. Equal scores keep h3 order.
pub fn compute_repeatability_scores(metrics: &VehicleMetrics) -> RepeatabilityResult {
    let mut scored: Vec<ScoredSegment> = metrics
        .iter()
        .filter_map(|(h3, vehicles)| score_segment(h3, vehicles.values()))
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
    let summary = RepeatabilitySummary {
        segment_count: scored.len(),
        mean: round_opt(average(&scores), 4),
        median: round_opt(median(&scores), 4),
        p25: quantile(&scores, 0.25).and_then(round4),
        p75: quantile(&scores, 0.75).and_then(round4),
    };

    let best = scored.iter().take(SAMPLE_SIZE).map(ScoredSegment::sample).collect();

    // stable ascending sort so ties keep h3 order here too
    scored.sort_by(|a, b| a.score.total_cmp(&b.score));
    let worst = scored.iter().take(SAMPLE_SIZE).map(ScoredSegment::sample).collect();

    RepeatabilityResult {
        summary,
        samples: RepeatabilitySamples { best, worst },
    }
}
