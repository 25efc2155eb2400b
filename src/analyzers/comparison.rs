//! Today versus compare-day statistics over segment snapshots.

use tracing::warn;

use crate::analyzers::grade::{GradeMove, grade_move, is_single_letter};
use crate::model::{GradeChangeStats, SegmentMap, WeekOverWeekStats, WorstSegment};
use crate::numeric::{average, median, round4, round_opt};

/// Ranks today's segments by `normalized_median`, worst (highest) first.
///
/// Only finite values are ranked. The sort is stable, so equal values keep
/// the snapshot's insertion order. Deltas and grade changes are filled in
/// only when the compare day has a finite value for the same cell.
pub fn compute_worst_segments(
    today: &SegmentMap,
    prev: &SegmentMap,
    limit: usize,
) -> Vec<WorstSegment> {
    let mut ranked: Vec<_> = today
        .iter()
        .filter_map(|s| s.finite_value().map(|v| (s, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (seg, value))| {
            let comparable = prev
                .get(&seg.h3)
                .and_then(|p| p.finite_value().map(|pv| (p, pv)));

            let (delta, grade_changed, previous_grade) = match comparable {
                Some((p, pv)) => {
                    let changed = match (seg.preferred_grade(), p.preferred_grade()) {
                        (Some(now), Some(before)) => Some(now != before),
                        _ => None,
                    };
                    (
                        round4(value - pv),
                        changed,
                        p.preferred_grade().map(str::to_string),
                    )
                }
                None => (None, None, None),
            };

            WorstSegment {
                rank: idx + 1,
                h3: seg.h3.clone(),
                normalized_median: value,
                percentile_all: seg.percentile_all,
                grade_all: seg.grade_all.clone(),
                percentile_within_type: seg.percentile_within_type,
                grade_within_type: seg.grade_within_type.clone(),
                road_type: seg.road_type.clone(),
                sample_count: seg.sample_count,
                unique_vehicles: seg.unique_vehicles,
                week_over_week_delta: delta,
                grade_changed,
                previous_grade,
                road_name: seg.road_name.clone(),
            }
        })
        .collect()
}

/// Week-over-week movement of the normalized median.
///
/// Each day's average covers that day's whole finite population, not just
/// the overlap. The median delta and improved/worsened counts use paired
/// differences (today - compare) over the overlap only; a zero difference is
/// neither improved nor worsened.
pub fn compute_week_over_week(today: &SegmentMap, prev: &SegmentMap) -> WeekOverWeekStats {
    let today_values: Vec<f64> = today.iter().filter_map(|s| s.finite_value()).collect();
    let prev_values: Vec<f64> = prev.iter().filter_map(|s| s.finite_value()).collect();

    let deltas: Vec<f64> = today
        .iter()
        .filter_map(|s| {
            let now = s.finite_value()?;
            let before = prev.get(&s.h3)?.finite_value()?;
            Some(now - before)
        })
        .collect();

    WeekOverWeekStats {
        today_average: round_opt(average(&today_values), 4),
        compare_average: round_opt(average(&prev_values), 4),
        overlap: deltas.len(),
        median_delta: round_opt(median(&deltas), 4),
        improved_count: deltas.iter().filter(|d| **d < 0.0).count(),
        worsened_count: deltas.iter().filter(|d| **d > 0.0).count(),
    }
}

/// Grade label churn between the two days.
///
/// See [`crate::analyzers::grade`] for the ordering precondition on labels.
pub fn compute_grade_change(today: &SegmentMap, prev: &SegmentMap) -> GradeChangeStats {
    let mut stats = GradeChangeStats::default();
    let mut off_scheme = 0usize;

    for seg in today.iter() {
        let Some(before) = prev.get(&seg.h3).and_then(|p| p.preferred_grade()) else {
            continue;
        };
        let Some(now) = seg.preferred_grade() else {
            continue;
        };

        stats.overlap += 1;
        if !is_single_letter(now) || !is_single_letter(before) {
            off_scheme += 1;
        }

        match grade_move(before, now) {
            GradeMove::Unchanged => {}
            GradeMove::Improved => {
                stats.changed += 1;
                stats.improved += 1;
            }
            GradeMove::Worsened => {
                stats.changed += 1;
                stats.worsened += 1;
            }
        }
    }

    if off_scheme > 0 {
        warn!(
            off_scheme,
            "Grade labels outside the single-letter scheme; improved/worsened split may be wrong"
        );
    }

    stats.percent_changed = if stats.overlap == 0 {
        None
    } else {
        round4(stats.changed as f64 / stats.overlap as f64 * 100.0)
    };

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentAggregate;

    fn seg(h3: &str, value: Option<f64>, grade: Option<&str>) -> SegmentAggregate {
        SegmentAggregate {
            h3: h3.into(),
            normalized_median: value,
            grade_all: grade.map(str::to_string),
            ..Default::default()
        }
    }

    fn map(segments: Vec<SegmentAggregate>) -> SegmentMap {
        segments.into_iter().collect()
    }

    #[test]
    fn test_worsened_segment_delta() {
        let today = map(vec![seg("abc", Some(0.8), None)]);
        let prev = map(vec![seg("abc", Some(0.5), None)]);

        let worst = compute_worst_segments(&today, &prev, 10);
        assert_eq!(worst[0].week_over_week_delta, Some(0.3));
        assert_eq!(worst[0].grade_changed, None);

        let wow = compute_week_over_week(&today, &prev);
        assert_eq!(wow.worsened_count, 1);
        assert_eq!(wow.improved_count, 0);
        assert_eq!(wow.median_delta, Some(0.3));
    }

    #[test]
    fn test_today_only_segment_has_null_delta() {
        let today = map(vec![
            seg("shared", Some(1.0), Some("B")),
            seg("fresh", Some(5.0), Some("D")),
        ]);
        let prev = map(vec![seg("shared", Some(3.0), Some("C"))]);

        let worst = compute_worst_segments(&today, &prev, 10);
        assert_eq!(worst[0].h3, "fresh");
        assert_eq!(worst[0].week_over_week_delta, None);
        assert_eq!(worst[0].grade_changed, None);
        assert_eq!(worst[0].previous_grade, None);
        assert_eq!(worst[1].week_over_week_delta, Some(-2.0));
        assert_eq!(worst[1].grade_changed, Some(true));
        assert_eq!(worst[1].previous_grade.as_deref(), Some("C"));

        let wow = compute_week_over_week(&today, &prev);
        assert_eq!(wow.overlap, 1);
        assert_eq!(wow.today_average, Some(3.0));
        assert_eq!(wow.compare_average, Some(3.0));
        assert_eq!(wow.improved_count, 1);
    }

    #[test]
    fn test_top_n_limits_and_ranks() {
        let today = map(vec![
            seg("a", Some(0.2), None),
            seg("b", Some(0.9), None),
            seg("c", Some(0.5), None),
            seg("d", Some(0.7), None),
            seg("e", Some(0.1), None),
            seg("nan", Some(f64::NAN), None),
            seg("none", None, None),
        ]);

        let worst = compute_worst_segments(&today, &SegmentMap::new(), 2);
        assert_eq!(worst.len(), 2);
        assert_eq!((worst[0].rank, worst[0].h3.as_str()), (1, "b"));
        assert_eq!((worst[1].rank, worst[1].h3.as_str()), (2, "d"));
        assert!(worst[0].normalized_median > worst[1].normalized_median);
    }

    #[test]
    fn test_ties_keep_insertion_order_across_runs() {
        let today = map(vec![
            seg("x", Some(1.0), None),
            seg("y", Some(2.0), None),
            seg("z", Some(1.0), None),
            seg("w", Some(1.0), None),
        ]);

        let first = compute_worst_segments(&today, &SegmentMap::new(), 10);
        let second = compute_worst_segments(&today, &SegmentMap::new(), 10);
        let order: Vec<&str> = first.iter().map(|w| w.h3.as_str()).collect();

        assert_eq!(order, vec!["y", "x", "z", "w"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_delta_counts_as_neither() {
        let today = map(vec![seg("a", Some(1.0), None), seg("b", Some(2.0), None)]);
        let prev = map(vec![seg("a", Some(1.0), None), seg("b", Some(1.5), None)]);

        let wow = compute_week_over_week(&today, &prev);
        assert_eq!(wow.overlap, 2);
        assert_eq!(wow.improved_count + wow.worsened_count, 1);
        assert_eq!(wow.median_delta, Some(0.25));
    }

    #[test]
    fn test_empty_week_over_week() {
        let wow = compute_week_over_week(&SegmentMap::new(), &SegmentMap::new());
        assert_eq!(wow, WeekOverWeekStats::default());
    }

    #[test]
    fn test_grade_change_counts() {
        let today = map(vec![
            seg("a", None, Some("A")),
            seg("b", None, Some("D")),
            seg("c", None, Some("C")),
            seg("d", None, None),
            seg("e", None, Some("B")),
        ]);
        let prev = map(vec![
            seg("a", None, Some("B")),
            seg("b", None, Some("C")),
            seg("c", None, Some("C")),
            seg("d", None, Some("A")),
        ]);

        let stats = compute_grade_change(&today, &prev);
        assert_eq!(stats.overlap, 3);
        assert_eq!(stats.changed, 2);
        assert_eq!(stats.improved, 1);
        assert_eq!(stats.worsened, 1);
        assert_eq!(stats.percent_changed, Some(66.6667));
    }

    #[test]
    fn test_grade_change_prefers_within_type() {
        let mut today_seg = seg("a", None, Some("A"));
        today_seg.grade_within_type = Some("C".into());
        let mut prev_seg = seg("a", None, Some("A"));
        prev_seg.grade_within_type = Some("B".into());

        let stats = compute_grade_change(&map(vec![today_seg]), &map(vec![prev_seg]));
        assert_eq!(stats.changed, 1);
        assert_eq!(stats.worsened, 1);
    }

    #[test]
    fn test_grade_change_without_overlap() {
        let today = map(vec![seg("a", None, Some("A"))]);
        let stats = compute_grade_change(&today, &SegmentMap::new());
        assert_eq!(stats.overlap, 0);
        assert_eq!(stats.percent_changed, None);
    }
}
