//! Priority resolution for multi-source aggregation.
//!
//! Different owning apps can report overlapping intervals for the same
//! aggregation (two trackers both logging the same walk). Counting both
//! would double the total, so overlaps are resolved before summing:
//! - for any instant covered by more than one interval, the interval whose
//!   owning app wrote most recently (latest last-modified time) wins;
//! - non-overlapping portions of the losing intervals still count;
//! - last-modified ties break by higher app surrogate key, then earlier
//!   start, so the total never depends on row-fetch order.
//!
//! Duration sums count each interval's surviving covered time directly.
//! Quantity sums prorate the interval's value by the surviving fraction of
//! its own length.

use pulse_core::{AggregateResultType, AggregateValue};
use std::cmp::Ordering;

/// One contributing interval row, as fetched by the priority form of an
/// aggregate request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInterval {
    pub start_millis: i64,
    pub end_millis: i64,
    pub app_id: i64,
    pub last_modified_millis: i64,
    pub value: f64,
}

/// Surviving time per input interval, in input order.
pub fn kept_durations(intervals: &[SourceInterval], window: (i64, i64)) -> Vec<i64> {
    let mut order: Vec<usize> = (0..intervals.len()).collect();
    order.sort_by(|&a, &b| priority_order(&intervals[a], &intervals[b]));

    let mut covered: Vec<(i64, i64)> = Vec::new();
    let mut kept = vec![0i64; intervals.len()];

    for index in order {
        let interval = &intervals[index];
        let Some(segment) = clip((interval.start_millis, interval.end_millis), window) else {
            continue;
        };
        for (s, e) in subtract(segment, &covered) {
            kept[index] += e - s;
        }
        insert_segment(&mut covered, segment);
    }

    kept
}

/// Total surviving covered time across all contributors.
pub fn priority_duration_sum(intervals: &[SourceInterval], window: (i64, i64)) -> i64 {
    kept_durations(intervals, window).iter().sum()
}

/// Quantity total with each value prorated by its interval's surviving
/// fraction.
pub fn priority_weighted_sum(intervals: &[SourceInterval], window: (i64, i64)) -> f64 {
    kept_durations(intervals, window)
        .iter()
        .zip(intervals)
        .map(|(kept, interval)| {
            let length = interval.end_millis - interval.start_millis;
            if length <= 0 {
                0.0
            } else {
                interval.value * (*kept as f64 / length as f64)
            }
        })
        .sum()
}

/// Resolves the fetched intervals into the declared result type. `None`
/// when nothing contributed.
pub fn resolve_priority_value(
    intervals: &[SourceInterval],
    window: (i64, i64),
    result_type: AggregateResultType,
) -> Option<AggregateValue> {
    if intervals.is_empty() {
        return None;
    }
    Some(match result_type {
        AggregateResultType::DurationMillis => {
            AggregateValue::DurationMillis(priority_duration_sum(intervals, window))
        }
        AggregateResultType::Long => {
            AggregateValue::Long(priority_weighted_sum(intervals, window).round() as i64)
        }
        AggregateResultType::Double => {
            AggregateValue::Double(priority_weighted_sum(intervals, window))
        }
    })
}

fn priority_order(a: &SourceInterval, b: &SourceInterval) -> Ordering {
    b.last_modified_millis
        .cmp(&a.last_modified_millis)
        .then(b.app_id.cmp(&a.app_id))
        .then(a.start_millis.cmp(&b.start_millis))
}

fn clip(segment: (i64, i64), window: (i64, i64)) -> Option<(i64, i64)> {
    let start = segment.0.max(window.0);
    let end = segment.1.min(window.1);
    if start < end {
        Some((start, end))
    } else {
        None
    }
}

/// Pieces of `segment` not covered by `covered` (sorted, disjoint).
fn subtract(segment: (i64, i64), covered: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    let (mut start, end) = segment;
    for &(cs, ce) in covered {
        if ce <= start {
            continue;
        }
        if cs >= end {
            break;
        }
        if cs > start {
            out.push((start, cs.min(end)));
        }
        start = start.max(ce);
        if start >= end {
            break;
        }
    }
    if start < end {
        out.push((start, end));
    }
    out
}

fn insert_segment(covered: &mut Vec<(i64, i64)>, segment: (i64, i64)) {
    covered.push(segment);
    covered.sort_unstable();
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(covered.len());
    for &(s, e) in covered.iter() {
        if let Some(last) = merged.last_mut() {
            if s <= last.1 {
                last.1 = last.1.max(e);
                continue;
            }
        }
        merged.push((s, e));
    }
    *covered = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start: i64, end: i64, app: i64, modified: i64, value: f64) -> SourceInterval {
        SourceInterval {
            start_millis: start,
            end_millis: end,
            app_id: app,
            last_modified_millis: modified,
            value,
        }
    }

    // ========================================================================
    // TEST 1: overlapping intervals count the overlap once
    // ========================================================================
    #[test]
    fn test_overlap_counts_once() {
        // App 1 reports [0, 10), app 2 reports [5, 15) and wrote later.
        // The total over [0, 15) is 15, not 20: [0, 5) from app 1 and
        // [5, 15) from app 2.
        let intervals = vec![
            interval(0, 10, 1, 100, 0.0),
            interval(5, 15, 2, 200, 0.0),
        ];
        assert_eq!(priority_duration_sum(&intervals, (0, 15)), 15);
        assert_eq!(kept_durations(&intervals, (0, 15)), vec![5, 10]);
    }

    // ========================================================================
    // TEST 2: the most recently modified contributor wins the overlap
    // ========================================================================
    #[test]
    fn test_latest_writer_wins() {
        let intervals = vec![
            interval(0, 10, 1, 500, 0.0),
            interval(5, 15, 2, 200, 0.0),
        ];
        // App 1 wrote later, so it keeps its full [0, 10); app 2 keeps
        // only [10, 15).
        assert_eq!(kept_durations(&intervals, (0, 15)), vec![10, 5]);
    }

    // ========================================================================
    // TEST 3: quantity sums prorate by the surviving fraction
    // ========================================================================
    #[test]
    fn test_quantity_proration() {
        let intervals = vec![
            interval(0, 10, 1, 100, 100.0),
            interval(5, 15, 2, 200, 100.0),
        ];
        // App 2 keeps all 100; app 1 keeps 5/10 of its interval -> 50.
        let total = priority_weighted_sum(&intervals, (0, 15));
        assert!((total - 150.0).abs() < 1e-9);
    }

    // ========================================================================
    // TEST 4: totals are independent of row-fetch order
    // ========================================================================
    #[test]
    fn test_fetch_order_invariance() {
        let a = interval(0, 10, 1, 100, 40.0);
        let b = interval(5, 15, 2, 200, 60.0);
        let c = interval(12, 20, 3, 150, 80.0);

        let forward = priority_weighted_sum(&[a, b, c], (0, 20));
        let reversed = priority_weighted_sum(&[c, b, a], (0, 20));
        assert!((forward - reversed).abs() < 1e-9);

        let forward_duration = priority_duration_sum(&[a, b, c], (0, 20));
        let reversed_duration = priority_duration_sum(&[c, b, a], (0, 20));
        assert_eq!(forward_duration, reversed_duration);
    }

    // ========================================================================
    // TEST 5: last-modified ties break deterministically by app key
    // ========================================================================
    #[test]
    fn test_tie_breaks_by_app_key() {
        let intervals = vec![
            interval(0, 10, 1, 100, 0.0),
            interval(0, 10, 2, 100, 0.0),
        ];
        // Same window, same last-modified: the higher surrogate wins.
        assert_eq!(kept_durations(&intervals, (0, 10)), vec![0, 10]);
    }

    // ========================================================================
    // TEST 6: the query window clips contributions
    // ========================================================================
    #[test]
    fn test_window_clipping() {
        let intervals = vec![interval(0, 100, 1, 100, 0.0)];
        assert_eq!(priority_duration_sum(&intervals, (25, 75)), 50);
    }

    // ========================================================================
    // TEST 7: disjoint intervals all count in full
    // ========================================================================
    #[test]
    fn test_disjoint_intervals_count_fully() {
        let intervals = vec![
            interval(0, 10, 1, 100, 10.0),
            interval(20, 30, 2, 50, 20.0),
        ];
        assert_eq!(priority_duration_sum(&intervals, (0, 40)), 20);
        let total = priority_weighted_sum(&intervals, (0, 40));
        assert!((total - 30.0).abs() < 1e-9);
    }

    // ========================================================================
    // TEST 8: result decoding per declared type
    // ========================================================================
    #[test]
    fn test_result_type_decoding() {
        let intervals = vec![interval(0, 10, 1, 100, 25.0)];
        assert_eq!(
            resolve_priority_value(&intervals, (0, 10), AggregateResultType::DurationMillis),
            Some(AggregateValue::DurationMillis(10))
        );
        assert_eq!(
            resolve_priority_value(&intervals, (0, 10), AggregateResultType::Long),
            Some(AggregateValue::Long(25))
        );
        assert_eq!(
            resolve_priority_value(&[], (0, 10), AggregateResultType::Long),
            None
        );
    }

    #[test]
    fn test_three_way_overlap() {
        // Newest covers [4, 8); middle covers [2, 6); oldest covers [0, 5).
        let intervals = vec![
            interval(0, 5, 1, 100, 0.0),
            interval(2, 6, 2, 200, 0.0),
            interval(4, 8, 3, 300, 0.0),
        ];
        // App 3 keeps [4, 8) = 4; app 2 keeps [2, 4) = 2; app 1 keeps
        // [0, 2) = 2. Every instant in [0, 8) counted exactly once.
        assert_eq!(kept_durations(&intervals, (0, 10)), vec![2, 2, 4]);
        assert_eq!(priority_duration_sum(&intervals, (0, 10)), 8);
    }
}
