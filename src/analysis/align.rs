/// Temporal alignment of VP points with AM values.
///
/// Two join policies:
///
/// - **Interval membership** (`join_intervals`): a VP point at `t` takes the
///   AM of the interval with `start <= t < end`. Intervals are sorted by
///   start first; if any overlap, the earliest-starting one that contains
///   `t` wins, and the overlap is counted so it shows up in diagnostics.
/// - **Exact grid** (`join_exact_grid`): inner join on the identical local
///   (date, time) key.
///
/// Either way a VP point gets at most one AM value, and points with no
/// match are dropped (and counted), never defaulted to zero.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::model::{AmInterval, RainAggregate, TidePoint};

/// A VP point that found exactly one AM value.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedPoint {
    pub aggregate: RainAggregate,
    pub am: Decimal,
}

/// Join output plus what could not be matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    pub joined: Vec<JoinedPoint>,
    pub unmatched: usize,
    pub overlapping_intervals: usize,
}

// ---------------------------------------------------------------------------
// Conversions between tide representations
// ---------------------------------------------------------------------------

/// Each point covers `[t_i, t_{i+1})` with its own height. The final point
/// closes the series and covers nothing.
pub fn intervals_from_points(points: &[TidePoint]) -> Vec<AmInterval> {
    points
        .windows(2)
        .filter(|w| w[0].timestamp < w[1].timestamp)
        .map(|w| AmInterval {
            start: w[0].timestamp,
            end: w[1].timestamp,
            am: w[0].height,
        })
        .collect()
}

/// Keys each interval's AM at its start time.
pub fn points_from_intervals(intervals: &[AmInterval]) -> Vec<TidePoint> {
    let mut points: Vec<TidePoint> = intervals
        .iter()
        .map(|i| TidePoint {
            timestamp: i.start,
            height: i.am,
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// Counts intervals that start before an earlier-starting interval ends.
/// Expects intervals sorted by start.
pub fn count_overlaps(sorted: &[AmInterval]) -> usize {
    let mut overlaps = 0;
    let mut reach: Option<NaiveDateTime> = None;
    for interval in sorted {
        if let Some(end) = reach {
            if interval.start < end {
                overlaps += 1;
            }
        }
        reach = Some(reach.map_or(interval.end, |end| end.max(interval.end)));
    }
    overlaps
}

// ---------------------------------------------------------------------------
// Joins
// ---------------------------------------------------------------------------

/// Interval-membership join. Earliest interval start wins on overlap.
pub fn join_intervals(aggregates: &[RainAggregate], intervals: &[AmInterval]) -> Alignment {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| (i.start, i.end));

    let mut alignment = Alignment {
        overlapping_intervals: count_overlaps(&sorted),
        ..Alignment::default()
    };

    for aggregate in aggregates {
        let t = aggregate.timestamp;
        // Only intervals starting at or before t can contain it.
        let candidates = sorted.partition_point(|i| i.start <= t);
        match sorted[..candidates].iter().find(|i| i.contains(t)) {
            Some(interval) => alignment.joined.push(JoinedPoint {
                aggregate: aggregate.clone(),
                am: interval.am,
            }),
            None => alignment.unmatched += 1,
        }
    }

    alignment
}

/// Exact-grid join on identical timestamps. If the tide side repeats a
/// key, the chronologically first point wins.
pub fn join_exact_grid(aggregates: &[RainAggregate], points: &[TidePoint]) -> Alignment {
    let mut grid: BTreeMap<NaiveDateTime, Decimal> = BTreeMap::new();
    for point in points {
        grid.entry(point.timestamp).or_insert(point.height);
    }

    let mut alignment = Alignment::default();
    for aggregate in aggregates {
        match grid.get(&aggregate.timestamp) {
            Some(&am) => alignment.joined.push(JoinedPoint {
                aggregate: aggregate.clone(),
                am,
            }),
            None => alignment.unmatched += 1,
        }
    }
    alignment
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
