/// Tide reconstruction: sparse high/low-tide observations → AM values.
///
/// # Reconstruction modes
///
/// 1. **Standardization** (`standardize`) — the first observation is rounded
///    to the nearest half hour and every later one is re-timed a fixed
///    period (6 h) after the previous, keeping the height sequence. This
///    assumes highs and lows alternate on a regular semidiurnal cycle. It is
///    an approximation: real cycles run ~6 h 12 min and vary, so the
///    synthetic times drift away from the observed ones over a long table.
///
/// 2. **Linear interpolation** (`interpolate`) — a dense curve with one point
///    per step mark between consecutive extrema. Endpoints keep their exact
///    observed heights; interior points are rounded to the cent.
///
/// 3. **Direct interval formula** (`direct_intervals`) — for consecutive
///    same-day observations I1, I2: AM = round(((I1 − I2) / 6) + I1, 2),
///    constant over `[t1, t2)`.
///
/// Zero-duration pairs are skipped and counted, never divided by. So are
/// pairs whose arithmetic would overflow a `Decimal`.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike};
use rust_decimal::Decimal;

use super::rainfall::{floor_to, next_mark};
use super::round2;
use crate::model::{AmInterval, RawTideRow, TideExtremum, TidePoint, TideWhen};
use crate::parsing::{parse_decimal, parse_tide_combined, parse_tide_split};

/// Divisor of the direct interval formula (hours in a half tide cycle).
const DIRECT_FORMULA_DIVISOR: i64 = 6;

/// Largest magnitude accepted for a tide height, in metres.
pub const MAX_TIDE_HEIGHT_M: i64 = 100;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses tide rows into extrema sorted by time. Returns the extrema and
/// the number of rows dropped as malformed, which includes heights beyond
/// ±`MAX_TIDE_HEIGHT_M`.
pub fn parse_tide_rows(rows: &[RawTideRow]) -> (Vec<TideExtremum>, usize) {
    let mut extrema = Vec::with_capacity(rows.len());
    let mut malformed = 0;

    for row in rows {
        let timestamp = match &row.when {
            TideWhen::Split { date, time } => parse_tide_split(date, time),
            TideWhen::Combined(text) => parse_tide_combined(text),
        };
        match (timestamp, parse_decimal(&row.height)) {
            (Some(timestamp), Some(height)) if height.abs() <= Decimal::from(MAX_TIDE_HEIGHT_M) => {
                extrema.push(TideExtremum { timestamp, height })
            }
            _ => malformed += 1,
        }
    }

    sort_extrema(&mut extrema);
    (extrema, malformed)
}

/// Stable chronological sort; equal timestamps keep their table order.
pub fn sort_extrema(extrema: &mut [TideExtremum]) {
    extrema.sort_by_key(|e| e.timestamp);
}

// ---------------------------------------------------------------------------
// Standardization
// ---------------------------------------------------------------------------

/// Rounds `ts` to the nearest multiple of `width`. Exact ties go to the
/// even multiple.
pub fn round_to_nearest(ts: NaiveDateTime, width: Duration) -> NaiveDateTime {
    let width_secs = width.num_seconds().max(1);
    let secs = ts.and_utc().timestamp();
    let quotient = secs.div_euclid(width_secs);
    let remainder = secs.rem_euclid(width_secs);

    let round_up = 2 * remainder > width_secs
        || (2 * remainder == width_secs && (ts.nanosecond() > 0 || quotient % 2 != 0));
    let target = if round_up { quotient + 1 } else { quotient };

    DateTime::from_timestamp(target * width_secs, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(|| floor_to(ts, width))
}

/// Re-times extrema onto a fixed grid: the first is rounded to `round_to`,
/// each subsequent one follows `period` later. Heights keep their order.
pub fn standardize(
    extrema: &[TideExtremum],
    round_to: Duration,
    period: Duration,
) -> Vec<TideExtremum> {
    let mut sorted = extrema.to_vec();
    sort_extrema(&mut sorted);

    let Some(first) = sorted.first() else {
        return Vec::new();
    };
    let mut current = round_to_nearest(first.timestamp, round_to);

    let mut standardized = Vec::with_capacity(sorted.len());
    for (i, extremum) in sorted.iter().enumerate() {
        if i > 0 {
            current += period;
        }
        standardized.push(TideExtremum {
            timestamp: current,
            height: extremum.height,
        });
    }
    standardized
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Dense tide curve plus the pairs that could not be interpolated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    pub points: Vec<TidePoint>,
    pub degenerate_intervals: usize,
}

fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
    Decimal::from((end - start).num_seconds()) / Decimal::from(3600)
}

/// The points contributed by one pair: `a` itself, then every interior
/// mark. `None` when the slope or a height overflows.
fn interpolate_pair(a: TideExtremum, b: TideExtremum, step: Duration) -> Option<Vec<TidePoint>> {
    let rate = (b.height.checked_sub(a.height)?).checked_div(hours_between(a.timestamp, b.timestamp))?;

    let mut points = vec![TidePoint {
        timestamp: a.timestamp,
        height: a.height,
    }];
    let mut mark = next_mark(a.timestamp, step);
    while mark < b.timestamp {
        let rise = rate.checked_mul(hours_between(a.timestamp, mark))?;
        points.push(TidePoint {
            timestamp: mark,
            height: round2(a.height.checked_add(rise)?),
        });
        mark = next_mark(mark, step);
    }
    Some(points)
}

/// Linearly interpolates between consecutive extrema.
///
/// For each pair (t1, h1) → (t2, h2) the curve gets t1 with its exact
/// height, then one point at every multiple of `step` (from local midnight
/// of t1's day) strictly between t1 and t2 at `round2(h1 + rate × hours
/// elapsed)`. The final extremum closes the curve with its exact height.
/// Shared endpoints appear once.
pub fn interpolate(extrema: &[TideExtremum], step: Duration) -> Reconstruction {
    let mut sorted = extrema.to_vec();
    sort_extrema(&mut sorted);

    let mut result = Reconstruction::default();

    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.timestamp == a.timestamp {
            result.degenerate_intervals += 1;
            continue;
        }
        match interpolate_pair(a, b, step) {
            Some(points) => result.points.extend(points),
            None => result.degenerate_intervals += 1,
        }
    }

    if let Some(last) = sorted.last() {
        result.points.push(TidePoint {
            timestamp: last.timestamp,
            height: last.height,
        });
    }

    result.points.dedup_by_key(|p| p.timestamp);
    result
}

// ---------------------------------------------------------------------------
// Direct interval formula
// ---------------------------------------------------------------------------

/// AM = round(((I1 − I2) / 6) + I1, 2), or `None` on overflow.
///
/// Equal heights need no special case: the ratio term is zero and the
/// result is I1.
pub fn interval_am(i1: Decimal, i2: Decimal) -> Option<Decimal> {
    let ratio = i1.checked_sub(i2)?.checked_div(Decimal::from(DIRECT_FORMULA_DIVISOR))?;
    ratio.checked_add(i1).map(round2)
}

/// AM intervals plus the zero-length or overflowing pairs that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSet {
    pub intervals: Vec<AmInterval>,
    pub degenerate_intervals: usize,
}

/// Builds `[t1, t2)` intervals from consecutive observations on the same
/// calendar day. Pairs straddling midnight are not joined, so the time after
/// a day's last observation has no AM value.
pub fn direct_intervals(extrema: &[TideExtremum]) -> IntervalSet {
    let mut sorted = extrema.to_vec();
    sort_extrema(&mut sorted);

    let mut result = IntervalSet::default();
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.timestamp.date() != b.timestamp.date() {
            continue;
        }
        if a.timestamp == b.timestamp {
            result.degenerate_intervals += 1;
            continue;
        }
        let Some(am) = interval_am(a.height, b.height) else {
            result.degenerate_intervals += 1;
            continue;
        };
        result.intervals.push(AmInterval {
            start: a.timestamp,
            end: b.timestamp,
            am,
        });
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
