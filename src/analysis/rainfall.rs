/// Telemetry normalization: raw rain rows → per-station VP points.
///
/// `normalize_readings` filters to one sensor, parses values and converts
/// UTC source timestamps to local time. The conversion happens here, before
/// any bucketing, so bucket boundaries fall on local clock marks.
///
/// Two aggregations produce `RainAggregate`s from the normalized readings:
///
/// - `aggregate_buckets` — fixed, non-overlapping buckets (default 10 min),
///   zero-filled, each paired with a trailing sustained sum (default 2 h).
/// - `aggregate_hourly_windows` — one point per target hour with explicit
///   windows, for multi-day history where the feed may have gaps.
///
/// In both, VP = short_sum × (60 / short window minutes) + sustained_sum.
/// All sums use checked arithmetic; a point whose VP cannot be represented
/// is dropped and counted, never allowed to abort the run.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{RainAggregate, RainReading, RawRainRow};
use crate::parsing::{parse_decimal, parse_utc_timestamp, utc_to_local};
use crate::stations::StationRegistry;

/// Largest magnitude accepted for a single rain reading, in millimetres.
/// Anything beyond it is a sensor or transcription fault.
pub const MAX_READING_MM: i64 = 1_000;

/// Readings that survived normalization, plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedRain {
    pub readings: Vec<RainReading>,
    pub malformed_rows: usize,
    pub other_sensor_rows: usize,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Filters rows to `sensor_id`, parses them and converts to local time.
///
/// Rows with an unparseable timestamp, value, sensor id, an empty station
/// code or a value beyond ±`MAX_READING_MM` are counted as malformed. Rows without a sensor id are accepted (the
/// source was already filtered). An empty station name is filled from the
/// registry, falling back to the code. Output is sorted by station, then time.
pub fn normalize_readings(
    rows: &[RawRainRow],
    sensor_id: u32,
    offset: FixedOffset,
    registry: &StationRegistry,
) -> NormalizedRain {
    let mut result = NormalizedRain::default();

    for row in rows {
        if let Some(sensor) = row.sensor_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match parse_sensor_id(sensor) {
                Some(id) if id == sensor_id => {}
                Some(_) => {
                    result.other_sensor_rows += 1;
                    continue;
                }
                None => {
                    result.malformed_rows += 1;
                    continue;
                }
            }
        }

        let station_id = row.station_id.trim();
        let (Some(utc), Some(value)) = (
            parse_utc_timestamp(&row.timestamp),
            parse_decimal(&row.value),
        ) else {
            result.malformed_rows += 1;
            continue;
        };
        if station_id.is_empty() || value.abs() > Decimal::from(MAX_READING_MM) {
            result.malformed_rows += 1;
            continue;
        }

        let station_name = match row.station_name.trim() {
            "" => registry.name_for(station_id).unwrap_or(station_id),
            name => name,
        };

        result.readings.push(RainReading {
            station_id: station_id.to_string(),
            station_name: station_name.to_string(),
            timestamp: utc_to_local(utc, offset),
            value,
        });
    }

    result
        .readings
        .sort_by(|a, b| (&a.station_id, a.timestamp).cmp(&(&b.station_id, b.timestamp)));
    result
}

/// Sensor ids arrive as "10", "10.0" or a JSON number rendered to text.
fn parse_sensor_id(text: &str) -> Option<u32> {
    text.parse::<u32>().ok().or_else(|| {
        parse_decimal(text)
            .filter(|d| d.fract().is_zero())
            .and_then(|d| d.to_u32())
    })
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Groups readings by station code. `BTreeMap` keeps station iteration
/// order stable between runs.
pub fn group_by_station(readings: &[RainReading]) -> BTreeMap<&str, Vec<&RainReading>> {
    let mut grouped: BTreeMap<&str, Vec<&RainReading>> = BTreeMap::new();
    for reading in readings {
        grouped
            .entry(reading.station_id.as_str())
            .or_default()
            .push(reading);
    }
    grouped
}

/// Floors `ts` to a multiple of `width` counted from local midnight of
/// its day.
pub fn floor_to(ts: NaiveDateTime, width: Duration) -> NaiveDateTime {
    let midnight = ts.date().and_time(NaiveTime::MIN);
    let width_secs = width.num_seconds().max(1);
    let elapsed = (ts - midnight).num_seconds();
    midnight + Duration::seconds(elapsed - elapsed.rem_euclid(width_secs))
}

/// First grid mark strictly after `ts`. The grid restarts at every local
/// midnight, so when `width` does not divide a day the day's last slot is
/// short.
pub fn next_mark(ts: NaiveDateTime, width: Duration) -> NaiveDateTime {
    let next = floor_to(ts, width) + Duration::seconds(width.num_seconds().max(1));
    let next_midnight = ts.date().and_time(NaiveTime::MIN) + Duration::days(1);
    next.min(next_midnight)
}

/// Factor turning a sum over `window` into an hourly rate (6 for 10 min).
pub fn hourly_scale(window: Duration) -> Decimal {
    Decimal::from(3600) / Decimal::from(window.num_seconds().max(1))
}

/// VP = short_sum × scale + sustained_sum, or `None` on overflow.
pub fn peak_intensity(short_sum: Decimal, scale: Decimal, sustained_sum: Decimal) -> Option<Decimal> {
    short_sum.checked_mul(scale)?.checked_add(sustained_sum)
}

fn sum_between(group: &[&RainReading], start: NaiveDateTime, end: NaiveDateTime) -> Option<Decimal> {
    group
        .iter()
        .filter(|r| start <= r.timestamp && r.timestamp < end)
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.value))
}

/// VP points plus the ones dropped because their sums overflowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RainAggregation {
    pub aggregates: Vec<RainAggregate>,
    pub overflowed_points: usize,
}

// ---------------------------------------------------------------------------
// Bucketed aggregation
// ---------------------------------------------------------------------------

/// Buckets each station's readings into fixed windows of `bucket`,
/// zero-fills the gaps between its first and last bucket, and pairs every
/// bucket with the sum over the trailing `sustained` window ending at the
/// bucket's end.
///
/// With `latest_only`, only each station's final bucket is returned and it
/// is time-stamped at the station's most recent reading (live polling).
pub fn aggregate_buckets(
    readings: &[RainReading],
    bucket: Duration,
    sustained: Duration,
    latest_only: bool,
) -> RainAggregation {
    let scale = hourly_scale(bucket);
    let mut result = RainAggregation::default();

    for (station_id, group) in group_by_station(readings) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };

        // `None` marks a bucket whose sum overflowed.
        let mut sums: BTreeMap<NaiveDateTime, Option<Decimal>> = BTreeMap::new();
        for reading in &group {
            let slot = sums
                .entry(floor_to(reading.timestamp, bucket))
                .or_insert(Some(Decimal::ZERO));
            *slot = slot.and_then(|sum| sum.checked_add(reading.value));
        }
        let (Some(&start), Some(&end)) = (sums.keys().next(), sums.keys().next_back()) else {
            continue;
        };

        let mut buckets: Vec<(NaiveDateTime, Option<Decimal>)> = Vec::new();
        let mut t = start;
        while t <= end {
            buckets.push((t, sums.get(&t).copied().unwrap_or(Some(Decimal::ZERO))));
            t = next_mark(t, bucket);
        }

        let first_index = if latest_only { buckets.len() - 1 } else { 0 };
        let mut left = 0;
        for i in first_index..buckets.len() {
            let (bucket_start, short_sum) = buckets[i];
            let window_start = next_mark(bucket_start, bucket) - sustained;
            while left < i && buckets[left].0 < window_start {
                left += 1;
            }

            let point = short_sum.and_then(|short_sum| {
                let sustained_sum = buckets[left..=i]
                    .iter()
                    .try_fold(Decimal::ZERO, |acc, &(_, sum)| acc.checked_add(sum?))?;
                Some(RainAggregate {
                    station_id: station_id.to_string(),
                    station_name: first.station_name.clone(),
                    timestamp: if latest_only { last.timestamp } else { bucket_start },
                    short_sum,
                    sustained_sum,
                    vp: peak_intensity(short_sum, scale, sustained_sum)?,
                })
            });
            match point {
                Some(point) => result.aggregates.push(point),
                None => result.overflowed_points += 1,
            }
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Hourly-window aggregation
// ---------------------------------------------------------------------------

/// One VP point per station, per date with readings, per target hour.
///
/// For target hour `h` on date `d`:
/// - sustained_sum: readings on `d` in `[h − sustained/2, h + sustained/2)`,
///   clipped to the day (2 h default → `[h−1, h+1)`);
/// - short_sum: readings in `[h − short, h)`, which may reach into the
///   previous day.
///
/// Every hour 0..24 is emitted; empty windows give VP = 0. A non-empty
/// `dates` restricts which dates are produced.
pub fn aggregate_hourly_windows(
    readings: &[RainReading],
    short: Duration,
    sustained: Duration,
    dates: &[NaiveDate],
) -> RainAggregation {
    let scale = hourly_scale(short);
    let half = sustained / 2;
    let mut result = RainAggregation::default();

    for (station_id, group) in group_by_station(readings) {
        let Some(first) = group.first() else {
            continue;
        };
        let station_dates: BTreeSet<NaiveDate> = group
            .iter()
            .map(|r| r.timestamp.date())
            .filter(|d| dates.is_empty() || dates.contains(d))
            .collect();

        for date in station_dates {
            let midnight = date.and_time(NaiveTime::MIN);
            let next_midnight = midnight + Duration::days(1);

            for hour in 0..24 {
                let target = midnight + Duration::hours(hour);
                let sustained_sum = sum_between(
                    &group,
                    (target - half).max(midnight),
                    (target + half).min(next_midnight),
                );
                let short_sum = sum_between(&group, target - short, target);

                let point = sustained_sum.zip(short_sum).and_then(|(sustained_sum, short_sum)| {
                    Some(RainAggregate {
                        station_id: station_id.to_string(),
                        station_name: first.station_name.clone(),
                        timestamp: target,
                        short_sum,
                        sustained_sum,
                        vp: peak_intensity(short_sum, scale, sustained_sum)?,
                    })
                });
                match point {
                    Some(point) => result.aggregates.push(point),
                    None => result.overflowed_points += 1,
                }
            }
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
