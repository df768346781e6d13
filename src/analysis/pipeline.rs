/// One configurable risk run: rain rows + tide rows → labelled records.
///
/// Stages, each consuming the whole output of the previous one:
///
/// 1. validate configuration (fatal on failure)
/// 2. normalize rain, select stations, aggregate per `RainMode`
/// 3. parse tide extrema, build AM values per `TideMode`
/// 4. align per `JoinPolicy`
/// 5. evaluate and sort
///
/// The run performs no I/O beyond logging. Given the same rows and the
/// same configuration it returns the same records in the same order.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::align::{
    intervals_from_points, join_exact_grid, join_intervals, points_from_intervals, Alignment,
};
use super::rainfall::{aggregate_buckets, aggregate_hourly_windows, normalize_readings, RainAggregation};
use super::risk::{evaluate, sort_records};
use super::tide::{direct_intervals, interpolate, parse_tide_rows, standardize};
use crate::config::{JoinPolicy, PipelineConfig, RainMode, TideMode};
use crate::logging::{self, DataSource};
use crate::model::{
    AmInterval, RainAggregate, RainReading, RawRainRow, RawTideRow, RiskError, RiskRecord, RunDiagnostics,
    TideExtremum, TidePoint,
};
use crate::stations::StationRegistry;

/// Records sorted by (date, station name, time), plus the drop report.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub records: Vec<RiskRecord>,
    pub diagnostics: RunDiagnostics,
}

/// AM values in whichever shape the tide mode produces.
#[derive(Debug, Clone, PartialEq)]
pub enum AmSeries {
    Points(Vec<TidePoint>),
    Intervals(Vec<AmInterval>),
}

/// Builds AM values from extrema. Returns the series and the number of
/// degenerate (zero-duration) pairs skipped.
pub fn build_am_series(extrema: &[TideExtremum], config: &PipelineConfig) -> (AmSeries, usize) {
    match config.tide_mode {
        TideMode::Interpolated => {
            let curve = interpolate(extrema, config.tide_step());
            (AmSeries::Points(curve.points), curve.degenerate_intervals)
        }
        TideMode::StandardizedInterpolated => {
            let grid = standardize(
                extrema,
                config.standardize_round(),
                config.standardize_period(),
            );
            let curve = interpolate(&grid, config.tide_step());
            (AmSeries::Points(curve.points), curve.degenerate_intervals)
        }
        TideMode::DirectInterval => {
            let set = direct_intervals(extrema);
            (AmSeries::Intervals(set.intervals), set.degenerate_intervals)
        }
    }
}

/// Joins aggregates to AM values, converting the series shape when the
/// policy needs the other one.
pub fn align(aggregates: &[RainAggregate], series: &AmSeries, policy: JoinPolicy) -> Alignment {
    match (policy, series) {
        (JoinPolicy::Interval, AmSeries::Intervals(intervals)) => {
            join_intervals(aggregates, intervals)
        }
        (JoinPolicy::Interval, AmSeries::Points(points)) => {
            join_intervals(aggregates, &intervals_from_points(points))
        }
        (JoinPolicy::ExactGrid, AmSeries::Points(points)) => join_exact_grid(aggregates, points),
        (JoinPolicy::ExactGrid, AmSeries::Intervals(intervals)) => {
            join_exact_grid(aggregates, &points_from_intervals(intervals))
        }
    }
}

fn aggregate(readings: &[RainReading], config: &PipelineConfig) -> RainAggregation {
    match config.rain_mode {
        RainMode::Latest => aggregate_buckets(readings, config.bucket(), config.sustained(), true),
        RainMode::Bucketed => {
            aggregate_buckets(readings, config.bucket(), config.sustained(), false)
        }
        RainMode::HourlyWindows => {
            aggregate_hourly_windows(readings, config.bucket(), config.sustained(), &config.dates)
        }
    }
}

/// Runs the full pipeline.
///
/// Fails only on invalid configuration. Bad rows, missing tide coverage,
/// degenerate tide pairs and points whose arithmetic overflows are
/// dropped and counted in the diagnostics.
/// A date with no tide extremum at all yields no records, whatever the
/// tide mode.
pub fn run_pipeline(
    rain: &[RawRainRow],
    tide: &[RawTideRow],
    config: &PipelineConfig,
    registry: &StationRegistry,
) -> Result<PipelineOutput, RiskError> {
    let bins = config.validate()?;
    let offset = config.offset()?;

    let mut diagnostics = RunDiagnostics {
        rain_rows: rain.len(),
        tide_rows: tide.len(),
        ..RunDiagnostics::default()
    };

    // -- Rain --------------------------------------------------------------
    let normalized = normalize_readings(rain, config.sensor_id, offset, registry);
    diagnostics.malformed_rain_rows = normalized.malformed_rows;
    diagnostics.other_sensor_rows = normalized.other_sensor_rows;

    let (readings, unselected): (Vec<_>, Vec<_>) = normalized
        .readings
        .into_iter()
        .partition(|r| config.stations.is_empty() || config.stations.contains(&r.station_name));
    diagnostics.unselected_rain_rows = unselected.len();

    let aggregation = aggregate(&readings, config);
    diagnostics.overflowed_points = aggregation.overflowed_points;
    let mut aggregates = aggregation.aggregates;
    if !config.dates.is_empty() {
        aggregates.retain(|a| config.dates.contains(&a.date()));
    }
    diagnostics.aggregates = aggregates.len();

    // -- Tide --------------------------------------------------------------
    let (extrema, malformed_tide) = parse_tide_rows(tide);
    diagnostics.malformed_tide_rows = malformed_tide;
    if malformed_tide > 0 {
        logging::warn(
            DataSource::Tide,
            None,
            &format!("{} tide rows could not be parsed", malformed_tide),
        );
    }

    let tide_dates: BTreeSet<NaiveDate> = extrema.iter().map(|e| e.timestamp.date()).collect();
    let (covered, uncovered): (Vec<RainAggregate>, Vec<RainAggregate>) = aggregates
        .into_iter()
        .partition(|a| tide_dates.contains(&a.date()));
    let missing: BTreeSet<NaiveDate> = uncovered.iter().map(RainAggregate::date).collect();
    for date in &missing {
        logging::warn(
            DataSource::Tide,
            None,
            &format!("no tide observations for {}; its VP points are excluded", date),
        );
    }
    diagnostics.dates_without_tide = missing.into_iter().collect();

    let (series, degenerate) = build_am_series(&extrema, config);
    diagnostics.degenerate_intervals = degenerate;

    // -- Join + evaluate ---------------------------------------------------
    let alignment = align(&covered, &series, config.join_policy);
    diagnostics.overlapping_intervals = alignment.overlapping_intervals;
    diagnostics.unmatched_aggregates = alignment.unmatched + uncovered.len();
    if alignment.overlapping_intervals > 0 {
        logging::warn(
            DataSource::Pipeline,
            None,
            &format!(
                "{} overlapping AM intervals; earliest start wins",
                alignment.overlapping_intervals
            ),
        );
    }

    let evaluation = evaluate(&alignment.joined, &bins);
    diagnostics.overflowed_points += evaluation.overflowed_points;
    if diagnostics.overflowed_points > 0 {
        logging::warn(
            DataSource::Pipeline,
            None,
            &format!(
                "{} points dropped: values too large to compute",
                diagnostics.overflowed_points
            ),
        );
    }

    let mut records = evaluation.records;
    sort_records(&mut records);
    diagnostics.records = records.len();

    logging::log_run_summary(&diagnostics);

    Ok(PipelineOutput {
        records,
        diagnostics,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RiskBand, TideWhen};
    use chrono::{NaiveTime, Timelike};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rain(station: &str, name: &str, utc: &str, value: &str) -> RawRainRow {
        RawRainRow {
            station_id: station.into(),
            station_name: name.into(),
            timestamp: utc.into(),
            sensor_id: Some("10".into()),
            value: value.into(),
        }
    }

    fn tide(date: &str, time: &str, height: &str) -> RawTideRow {
        RawTideRow {
            when: TideWhen::Split {
                date: date.into(),
                time: time.into(),
            },
            height: height.into(),
        }
    }

    /// Imbiribeira, 14 May 2025 local: 3 mm over 11:00..11:40, 1 mm at 12:05.
    fn rain_rows() -> Vec<RawRainRow> {
        vec![
            rain("261160609A", "Imbiribeira", "2025-05-14 14:00:00.0", "1,0"),
            rain("261160609A", "Imbiribeira", "2025-05-14 14:20:00.0", "1,0"),
            rain("261160609A", "Imbiribeira", "2025-05-14 14:40:00.0", "1,0"),
            rain("261160609A", "Imbiribeira", "2025-05-14 15:05:00.0", "1,0"),
            rain("261160609A", "Imbiribeira", "2025-05-14 15:06:00.0", "oops"),
        ]
    }

    fn tide_rows() -> Vec<RawTideRow> {
        vec![
            tide("14/05/2025", "03:47", "2,1"),
            tide("14/05/2025", "09:58", "0,4"),
            tide("14/05/2025", "16:10", "2,0"),
            tide("14/05/2025", "22:31", "0,5"),
        ]
    }

    #[test]
    fn test_live_run_scores_latest_bucket() {
        let output = run_pipeline(
            &rain_rows(),
            &tide_rows(),
            &PipelineConfig::live(),
            &StationRegistry::recife(),
        )
        .unwrap();

        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        // Latest bucket 12:00 holds 1 mm; trailing 2 h (10:10..12:10) holds 4 mm.
        assert_eq!(record.vp, d("10"));
        assert_eq!(record.time_ref, NaiveTime::from_hms_opt(12, 5, 0).unwrap());
        // 12:05 falls in [09:58, 16:10): (0.4 - 2.0)/6 + 0.4 = 0.1333 -> 0.13
        assert_eq!(record.am, d("0.13"));
        assert_eq!(record.risk_value, d("1.30"));
        assert_eq!(record.risk_band, RiskBand::Low);
        assert_eq!(output.diagnostics.malformed_rain_rows, 1);
    }

    #[test]
    fn test_interval_run_drops_uncovered_buckets() {
        let mut rows = rain_rows();
        // 01:00 local, before the first tide observation of the day.
        rows.push(rain("261160609A", "Imbiribeira", "2025-05-14 04:00:00.0", "0,2"));
        let output = run_pipeline(
            &rows,
            &tide_rows(),
            &PipelineConfig::interval(),
            &StationRegistry::recife(),
        )
        .unwrap();

        let diag = &output.diagnostics;
        assert!(diag.unmatched_aggregates > 0);
        assert_eq!(diag.records + diag.unmatched_aggregates, diag.aggregates);
        assert!(output.records.iter().all(|r| r.time_ref >= NaiveTime::from_hms_opt(3, 47, 0).unwrap()));
    }

    #[test]
    fn test_historical_run_emits_hourly_grid() {
        let output = run_pipeline(
            &rain_rows(),
            &tide_rows(),
            &PipelineConfig::historical(),
            &StationRegistry::recife(),
        )
        .unwrap();

        // Standardized extrema at 04:00, 10:00, 16:00, 22:00: hours 4..=22 are covered.
        assert_eq!(output.records.len(), 19);
        assert!(output.records.iter().all(|r| r.time_ref.minute() == 0));
        assert_eq!(output.records[0].time_ref.hour(), 4);
        assert_eq!(output.records[0].am, d("2.1"));
        assert_eq!(output.diagnostics.unmatched_aggregates, 5);
    }

    #[test]
    fn test_day_without_tide_yields_no_records() {
        let mut rows = rain_rows();
        rows.push(rain("261160609A", "Imbiribeira", "2025-05-15 14:00:00.0", "5,0"));
        let output = run_pipeline(
            &rows,
            &tide_rows(),
            &PipelineConfig::interval(),
            &StationRegistry::recife(),
        )
        .unwrap();

        let day15 = NaiveDate::from_ymd_opt(2025, 5, 15).unwrap();
        assert!(output.records.iter().all(|r| r.date != day15));
        assert_eq!(output.diagnostics.dates_without_tide, vec![day15]);
    }

    #[test]
    fn test_station_selection_is_counted() {
        let mut rows = rain_rows();
        rows.push(rain("261160614A", "Campina do Barreto", "2025-05-14 14:00:00.0", "2,0"));
        let config = PipelineConfig {
            stations: vec!["Campina do Barreto".into()],
            ..PipelineConfig::live()
        };
        let output = run_pipeline(&rows, &tide_rows(), &config, &StationRegistry::recife()).unwrap();

        assert_eq!(output.diagnostics.unselected_rain_rows, 4);
        assert!(output.records.iter().all(|r| r.station_name == "Campina do Barreto"));
    }

    #[test]
    fn test_invalid_configuration_refuses_to_run() {
        let config = PipelineConfig {
            bin_edges: vec![d("50"), d("30"), d("100")],
            ..PipelineConfig::live()
        };
        let result = run_pipeline(&rain_rows(), &tide_rows(), &config, &StationRegistry::recife());
        assert!(matches!(result, Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_huge_reading_is_counted_not_fatal() {
        let rows = vec![
            rain("261160609A", "Imbiribeira", "2025-05-14 14:00:00.0", "1e27"),
            rain("261160609A", "Imbiribeira", "2025-05-14 14:10:00.0", "1,0"),
        ];
        let tides = vec![tide("14/05/2025", "09:58", "50"), tide("14/05/2025", "16:10", "2,0")];
        let output = run_pipeline(&rows, &tides, &PipelineConfig::live(), &StationRegistry::recife()).unwrap();

        assert_eq!(output.diagnostics.malformed_rain_rows, 1);
        assert_eq!(output.diagnostics.overflowed_points, 0);
        assert_eq!(output.records.len(), 1);
        // 11:10 local: 1 mm x6 + 1 mm = 7; AM = (50 - 2)/6 + 50 = 58.
        assert_eq!(output.records[0].vp, d("7"));
        assert_eq!(output.records[0].am, d("58"));
        assert_eq!(output.records[0].risk_value, d("406"));
        assert_eq!(output.records[0].risk_band, RiskBand::High);
    }

    #[test]
    fn test_oversized_window_refuses_to_run() {
        let config = PipelineConfig {
            bucket_minutes: 200_000_000_000,
            ..PipelineConfig::interval()
        };
        let result = run_pipeline(&rain_rows(), &tide_rows(), &config, &StationRegistry::recife());
        assert!(matches!(result, Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_runs_are_idempotent() {
        let config = PipelineConfig::interval();
        let registry = StationRegistry::recife();
        let first = run_pipeline(&rain_rows(), &tide_rows(), &config, &registry).unwrap();
        let second = run_pipeline(&rain_rows(), &tide_rows(), &config, &registry).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_interpolated_points_feed_interval_join() {
        let config = PipelineConfig {
            tide_mode: TideMode::Interpolated,
            ..PipelineConfig::interval()
        };
        let output =
            run_pipeline(&rain_rows(), &tide_rows(), &config, &StationRegistry::recife()).unwrap();
        assert!(!output.records.is_empty());
        assert_eq!(output.diagnostics.overlapping_intervals, 0);
    }
}
