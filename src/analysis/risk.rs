/// Risk value and band classification.
///
/// ```text
/// risk_value = round2(round2(VP) × round2(AM))
/// ```
///
/// Bands are half-open on the right, lower edge inclusive:
/// `(-∞, e0)` Low, `[e0, e1)` Moderate, `[e1, e2)` Moderate High,
/// `[e2, +∞)` High. With the default edges a value of exactly 30.00 is
/// Moderate and exactly 100.00 is High. Edges are positive, so zero and
/// negative values (possible when the tide height is negative) fall in Low.

use rust_decimal::Decimal;

use super::align::JoinedPoint;
use super::round2;
use crate::model::{RiskBand, RiskError, RiskRecord};

/// Validated band edges. Construct with [`RiskBins::new`]; the pipeline
/// refuses to run with anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskBins {
    edges: [Decimal; 3],
}

impl Default for RiskBins {
    fn default() -> Self {
        RiskBins {
            edges: [Decimal::from(30), Decimal::from(50), Decimal::from(100)],
        }
    }
}

impl RiskBins {
    /// Exactly three positive, strictly ascending edges.
    pub fn new(edges: &[Decimal]) -> Result<Self, RiskError> {
        let edges: [Decimal; 3] = edges.try_into().map_err(|_| {
            RiskError::Configuration(format!(
                "expected 3 risk bin edges, got {}",
                edges.len()
            ))
        })?;
        if edges[0] <= Decimal::ZERO {
            return Err(RiskError::Configuration(format!(
                "risk bin edges must be positive, got [{}, {}, {}]",
                edges[0], edges[1], edges[2]
            )));
        }
        if !(edges[0] < edges[1] && edges[1] < edges[2]) {
            return Err(RiskError::Configuration(format!(
                "risk bin edges must be strictly ascending, got [{}, {}, {}]",
                edges[0], edges[1], edges[2]
            )));
        }
        Ok(RiskBins { edges })
    }

    pub fn edges(&self) -> &[Decimal; 3] {
        &self.edges
    }

    pub fn classify(&self, value: Decimal) -> RiskBand {
        let [moderate, moderate_high, high] = self.edges;
        if value >= high {
            RiskBand::High
        } else if value >= moderate_high {
            RiskBand::ModerateHigh
        } else if value >= moderate {
            RiskBand::Moderate
        } else {
            RiskBand::Low
        }
    }
}

/// Both operands are rounded to two decimals before multiplying, and the
/// product is rounded again. `None` when the product overflows.
pub fn risk_value(vp: Decimal, am: Decimal) -> Option<Decimal> {
    round2(vp).checked_mul(round2(am)).map(round2)
}

/// Labelled records plus the points whose risk value overflowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub records: Vec<RiskRecord>,
    pub overflowed_points: usize,
}

/// Labels every joined point. One record per point, same order, except
/// points whose product overflows, which are dropped and counted.
pub fn evaluate(joined: &[JoinedPoint], bins: &RiskBins) -> Evaluation {
    let mut result = Evaluation::default();
    for point in joined {
        let vp = round2(point.aggregate.vp);
        let am = round2(point.am);
        let Some(value) = risk_value(vp, am) else {
            result.overflowed_points += 1;
            continue;
        };
        result.records.push(RiskRecord {
            station_id: point.aggregate.station_id.clone(),
            station_name: point.aggregate.station_name.clone(),
            date: point.aggregate.date(),
            time_ref: point.aggregate.time_ref(),
            vp,
            am,
            risk_value: value,
            risk_band: bins.classify(value),
        });
    }
    result
}

/// Output order: date, station name, time, with the station code as the
/// final tiebreaker so two stations sharing a name stay deterministic.
pub fn sort_records(records: &mut [RiskRecord]) {
    records.sort_by(|a, b| {
        (a.date, &a.station_name, a.time_ref, &a.station_id)
            .cmp(&(b.date, &b.station_name, b.time_ref, &b.station_id))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RainAggregate;
    use chrono::{NaiveDate, NaiveTime};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn joined(station: &str, name: &str, day: u32, h: u32, vp: &str, am: &str) -> JoinedPoint {
        JoinedPoint {
            aggregate: RainAggregate {
                station_id: station.into(),
                station_name: name.into(),
                timestamp: NaiveDate::from_ymd_opt(2025, 5, day)
                    .unwrap()
                    .and_hms_opt(h, 0, 0)
                    .unwrap(),
                short_sum: Decimal::ZERO,
                sustained_sum: d(vp),
                vp: d(vp),
            },
            am: d(am),
        }
    }

    #[test]
    fn test_edges_are_lower_inclusive() {
        let bins = RiskBins::default();
        assert_eq!(bins.classify(d("29.99")), RiskBand::Low);
        assert_eq!(bins.classify(d("30.00")), RiskBand::Moderate);
        assert_eq!(bins.classify(d("49.99")), RiskBand::Moderate);
        assert_eq!(bins.classify(d("50.00")), RiskBand::ModerateHigh);
        assert_eq!(bins.classify(d("99.99")), RiskBand::ModerateHigh);
        assert_eq!(bins.classify(d("100.00")), RiskBand::High);
        assert_eq!(bins.classify(d("250")), RiskBand::High);
    }

    #[test]
    fn test_negative_and_zero_values_are_low() {
        let bins = RiskBins::default();
        assert_eq!(bins.classify(Decimal::ZERO), RiskBand::Low);
        assert_eq!(bins.classify(d("-3.50")), RiskBand::Low);
    }

    #[test]
    fn test_risk_value_rounds_operands_then_product() {
        // 9.005 -> 9.01, 1.235 -> 1.24, 9.01 * 1.24 = 11.1724 -> 11.17
        assert_eq!(risk_value(d("9.005"), d("1.235")), Some(d("11.17")));
        assert_eq!(risk_value(d("9.0"), d("2.38")), Some(d("21.42")));
        assert_eq!(risk_value(Decimal::ZERO, d("2.1")), Some(Decimal::ZERO));
    }

    #[test]
    fn test_bins_require_three_ascending_edges() {
        assert!(RiskBins::new(&[d("30"), d("50"), d("100")]).is_ok());
        assert!(RiskBins::new(&[d("30"), d("50")]).is_err());
        assert!(RiskBins::new(&[d("30"), d("30"), d("100")]).is_err());
        assert!(RiskBins::new(&[d("100"), d("50"), d("30")]).is_err());
    }

    #[test]
    fn test_bins_require_positive_edges() {
        assert!(RiskBins::new(&[d("-2"), d("-1"), d("0")]).is_err());
        assert!(RiskBins::new(&[d("0"), d("1"), d("2")]).is_err());
        assert!(RiskBins::new(&[d("0.01"), d("1"), d("2")]).is_ok());
    }

    #[test]
    fn test_overflowing_product_is_dropped_and_counted() {
        let huge = "40000000000000000000000000000";
        assert_eq!(risk_value(d(huge), d("2.25")), None);

        let points = vec![
            joined("261160609A", "Imbiribeira", 14, 10, huge, "2.25"),
            joined("261160609A", "Imbiribeira", 14, 11, "9.0", "2.38"),
        ];
        let evaluation = evaluate(&points, &RiskBins::default());
        assert_eq!(evaluation.overflowed_points, 1);
        assert_eq!(evaluation.records.len(), 1);
        assert_eq!(evaluation.records[0].risk_value, d("21.42"));
    }

    #[test]
    fn test_custom_edges_shift_bands() {
        let bins = RiskBins::new(&[d("10"), d("20"), d("40")]).unwrap();
        assert_eq!(bins.classify(d("15")), RiskBand::Moderate);
        assert_eq!(bins.classify(d("40")), RiskBand::High);
        assert_eq!(bins.edges()[1], d("20"));
    }

    #[test]
    fn test_evaluate_keeps_one_record_per_point() {
        let points = vec![
            joined("261160609A", "Imbiribeira", 14, 10, "9.0", "2.38"),
            joined("261160609A", "Imbiribeira", 14, 11, "45.0", "2.38"),
        ];
        let records = evaluate(&points, &RiskBins::default()).records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].risk_value, d("21.42"));
        assert_eq!(records[0].risk_band, RiskBand::Low);
        assert_eq!(records[1].risk_value, d("107.10"));
        assert_eq!(records[1].risk_band, RiskBand::High);
        assert_eq!(records[1].time_ref, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    }

    #[test]
    fn test_records_sort_by_date_then_name_then_time() {
        let points = vec![
            joined("261160614A", "Campina do Barreto", 15, 9, "1", "1"),
            joined("261160609A", "Imbiribeira", 14, 8, "1", "1"),
            joined("261160614A", "Campina do Barreto", 14, 10, "1", "1"),
            joined("261160614A", "Campina do Barreto", 14, 9, "1", "1"),
        ];
        let mut records = evaluate(&points, &RiskBins::default()).records;
        sort_records(&mut records);

        let order: Vec<(u32, &str, u32)> = records
            .iter()
            .map(|r| {
                use chrono::{Datelike, Timelike};
                (r.date.day(), r.station_name.as_str(), r.time_ref.hour())
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (14, "Campina do Barreto", 9),
                (14, "Campina do Barreto", 10),
                (14, "Imbiribeira", 8),
                (15, "Campina do Barreto", 9),
            ]
        );
    }
}
