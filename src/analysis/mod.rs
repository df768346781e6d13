/// Risk analysis pipeline for the Recife tidal flood-risk service.
///
/// Submodules, leaf to root:
/// - `rainfall` — raw readings → per-station VP points.
/// - `tide`     — sparse tide extrema → dense AM curve or AM intervals.
/// - `align`    — matches VP points to AM values (interval or exact grid).
/// - `risk`     — risk value, bin classification, labelled records.
/// - `pipeline` — one configurable run over all of the above.

pub mod align;
pub mod pipeline;
pub mod rainfall;
pub mod risk;
pub mod tide;

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to two decimal places, halves away from zero.
///
/// Every rounding in the pipeline goes through here so interpolated
/// heights, AM values and risk values agree to the cent.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round2_midpoints_go_away_from_zero() {
        assert_eq!(round2(d("9.005")), d("9.01"));
        assert_eq!(round2(d("1.235")), d("1.24"));
        assert_eq!(round2(d("-0.125")), d("-0.13"));
        assert_eq!(round2(d("2.004")), d("2.00"));
    }
}
