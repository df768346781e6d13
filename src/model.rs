/// RawRainRow, RawTideRow, RainReading, RainAggregate, TideExtremum, TidePoint,
/// AmInterval, RiskBand, RiskRecord, RunDiagnostics, RiskError
///
/// Core data types for the Recife tidal flood-risk service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no analysis logic, only types and the small
/// accessors that belong to them.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sensor codes
// ---------------------------------------------------------------------------

/// CEMADEN sensor id for the tipping-bucket rain gauge (mm per reading).
pub const SENSOR_RAIN_GAUGE: u32 = 10;

// ---------------------------------------------------------------------------
// Raw input rows (as delivered by the telemetry and tide collaborators)
// ---------------------------------------------------------------------------

/// One rain reading exactly as the telemetry source or a flat-file export
/// delivers it. Every field is still text; the normalizer decides what is
/// usable and counts what is not.
///
/// Serde names follow the CEMADEN JSON payload and the daily archive CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRainRow {
    #[serde(rename = "codestacao")]
    pub station_id: String,
    #[serde(rename = "nome")]
    pub station_name: String,
    /// ISO 8601, UTC, e.g. "2025-05-14 13:10:00.0".
    #[serde(rename = "datahora")]
    pub timestamp: String,
    /// `None` when the source was already filtered to one sensor.
    #[serde(rename = "id_sensor")]
    pub sensor_id: Option<String>,
    /// Millimetres, decimal comma or decimal point.
    #[serde(rename = "valor")]
    pub value: String,
}

/// When a tide observation happened, in whichever shape the table uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TideWhen {
    /// Separate `data` (DD/MM/YYYY) and `hora` (HH:MM) columns.
    Split { date: String, time: String },
    /// A single combined local timestamp column.
    Combined(String),
}

/// One tide-table row (an observed high or low tide), still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTideRow {
    pub when: TideWhen,
    /// Metres, decimal comma or decimal point.
    pub height: String,
}

// ---------------------------------------------------------------------------
// Normalized series
// ---------------------------------------------------------------------------

/// A rain reading after sensor filtering, UTC → local conversion and
/// numeric parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RainReading {
    pub station_id: String,
    pub station_name: String,
    /// Naive local time (Recife).
    pub timestamp: NaiveDateTime,
    pub value: Decimal,
}

/// One "VP point": the rainfall index for a station at one time bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct RainAggregate {
    pub station_id: String,
    pub station_name: String,
    /// Local time the aggregate is referenced to (bucket start, target
    /// hour, or latest reading).
    pub timestamp: NaiveDateTime,
    /// Rain in the short window (default 10 minutes), mm.
    pub short_sum: Decimal,
    /// Rain in the sustained window (default 2 hours), mm.
    pub sustained_sum: Decimal,
    /// short_sum scaled to an hourly rate plus sustained_sum.
    pub vp: Decimal,
}

impl RainAggregate {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time_ref(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// An observed high or low tide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TideExtremum {
    pub timestamp: NaiveDateTime,
    pub height: Decimal,
}

/// One "AM point" of the dense reconstructed tide curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TidePoint {
    pub timestamp: NaiveDateTime,
    pub height: Decimal,
}

/// A half-open interval `[start, end)` carrying a single AM value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub am: Decimal,
}

impl AmInterval {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

// ---------------------------------------------------------------------------
// Risk output
// ---------------------------------------------------------------------------

/// Risk bands, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    ModerateHigh,
    High,
}

impl RiskBand {
    /// All bands, most severe first (report order).
    pub const DESCENDING: [RiskBand; 4] = [
        RiskBand::High,
        RiskBand::ModerateHigh,
        RiskBand::Moderate,
        RiskBand::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Moderate => "moderate",
            RiskBand::ModerateHigh => "moderate_high",
            RiskBand::High => "high",
        }
    }

    /// Position in ascending order; indexes label and edge tables.
    pub fn index(&self) -> usize {
        match self {
            RiskBand::Low => 0,
            RiskBand::Moderate => 1,
            RiskBand::ModerateHigh => 2,
            RiskBand::High => 3,
        }
    }

    /// Marker colour used by the risk diagram.
    pub fn colour(&self) -> &'static str {
        match self {
            RiskBand::Low => "#4CAF50",
            RiskBand::Moderate => "#FFC107",
            RiskBand::ModerateHigh => "#FFA500",
            RiskBand::High => "#D32F2F",
        }
    }
}

/// A labelled risk point, ready for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRecord {
    pub station_id: String,
    pub station_name: String,
    pub date: NaiveDate,
    pub time_ref: NaiveTime,
    pub vp: Decimal,
    pub am: Decimal,
    pub risk_value: Decimal,
    pub risk_band: RiskBand,
}

/// What a pipeline run excluded, and why.
///
/// Missing coverage (no tide for a rain point) is tracked separately from
/// malformed rows so the two can be told apart in logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDiagnostics {
    pub rain_rows: usize,
    pub malformed_rain_rows: usize,
    pub other_sensor_rows: usize,
    pub unselected_rain_rows: usize,
    pub aggregates: usize,
    pub tide_rows: usize,
    pub malformed_tide_rows: usize,
    pub degenerate_intervals: usize,
    pub overlapping_intervals: usize,
    pub unmatched_aggregates: usize,
    /// VP points or risk values too large for exact decimal arithmetic.
    pub overflowed_points: usize,
    pub dates_without_tide: Vec<NaiveDate>,
    pub records: usize,
}

impl RunDiagnostics {
    /// Input rows rejected as unparseable.
    pub fn malformed_rows(&self) -> usize {
        self.malformed_rain_rows + self.malformed_tide_rows
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that stop an operation outright. Per-row problems never surface
/// here; they are counted in `RunDiagnostics` instead.
#[derive(Debug, PartialEq)]
pub enum RiskError {
    /// Invalid pipeline configuration; the pipeline refuses to run.
    Configuration(String),
    /// A file or payload could not be parsed as a whole.
    Parse(String),
    /// Filesystem failure reading or writing flat files.
    Io(String),
    /// Non-2xx HTTP response from the telemetry API.
    HttpError(u16),
    /// The request itself failed (connection, timeout, TLS).
    Request(String),
    /// Token endpoint answered without a token.
    NoToken,
    /// The source returned nothing for a station.
    NoDataAvailable(String),
}

impl std::fmt::Display for RiskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            RiskError::Parse(msg) => write!(f, "Parse error: {}", msg),
            RiskError::Io(msg) => write!(f, "I/O error: {}", msg),
            RiskError::HttpError(code) => write!(f, "HTTP error: {}", code),
            RiskError::Request(msg) => write!(f, "Request failed: {}", msg),
            RiskError::NoToken => write!(f, "Token response did not contain a token"),
            RiskError::NoDataAvailable(station) => {
                write!(f, "No data available for station: {}", station)
            }
        }
    }
}

impl std::error::Error for RiskError {}

impl From<std::io::Error> for RiskError {
    fn from(err: std::io::Error) -> Self {
        RiskError::Io(err.to_string())
    }
}

impl From<csv::Error> for RiskError {
    fn from(err: csv::Error) -> Self {
        RiskError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        RiskError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for RiskError {
    fn from(err: toml::de::Error) -> Self {
        RiskError::Configuration(err.to_string())
    }
}

impl From<reqwest::Error> for RiskError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RiskError::HttpError(status.as_u16()),
            None => RiskError::Request(err.to_string()),
        }
    }
}
