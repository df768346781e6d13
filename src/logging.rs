/// Structured logging for the flood-risk service
///
/// Every entry carries a data source tag and, where it applies, the
/// station code. Console output is always on once the logger is
/// initialised; a log file can be added for scheduled archive runs.
/// Until `init_logger` is called every message is dropped, which keeps
/// library callers and tests quiet.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::{RiskError, RunDiagnostics};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// CEMADEN telemetry API.
    Cemaden,
    /// Rain flat files.
    Rain,
    /// Tide tables.
    Tide,
    Pipeline,
    /// Daily rain archive.
    Archive,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Cemaden => write!(f, "CEMADEN"),
            DataSource::Rain => write!(f, "RAIN"),
            DataSource::Tide => write!(f, "TIDE"),
            DataSource::Pipeline => write!(f, "PIPE"),
            DataSource::Archive => write!(f, "ARCH"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Station returned nothing; gauges go quiet in dry spells and during
    /// maintenance.
    Expected,
    /// HTTP or parse failure; the service or its contract changed.
    Unexpected,
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    fn new(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) -> Self {
        Logger {
            min_level,
            log_file,
            console_timestamps,
        }
    }

    fn format_entry(level: LogLevel, source: DataSource, station: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, source, station_part, message)
    }

    fn log(&self, level: LogLevel, source: DataSource, station: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let entry = Self::format_entry(level, source, station, message);
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("   {}", entry),
                LogLevel::Info | LogLevel::Debug => println!("   {}", entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, station_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, station_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger::new(min_level, log_file.map(String::from), console_timestamps);
    let mut slot = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(logger);
}

fn emit(level: LogLevel, source: DataSource, station: Option<&str>, message: &str) {
    let slot = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(logger) = slot.as_ref() {
        logger.log(level, source, station, message);
    }
}

/// Log a general informational message
pub fn info(source: DataSource, station: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, station, message);
}

/// Log a warning message
pub fn warn(source: DataSource, station: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, station, message);
}

/// Log an error message
pub fn error(source: DataSource, station: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, station, message);
}

/// Log a debug message
pub fn debug(source: DataSource, station: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, station, message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Classify a telemetry fetch failure
pub fn classify_fetch_failure(err: &RiskError) -> FailureType {
    match err {
        RiskError::NoDataAvailable(_) => FailureType::Expected,
        RiskError::HttpError(_) | RiskError::Parse(_) | RiskError::NoToken => {
            FailureType::Unexpected
        }
        RiskError::Request(msg) if msg.contains("timed out") => FailureType::Unexpected,
        _ => FailureType::Unknown,
    }
}

/// Log a per-station telemetry failure with automatic classification
pub fn log_fetch_failure(station: &str, operation: &str, err: &RiskError) {
    let failure_type = classify_fetch_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(DataSource::Cemaden, Some(station), &message),
        FailureType::Unexpected => error(DataSource::Cemaden, Some(station), &message),
        FailureType::Unknown => warn(DataSource::Cemaden, Some(station), &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Level for a run summary: Info when nothing was dropped, Error when
/// nothing survived, Warning otherwise.
pub fn summary_level(diagnostics: &RunDiagnostics) -> LogLevel {
    let dropped = diagnostics.malformed_rows()
        + diagnostics.degenerate_intervals
        + diagnostics.unmatched_aggregates
        + diagnostics.overflowed_points;
    if diagnostics.records == 0 && diagnostics.aggregates > 0 {
        LogLevel::Error
    } else if dropped > 0 || !diagnostics.dates_without_tide.is_empty() {
        LogLevel::Warning
    } else {
        LogLevel::Info
    }
}

/// Log what a pipeline run produced and what it excluded
pub fn log_run_summary(diagnostics: &RunDiagnostics) {
    let message = format!(
        "Run complete: {} records from {} VP points; dropped {} malformed rain rows, \
         {} malformed tide rows, {} degenerate tide intervals, {} unmatched VP points, \
         {} overflowed points",
        diagnostics.records,
        diagnostics.aggregates,
        diagnostics.malformed_rain_rows,
        diagnostics.malformed_tide_rows,
        diagnostics.degenerate_intervals,
        diagnostics.unmatched_aggregates,
        diagnostics.overflowed_points,
    );
    emit(summary_level(diagnostics), DataSource::Pipeline, None, &message);
}

/// Log a summary of a multi-station fetch
pub fn log_fetch_summary(total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Fetch complete: {}/{} stations successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(DataSource::Cemaden, None, &message);
    } else if successful == 0 {
        error(DataSource::Cemaden, None, &message);
    } else {
        warn(DataSource::Cemaden, None, &message);
    }
}
