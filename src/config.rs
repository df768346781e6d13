/// Service configuration loader - parses recife.toml
///
/// Separates pipeline settings and station metadata from code, making it
/// easy to adjust windows, bin edges or the station list without
/// recompiling the service.
///
/// ```toml
/// [pipeline]
/// rain_mode = "latest"
/// bin_edges = [30, 50, 100]
///
/// [archive]
/// station_codes = ["261160609A", "261160603A"]
///
/// [[station]]
/// code = "261160609A"
/// name = "Imbiribeira"
/// ```

use chrono::{Duration, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::analysis::risk::RiskBins;
use crate::model::{RiskBand, RiskError, SENSOR_RAIN_GAUGE};
use crate::stations::{Station, StationRegistry};

// ---------------------------------------------------------------------------
// Pipeline strategy selection
// ---------------------------------------------------------------------------

/// How raw rain readings become VP points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RainMode {
    /// Only each station's most recent bucket (live polling).
    Latest,
    /// Every bucket between a station's first and last reading.
    Bucketed,
    /// One point per target hour using explicit windows (multi-day history).
    HourlyWindows,
}

/// How tide observations become AM values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TideMode {
    /// Linear interpolation between the observed extrema as given.
    Interpolated,
    /// Snap to a fixed semidiurnal grid first, then interpolate.
    StandardizedInterpolated,
    /// Constant AM per same-day observation interval.
    DirectInterval,
}

/// How VP points are matched to AM values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// A point inherits the AM of the `[start, end)` interval containing it.
    Interval,
    /// Inner join on identical (date, time) keys.
    ExactGrid,
}

/// The three operating modes of the risk diagrams, as presets over the
/// strategy enums above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    Live,
    Historical,
    Interval,
}

impl std::str::FromStr for PipelineMode {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(PipelineMode::Live),
            "historical" => Ok(PipelineMode::Historical),
            "interval" => Ok(PipelineMode::Interval),
            other => Err(RiskError::Configuration(format!(
                "unknown mode '{}' (expected live, historical or interval)",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Upper bound for every window and step setting.
pub const MAX_WINDOW_MINUTES: i64 = 24 * 60;

/// All tunables of the analysis pipeline. Pure data: nothing here performs
/// I/O, and the same config on the same inputs always yields the same output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Only readings from this sensor id are used.
    pub sensor_id: u32,
    /// Short-window / bucket width in minutes.
    pub bucket_minutes: i64,
    /// Sustained accumulation window in minutes.
    pub sustained_minutes: i64,
    /// Spacing of the interpolated tide curve in minutes.
    pub tide_step_minutes: i64,
    /// Fixed spacing between standardized extrema in minutes.
    pub standardize_period_minutes: i64,
    /// Granularity the first extremum is rounded to in minutes.
    pub standardize_round_minutes: i64,
    /// Local offset from UTC in minutes (Recife: -180).
    pub utc_offset_minutes: i32,
    /// Lower edges of Moderate, ModerateHigh and High.
    pub bin_edges: Vec<Decimal>,
    /// Display labels for Low, Moderate, ModerateHigh, High.
    pub band_labels: Vec<String>,
    pub rain_mode: RainMode,
    pub tide_mode: TideMode,
    pub join_policy: JoinPolicy,
    /// Station names to keep; empty keeps all.
    pub stations: Vec<String>,
    /// Local dates to keep; empty keeps all.
    pub dates: Vec<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig::live()
    }
}

impl PipelineConfig {
    /// Live polling: latest bucket per station, interval AM, interval join.
    pub fn live() -> Self {
        PipelineConfig {
            sensor_id: SENSOR_RAIN_GAUGE,
            bucket_minutes: 10,
            sustained_minutes: 120,
            tide_step_minutes: 60,
            standardize_period_minutes: 360,
            standardize_round_minutes: 30,
            utc_offset_minutes: -180,
            bin_edges: vec![Decimal::from(30), Decimal::from(50), Decimal::from(100)],
            band_labels: vec![
                "Low".to_string(),
                "Moderate".to_string(),
                "Moderate High".to_string(),
                "High".to_string(),
            ],
            rain_mode: RainMode::Latest,
            tide_mode: TideMode::DirectInterval,
            join_policy: JoinPolicy::Interval,
            stations: Vec::new(),
            dates: Vec::new(),
        }
    }

    /// Fixed-period history: hourly windows, standardized + interpolated
    /// tide, exact hourly grid join.
    pub fn historical() -> Self {
        PipelineConfig::live().with_mode(PipelineMode::Historical)
    }

    /// Every rain bucket against per-interval AM values.
    pub fn interval() -> Self {
        PipelineConfig::live().with_mode(PipelineMode::Interval)
    }

    /// Replaces the three strategy selections with a mode preset, keeping
    /// every other setting.
    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        let (rain, tide, join) = match mode {
            PipelineMode::Live => (RainMode::Latest, TideMode::DirectInterval, JoinPolicy::Interval),
            PipelineMode::Historical => (
                RainMode::HourlyWindows,
                TideMode::StandardizedInterpolated,
                JoinPolicy::ExactGrid,
            ),
            PipelineMode::Interval => {
                (RainMode::Bucketed, TideMode::DirectInterval, JoinPolicy::Interval)
            }
        };
        self.rain_mode = rain;
        self.tide_mode = tide;
        self.join_policy = join;
        self
    }

    // Duration accessors. Only meaningful after `validate` has passed.

    pub fn bucket(&self) -> Duration {
        Duration::minutes(self.bucket_minutes)
    }

    pub fn sustained(&self) -> Duration {
        Duration::minutes(self.sustained_minutes)
    }

    pub fn tide_step(&self) -> Duration {
        Duration::minutes(self.tide_step_minutes)
    }

    pub fn standardize_period(&self) -> Duration {
        Duration::minutes(self.standardize_period_minutes)
    }

    pub fn standardize_round(&self) -> Duration {
        Duration::minutes(self.standardize_round_minutes)
    }

    /// The local timezone as a fixed offset.
    pub fn offset(&self) -> Result<FixedOffset, RiskError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            RiskError::Configuration(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Display label for a band.
    pub fn label(&self, band: RiskBand) -> &str {
        self.band_labels
            .get(band.index())
            .map(String::as_str)
            .unwrap_or(band.as_str())
    }

    /// Checks every setting the pipeline depends on and returns the
    /// validated risk bins. Any failure here is fatal.
    ///
    /// Every window lies in `1..=MAX_WINDOW_MINUTES` and the bucket never
    /// exceeds the sustained window, so the duration accessors above and
    /// the date arithmetic built on them cannot overflow once this passes.
    pub fn validate(&self) -> Result<RiskBins, RiskError> {
        let windows = [
            ("bucket_minutes", self.bucket_minutes),
            ("sustained_minutes", self.sustained_minutes),
            ("tide_step_minutes", self.tide_step_minutes),
            ("standardize_period_minutes", self.standardize_period_minutes),
            ("standardize_round_minutes", self.standardize_round_minutes),
        ];
        for (name, value) in windows {
            if value <= 0 {
                return Err(RiskError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
            if value > MAX_WINDOW_MINUTES {
                return Err(RiskError::Configuration(format!(
                    "{} must be at most {} (one day), got {}",
                    name, MAX_WINDOW_MINUTES, value
                )));
            }
        }
        if self.bucket_minutes > self.sustained_minutes {
            return Err(RiskError::Configuration(format!(
                "bucket_minutes ({}) must not exceed sustained_minutes ({})",
                self.bucket_minutes, self.sustained_minutes
            )));
        }
        if self.band_labels.len() != 4 {
            return Err(RiskError::Configuration(format!(
                "expected 4 band labels, got {}",
                self.band_labels.len()
            )));
        }
        self.offset()?;
        RiskBins::new(&self.bin_edges)
    }
}

// ---------------------------------------------------------------------------
// Configuration file
// ---------------------------------------------------------------------------

/// Stations polled by the daily rain archive job. The archive may cover
/// gauges the risk diagrams do not use.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// CEMADEN station codes; empty means every registry station.
    pub station_codes: Vec<String>,
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pipeline: PipelineConfig,
    #[serde(default)]
    archive: ArchiveConfig,
    #[serde(default)]
    station: Vec<Station>,
}

/// Validated service configuration: pipeline settings, archive settings
/// and the station registry.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub pipeline: PipelineConfig,
    pub archive: ArchiveConfig,
    pub registry: StationRegistry,
}

impl ServiceConfig {
    /// (code, name) pairs for the archive job. Codes missing from the
    /// registry are named by their code.
    pub fn archive_stations(&self) -> Vec<(&str, &str)> {
        if self.archive.station_codes.is_empty() {
            return self
                .registry
                .stations()
                .iter()
                .map(|s| (s.code.as_str(), s.name.as_str()))
                .collect();
        }
        self.archive
            .station_codes
            .iter()
            .map(|code| (code.as_str(), self.registry.name_for(code).unwrap_or(code.as_str())))
            .collect()
    }
}

/// Parses configuration text. An empty `[[station]]` list falls back to
/// the built-in Recife registry.
pub fn parse_config(text: &str) -> Result<ServiceConfig, RiskError> {
    let file: ConfigFile = toml::from_str(text)?;
    file.pipeline.validate()?;

    let registry = if file.station.is_empty() {
        StationRegistry::recife()
    } else {
        StationRegistry::new(file.station)
    };

    Ok(ServiceConfig {
        pipeline: file.pipeline,
        archive: file.archive,
        registry,
    })
}

/// Loads configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, RiskError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| RiskError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&contents)
}

/// Loads configuration from the default location (recife.toml)
pub fn load_config_default() -> Result<ServiceConfig, RiskError> {
    load_config("recife.toml")
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// CEMADEN account used for the token handshake.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Reads `CEMADEN_EMAIL` / `CEMADEN_PASSWORD`, loading `.env` first.
pub fn credentials_from_env() -> Result<Credentials, RiskError> {
    dotenv::dotenv().ok();
    let email = env::var("CEMADEN_EMAIL")
        .map_err(|_| RiskError::Configuration("CEMADEN_EMAIL is not set".to_string()))?;
    let password = env::var("CEMADEN_PASSWORD")
        .map_err(|_| RiskError::Configuration("CEMADEN_PASSWORD is not set".to_string()))?;
    if email.trim().is_empty() || password.is_empty() {
        return Err(RiskError::Configuration(
            "CEMADEN credentials are empty".to_string(),
        ));
    }
    Ok(Credentials { email, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_succeeds() {
        let config = load_config_default().expect("recife.toml should load");
        assert!(config.registry.stations().len() >= 4, "Should have at least 4 stations");
    }

    #[test]
    fn test_default_file_uses_live_preset_and_recife_offset() {
        let config = load_config_default().expect("recife.toml should load");
        assert_eq!(config.pipeline.rain_mode, RainMode::Latest);
        assert_eq!(config.pipeline.utc_offset_minutes, -180);
        assert_eq!(config.pipeline.sensor_id, 10);
    }

    #[test]
    fn test_default_file_archives_all_five_gauges() {
        let config = load_config_default().expect("recife.toml should load");
        let stations = config.archive_stations();
        assert_eq!(stations.len(), 5);
        assert!(stations.contains(&("261160609A", "Imbiribeira")));
        // Not in the registry: named by its code.
        assert!(stations.contains(&("261160603A", "261160603A")));
    }

    #[test]
    fn test_archive_defaults_to_registry() {
        let config = parse_config("[pipeline]\n").expect("should parse");
        assert!(config.archive.station_codes.is_empty());
        assert_eq!(config.archive_stations().len(), StationRegistry::recife().stations().len());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = parse_config("[pipeline]\nbucket_minutes = 15\n").expect("should parse");
        assert_eq!(config.pipeline.bucket_minutes, 15);
        assert_eq!(config.pipeline.sustained_minutes, 120);
        assert_eq!(config.pipeline.bin_edges.len(), 3);
        // No [[station]] tables: built-in registry.
        assert_eq!(config.registry, StationRegistry::recife());
    }

    #[test]
    fn test_modes_parse_from_toml() {
        let text = r#"
            [pipeline]
            rain_mode = "hourly_windows"
            tide_mode = "standardized_interpolated"
            join_policy = "exact_grid"
            dates = ["2025-05-14", "2025-05-15"]
        "#;
        let config = parse_config(text).expect("should parse");
        assert_eq!(config.pipeline, PipelineConfig {
            dates: vec![
                NaiveDate::from_ymd_opt(2025, 5, 14).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
            ],
            ..PipelineConfig::historical()
        });
    }

    #[test]
    fn test_non_monotonic_edges_are_fatal() {
        let err = parse_config("[pipeline]\nbin_edges = [30, 100, 50]\n").unwrap_err();
        assert!(matches!(err, RiskError::Configuration(_)), "got {:?}", err);
    }

    #[test]
    fn test_non_positive_bucket_is_fatal() {
        let mut config = PipelineConfig::live();
        config.bucket_minutes = 0;
        assert!(matches!(config.validate(), Err(RiskError::Configuration(_))));

        config.bucket_minutes = -10;
        assert!(matches!(config.validate(), Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_oversized_windows_are_fatal() {
        let config = PipelineConfig {
            bucket_minutes: 200_000_000_000,
            ..PipelineConfig::interval()
        };
        assert!(matches!(config.validate(), Err(RiskError::Configuration(_))));

        let config = PipelineConfig {
            tide_step_minutes: MAX_WINDOW_MINUTES + 1,
            ..PipelineConfig::historical()
        };
        assert!(matches!(config.validate(), Err(RiskError::Configuration(_))));

        let config = PipelineConfig {
            standardize_period_minutes: MAX_WINDOW_MINUTES,
            ..PipelineConfig::historical()
        };
        assert!(config.validate().is_ok(), "one day is the inclusive limit");
    }

    #[test]
    fn test_bucket_wider_than_sustained_window_is_fatal() {
        let config = PipelineConfig {
            bucket_minutes: 180,
            ..PipelineConfig::live()
        };
        assert!(matches!(config.validate(), Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_wrong_label_count_is_fatal() {
        let mut config = PipelineConfig::live();
        config.band_labels.pop();
        assert!(matches!(config.validate(), Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_offset_out_of_range_is_fatal() {
        let mut config = PipelineConfig::live();
        config.utc_offset_minutes = 24 * 60;
        assert!(config.offset().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_select_expected_strategies() {
        let live = PipelineConfig::live();
        assert_eq!(
            (live.rain_mode, live.tide_mode, live.join_policy),
            (RainMode::Latest, TideMode::DirectInterval, JoinPolicy::Interval)
        );
        let hist = PipelineConfig::historical();
        assert_eq!(
            (hist.rain_mode, hist.tide_mode, hist.join_policy),
            (RainMode::HourlyWindows, TideMode::StandardizedInterpolated, JoinPolicy::ExactGrid)
        );
        let interval = PipelineConfig::interval();
        assert_eq!(interval.rain_mode, RainMode::Bucketed);
        assert_eq!(interval.bucket_minutes, live.bucket_minutes);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Historical".parse::<PipelineMode>(), Ok(PipelineMode::Historical));
        assert!("weekly".parse::<PipelineMode>().is_err());
    }

    #[test]
    fn test_labels_follow_band_index() {
        let mut config = PipelineConfig::live();
        config.band_labels = vec!["Baixo".into(), "Moderado".into(), "Moderado Alto".into(), "Alto".into()];
        assert_eq!(config.label(RiskBand::ModerateHigh), "Moderado Alto");
        assert_eq!(config.label(RiskBand::Low), "Baixo");
    }
}
