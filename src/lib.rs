/// tidal_flood_risk: Recife rain × tide flood-risk analysis service.
///
/// # Module structure
///
/// ```text
/// tidal_flood_risk
/// ├── model       — shared data types (RawRainRow, RainAggregate, RiskRecord, RiskError, …)
/// ├── parsing     — decimal-comma numbers and source timestamp formats
/// ├── config      — pipeline settings + station list loader (recife.toml), credentials
/// ├── stations    — CEMADEN station registry with names and coordinates
/// ├── logging     — levelled console/file logging tagged by data source
/// ├── archive     — daily rain CSV archive with de-duplication
/// ├── report      — band report, diagram series (JSON) and CSV output
/// ├── ingest
/// │   ├── cemaden — CEMADEN API: token handshake, recent data, payload parsing
/// │   ├── tables  — rain export / archive / tide table CSV readers
/// │   └── fixtures (test only) — representative payloads
/// └── analysis
///     ├── rainfall — raw readings → VP points (bucketed or hourly windows)
///     ├── tide     — tide extrema → interpolated curve or AM intervals
///     ├── align    — VP ↔ AM joins (interval membership or exact grid)
///     ├── risk     — risk value and band classification
///     └── pipeline — one configurable run over all of the above
/// ```

/// Public modules
pub mod analysis;
pub mod archive;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod parsing;
pub mod report;
pub mod stations;
