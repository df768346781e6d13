/// Data sources: the CEMADEN telemetry API and flat-file tables.
///
/// Everything here produces raw rows (`RawRainRow`, `RawTideRow`); no
/// filtering or unit handling happens before the pipeline.

pub mod cemaden;
pub mod tables;

#[cfg(test)]
pub(crate) mod fixtures;
