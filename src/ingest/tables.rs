/// Flat-file readers for rain exports, the daily rain archive and tide
/// tables.
///
/// Header names are matched case-insensitively against a short alias
/// list, and the delimiter (`;` or `,`) is detected from the header line.
/// Files that are not valid UTF-8 are decoded as Latin-1, which is how the
/// tide tables are published.
///
/// A file without the required columns is an error. A row that cannot be
/// read (too few fields, broken quoting) is counted and skipped; the text
/// of readable rows is validated later by the pipeline.

use csv::{ReaderBuilder, StringRecord};
use std::fs;
use std::path::Path;

use crate::model::{RawRainRow, RawTideRow, RiskError, TideWhen};

/// Rows read from a table plus the rows that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRead<T> {
    pub rows: Vec<T>,
    pub malformed_rows: usize,
}

// ---------------------------------------------------------------------------
// Column aliases
// ---------------------------------------------------------------------------

const RAIN_STATION: &[&str] = &["codestacao", "cod_estacao"];
const RAIN_NAME: &[&str] = &["nomeestacao", "nome", "nome_estacao"];
const RAIN_TIMESTAMP: &[&str] = &["datahora", "data_hora"];
const RAIN_VALUE: &[&str] = &["valormedida", "valor", "valor_medida"];
const RAIN_SENSOR: &[&str] = &["id_sensor", "idsensor", "sensor"];

const TIDE_DATE: &[&str] = &["data"];
const TIDE_TIME: &[&str] = &["hora"];
const TIDE_COMBINED: &[&str] = &["datahora", "data_hora", "timestamp"];
const TIDE_HEIGHT: &[&str] = &["altura", "altura_m"];

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// UTF-8 if valid, Latin-1 otherwise. A leading BOM is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };
    text.trim_start_matches('\u{feff}').to_string()
}

/// `;` when the header line has at least as many semicolons as commas.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > 0 && semicolons >= commas {
        b';'
    } else {
        b','
    }
}

fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
}

fn require_column(headers: &StringRecord, aliases: &[&str], table: &str) -> Result<usize, RiskError> {
    find_column(headers, aliases).ok_or_else(|| {
        RiskError::Parse(format!(
            "{} table has no '{}' column (headers: {})",
            table,
            aliases[0],
            headers.iter().collect::<Vec<_>>().join(", ")
        ))
    })
}

fn field(record: &StringRecord, index: usize) -> Option<String> {
    record.get(index).map(|s| s.trim().to_string())
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes())
}

// ---------------------------------------------------------------------------
// Rain tables
// ---------------------------------------------------------------------------

/// Parses a rain export or daily archive.
///
/// Required columns: station code, timestamp, value. The station name and
/// sensor id are optional.
pub fn parse_rain_csv(text: &str) -> Result<TableRead<RawRainRow>, RiskError> {
    let mut rdr = reader(text);
    let headers = rdr.headers()?.clone();

    let station_col = require_column(&headers, RAIN_STATION, "rain")?;
    let time_col = require_column(&headers, RAIN_TIMESTAMP, "rain")?;
    let value_col = require_column(&headers, RAIN_VALUE, "rain")?;
    let name_col = find_column(&headers, RAIN_NAME);
    let sensor_col = find_column(&headers, RAIN_SENSOR);

    let mut table = TableRead {
        rows: Vec::new(),
        malformed_rows: 0,
    };

    for result in rdr.records() {
        let Ok(record) = result else {
            table.malformed_rows += 1;
            continue;
        };
        let (Some(station_id), Some(timestamp), Some(value)) = (
            field(&record, station_col),
            field(&record, time_col),
            field(&record, value_col),
        ) else {
            table.malformed_rows += 1;
            continue;
        };

        table.rows.push(RawRainRow {
            station_id,
            station_name: name_col.and_then(|c| field(&record, c)).unwrap_or_default(),
            timestamp,
            sensor_id: sensor_col.and_then(|c| field(&record, c)),
            value,
        });
    }

    Ok(table)
}

/// Reads and parses a rain CSV file.
pub fn read_rain_csv<P: AsRef<Path>>(path: P) -> Result<TableRead<RawRainRow>, RiskError> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .map_err(|e| RiskError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    parse_rain_csv(&decode_text(&bytes))
}

// ---------------------------------------------------------------------------
// Tide tables
// ---------------------------------------------------------------------------

/// Parses a tide table with either `data` + `hora` columns or one combined
/// timestamp column, plus `altura` / `altura_m`.
pub fn parse_tide_csv(text: &str) -> Result<TableRead<RawTideRow>, RiskError> {
    let mut rdr = reader(text);
    let headers = rdr.headers()?.clone();

    let height_col = require_column(&headers, TIDE_HEIGHT, "tide")?;
    let split_cols = find_column(&headers, TIDE_DATE).zip(find_column(&headers, TIDE_TIME));
    let combined_col = find_column(&headers, TIDE_COMBINED);
    if split_cols.is_none() && combined_col.is_none() {
        return Err(RiskError::Parse(
            "tide table needs 'data' and 'hora' columns or a combined timestamp column".to_string(),
        ));
    }

    let mut table = TableRead {
        rows: Vec::new(),
        malformed_rows: 0,
    };

    for result in rdr.records() {
        let Ok(record) = result else {
            table.malformed_rows += 1;
            continue;
        };

        let when = match (split_cols, combined_col) {
            (Some((date_col, time_col)), _) => field(&record, date_col)
                .zip(field(&record, time_col))
                .map(|(date, time)| TideWhen::Split { date, time }),
            (None, Some(col)) => field(&record, col).map(TideWhen::Combined),
            (None, None) => None,
        };

        match (when, field(&record, height_col)) {
            (Some(when), Some(height)) => table.rows.push(RawTideRow { when, height }),
            _ => table.malformed_rows += 1,
        }
    }

    Ok(table)
}

/// Reads and parses a tide CSV file.
pub fn read_tide_csv<P: AsRef<Path>>(path: P) -> Result<TableRead<RawTideRow>, RiskError> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .map_err(|e| RiskError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    parse_tide_csv(&decode_text(&bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
