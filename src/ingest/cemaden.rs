/// CEMADEN PCD (automatic rain gauge) API client.
///
/// Two endpoints:
///   https://sgaa.cemaden.gov.br/SGAA/rest/controle-token/tokens  (POST, login → token)
///   https://sws.cemaden.gov.br/PED/rest/pcds/pcds-dados-recentes (GET, recent readings)
///
/// The recent-data endpoint answers with either a single JSON object or an
/// array of objects, and `valor` / `id_sensor` arrive as numbers or strings
/// depending on the station firmware. See `fixtures.rs` for examples.
///
/// URL construction and payload parsing are pure; only `request_token` and
/// `fetch_recent` touch the network.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Credentials;
use crate::logging::{self, DataSource};
use crate::model::{RawRainRow, RiskError, SENSOR_RAIN_GAUGE};

// ---------------------------------------------------------------------------
// Endpoints and fixed query parameters
// ---------------------------------------------------------------------------

const TOKEN_URL: &str = "https://sgaa.cemaden.gov.br/SGAA/rest/controle-token/tokens";
const RECENT_DATA_URL: &str = "https://sws.cemaden.gov.br/PED/rest/pcds/pcds-dados-recentes";

/// PCD network id for the automatic rain gauges.
pub const NETWORK_PLUVIOMETER: u32 = 11;
/// State filter for Recife stations.
pub const UF_PERNAMBUCO: &str = "PE";

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TokenRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// One reading as delivered. Numeric fields are left as raw JSON values.
#[derive(Deserialize)]
struct RecentEntry {
    codestacao: Option<Value>,
    nome: Option<String>,
    datahora: Option<String>,
    id_sensor: Option<Value>,
    valor: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecentPayload {
    Many(Vec<RecentEntry>),
    One(RecentEntry),
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the recent-data URL for one station and sensor, JSON format.
pub fn build_recent_url(station_code: &str, sensor_id: u32) -> String {
    format!(
        "{}?codestacao={}&rede={}&uf={}&sensor={}&formato=JSON",
        RECENT_DATA_URL,
        urlencoding::encode(station_code),
        NETWORK_PLUVIOMETER,
        UF_PERNAMBUCO,
        sensor_id
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Renders a JSON scalar as the text the normalizer expects.
fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extracts the token from a token-endpoint response body.
pub fn parse_token_response(json: &str) -> Result<String, RiskError> {
    let response: TokenResponse = serde_json::from_str(json)?;
    response
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or(RiskError::NoToken)
}

/// Parses a recent-data response body into raw rain rows.
///
/// Entries missing a station code or timestamp are skipped; value and
/// sensor problems are left for the normalizer to count. The response
/// station name wins over the registry; `fallback_name` is used only when
/// the response has none.
pub fn parse_recent_payload(json: &str, fallback_name: &str) -> Result<Vec<RawRainRow>, RiskError> {
    let payload: RecentPayload = serde_json::from_str(json)?;
    let entries = match payload {
        RecentPayload::Many(entries) => entries,
        RecentPayload::One(entry) => vec![entry],
    };

    let rows = entries
        .into_iter()
        .filter_map(|entry| {
            let station_id = value_text(entry.codestacao.as_ref())?;
            let timestamp = entry.datahora?;
            Some(RawRainRow {
                station_id,
                station_name: entry
                    .nome
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| fallback_name.to_string()),
                timestamp,
                sensor_id: value_text(entry.id_sensor.as_ref()),
                value: value_text(entry.valor.as_ref()).unwrap_or_default(),
            })
        })
        .collect();

    Ok(rows)
}

// ---------------------------------------------------------------------------
// API Client
// ---------------------------------------------------------------------------

/// Logs in and returns the session token.
pub fn request_token(
    client: &reqwest::blocking::Client,
    credentials: &Credentials,
) -> Result<String, RiskError> {
    let response = client
        .post(TOKEN_URL)
        .json(&TokenRequest {
            email: &credentials.email,
            password: &credentials.password,
        })
        .send()?;

    if !response.status().is_success() {
        return Err(RiskError::HttpError(response.status().as_u16()));
    }

    parse_token_response(&response.text()?)
}

/// Fetch the most recent rain-gauge readings for one station
pub fn fetch_recent(
    client: &reqwest::blocking::Client,
    token: &str,
    station_code: &str,
    station_name: &str,
) -> Result<Vec<RawRainRow>, RiskError> {
    let url = build_recent_url(station_code, SENSOR_RAIN_GAUGE);
    logging::debug(DataSource::Cemaden, Some(station_code), &format!("Fetching: {}", url));

    let response = client
        .get(&url)
        .header("token", token)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(RiskError::HttpError(response.status().as_u16()));
    }

    let rows = parse_recent_payload(&response.text()?, station_name)?;
    if rows.is_empty() {
        return Err(RiskError::NoDataAvailable(station_code.to_string()));
    }
    Ok(rows)
}

/// Fetches every station in turn. A failing station is logged and
/// skipped; the others still contribute rows.
pub fn fetch_all(
    client: &reqwest::blocking::Client,
    token: &str,
    stations: &[(&str, &str)],
) -> Vec<RawRainRow> {
    let mut rows = Vec::new();
    let mut failed = 0;

    for &(code, name) in stations {
        match fetch_recent(client, token, code, name) {
            Ok(station_rows) => {
                logging::info(
                    DataSource::Cemaden,
                    Some(code),
                    &format!("{}: {} readings", name, station_rows.len()),
                );
                rows.extend(station_rows);
            }
            Err(e) => {
                logging::log_fetch_failure(code, "recent data", &e);
                failed += 1;
            }
        }
    }

    logging::log_fetch_summary(stations.len(), stations.len() - failed, failed);
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
