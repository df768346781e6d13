/// Presentation data for risk records: band report, diagram series, CSV.
///
/// Nothing here draws. Diagrams are emitted as JSON for an external
/// renderer: one VP × AM scatter per (date, station), points joined in
/// time order, coloured by band over a background graded at the bin edges.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::analysis::risk::RiskBins;
use crate::config::PipelineConfig;
use crate::model::{RiskBand, RiskError, RiskRecord};

/// Minimum extent of the VP axis.
const MIN_X_LIMIT: i64 = 110;
/// Fixed extent of the AM axis (metres).
const Y_LIMIT: i64 = 5;

// ---------------------------------------------------------------------------
// Band report
// ---------------------------------------------------------------------------

/// Records of one band, most severe band first in a report.
#[derive(Debug, Clone)]
pub struct BandGroup<'a> {
    pub band: RiskBand,
    pub label: String,
    pub records: Vec<&'a RiskRecord>,
}

/// Groups records by band, High → Low. Every band is present, empty or
/// not; records keep their input order within a band.
pub fn band_report<'a>(records: &'a [RiskRecord], config: &PipelineConfig) -> Vec<BandGroup<'a>> {
    RiskBand::DESCENDING
        .iter()
        .map(|&band| BandGroup {
            band,
            label: config.label(band).to_string(),
            records: records.iter().filter(|r| r.risk_band == band).collect(),
        })
        .collect()
}

fn band_icon(band: RiskBand) -> &'static str {
    match band {
        RiskBand::High => "🔴",
        RiskBand::ModerateHigh => "🟠",
        RiskBand::Moderate => "🟡",
        RiskBand::Low => "🟢",
    }
}

/// Console rendering of a band report.
pub fn format_band_report(groups: &[BandGroup]) -> String {
    let mut out = String::new();
    for group in groups {
        out.push_str(&format!(
            "{} {}: {} point(s)\n",
            band_icon(group.band),
            group.label,
            group.records.len()
        ));
        for r in &group.records {
            out.push_str(&format!(
                "   {} {} {}  VP {:.2}  AM {:.2}  RA {:.2}\n",
                r.date,
                r.time_ref.format("%H:%M"),
                r.station_name,
                r.vp,
                r.am,
                r.risk_value
            ));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Diagram series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramPoint {
    pub time_ref: String,
    /// VP (x axis).
    pub x: f64,
    /// AM (y axis).
    pub y: f64,
    pub risk_value: f64,
    pub band: RiskBand,
    pub label: String,
    pub colour: &'static str,
    pub hover: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub band: RiskBand,
    pub label: String,
    pub colour: &'static str,
    pub definition: String,
}

/// Background colour stop, `at` in [0, 1] of the `z_max` scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColourStop {
    pub at: f64,
    pub colour: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagram {
    pub station_id: String,
    pub station_name: String,
    pub date: NaiveDate,
    pub title: String,
    pub x_max: f64,
    pub y_max: f64,
    /// Background value is VP × AM, saturating at this value.
    pub z_max: f64,
    pub background: Vec<ColourStop>,
    pub points: Vec<DiagramPoint>,
    pub legend: Vec<LegendEntry>,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Legend lines in ascending band order, worded from the configured edges:
/// "RA < 30", "30 ≤ RA < 50", "50 ≤ RA < 100", "RA ≥ 100".
pub fn legend(bins: &RiskBins, config: &PipelineConfig) -> Vec<LegendEntry> {
    let edges = *bins.edges();
    let [e0, e1, e2] = edges.map(|e| e.normalize());
    let definitions = [
        (RiskBand::Low, format!("RA < {}", e0)),
        (RiskBand::Moderate, format!("{} ≤ RA < {}", e0, e1)),
        (RiskBand::ModerateHigh, format!("{} ≤ RA < {}", e1, e2)),
        (RiskBand::High, format!("RA ≥ {}", e2)),
    ];
    definitions
        .into_iter()
        .map(|(band, definition)| LegendEntry {
            band,
            label: config.label(band).to_string(),
            colour: band.colour(),
            definition,
        })
        .collect()
}

/// Background stops at 0 and each edge, scaled to the highest edge.
pub fn background(bins: &RiskBins) -> Vec<ColourStop> {
    let [e0, e1, e2] = *bins.edges();
    let scaled = |edge: Decimal| to_f64(edge.checked_div(e2).unwrap_or(Decimal::ZERO));
    vec![
        ColourStop { at: 0.0, colour: "#90EE90" },
        ColourStop { at: scaled(e0), colour: "#FFD700" },
        ColourStop { at: scaled(e1), colour: "#FFA500" },
        ColourStop { at: 1.0, colour: "#D32F2F" },
    ]
}

/// x = max(110, 1.2 × largest VP in the series)
pub fn x_limit(records: &[&RiskRecord]) -> Decimal {
    let max_vp = records.iter().map(|r| r.vp).max().unwrap_or(Decimal::ZERO);
    max_vp
        .checked_mul(Decimal::new(12, 1))
        .unwrap_or(max_vp)
        .max(Decimal::from(MIN_X_LIMIT))
}

fn hover_text(record: &RiskRecord, label: &str) -> String {
    format!(
        "<b>Hora:</b> {}<br><b>Risco:</b> {} ({:.2})<br><b>VP:</b> {:.2}<br><b>AM:</b> {:.2}",
        record.time_ref.format("%H:%M"),
        label,
        record.risk_value,
        record.vp,
        record.am
    )
}

/// One diagram per (date, station name), in that order; points by time.
pub fn build_diagrams(records: &[RiskRecord], config: &PipelineConfig) -> Result<Vec<Diagram>, RiskError> {
    let bins = config.validate()?;
    let legend = legend(&bins, config);
    let background = background(&bins);

    let mut groups: BTreeMap<(NaiveDate, &str, &str), Vec<&RiskRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.date, record.station_name.as_str(), record.station_id.as_str()))
            .or_default()
            .push(record);
    }

    let diagrams = groups
        .into_iter()
        .map(|((date, station_name, station_id), mut group)| {
            group.sort_by_key(|r| r.time_ref);
            let points = group
                .iter()
                .map(|r| {
                    let label = config.label(r.risk_band).to_string();
                    DiagramPoint {
                        time_ref: r.time_ref.format("%H:%M").to_string(),
                        x: to_f64(r.vp),
                        y: to_f64(r.am),
                        risk_value: to_f64(r.risk_value),
                        band: r.risk_band,
                        hover: hover_text(r, &label),
                        label,
                        colour: r.risk_band.colour(),
                    }
                })
                .collect();

            Diagram {
                station_id: station_id.to_string(),
                station_name: station_name.to_string(),
                date,
                title: format!("{} - {}", station_name, date.format("%d/%m/%Y")),
                x_max: to_f64(x_limit(&group)),
                y_max: Y_LIMIT as f64,
                z_max: to_f64(bins.edges()[2]),
                background: background.clone(),
                points,
                legend: legend.clone(),
            }
        })
        .collect();

    Ok(diagrams)
}

pub fn diagrams_to_json(diagrams: &[Diagram]) -> Result<String, RiskError> {
    Ok(serde_json::to_string_pretty(diagrams)?)
}

pub fn write_diagrams_json<P: AsRef<Path>>(path: P, diagrams: &[Diagram]) -> Result<(), RiskError> {
    fs::write(path, diagrams_to_json(diagrams)?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV output
// ---------------------------------------------------------------------------

const CSV_HEADER: [&str; 8] = [
    "station_id",
    "station_name",
    "date",
    "time_ref",
    "vp",
    "am",
    "risk_value",
    "risk_band",
];

/// Writes records as CSV in the order given. Decimals are fixed to two
/// places so identical runs give identical bytes.
pub fn write_records_csv<W: Write>(
    writer: W,
    records: &[RiskRecord],
    config: &PipelineConfig,
) -> Result<(), RiskError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for r in records {
        wtr.write_record([
            r.station_id.clone(),
            r.station_name.clone(),
            r.date.format("%Y-%m-%d").to_string(),
            r.time_ref.format("%H:%M").to_string(),
            format!("{:.2}", r.vp),
            format!("{:.2}", r.am),
            format!("{:.2}", r.risk_value),
            config.label(r.risk_band).to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn records_to_csv(records: &[RiskRecord], config: &PipelineConfig) -> Result<String, RiskError> {
    let mut buf = Vec::new();
    write_records_csv(&mut buf, records, config)?;
    String::from_utf8(buf).map_err(|e| RiskError::Parse(e.to_string()))
}
