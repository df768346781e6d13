//! Recife Tidal Flood-Risk Analysis - Main Entry Point
//!
//! Runs the risk pipeline over flat files:
//! 1. Loads pipeline settings and the station registry (recife.toml)
//! 2. Reads a rain table (CEMADEN export or daily archive) and a tide table
//! 3. Scores every VP point against its AM value
//! 4. Prints the band report, optionally writing records CSV and diagram JSON
//!
//! Usage:
//!   cargo run --release -- --rain chuva.csv --tide mare.csv
//!   cargo run --release -- --mode historical --rain chuva.csv --tide mare.csv \
//!       --dates 2025-05-14,2025-05-15 --out risco.csv --diagrams diagramas.json
//!
//! Options:
//!   --mode live|historical|interval   strategy preset (default: from config)
//!   --config PATH                     configuration file (default: recife.toml)
//!   --stations "A,B"                  station names to keep
//!   --dates YYYY-MM-DD,...            local dates to keep
//!   --log-file PATH                   also append log entries to a file
//!   --verbose                         include debug messages

use chrono::NaiveDate;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::process;

use tidal_flood_risk::analysis::pipeline::run_pipeline;
use tidal_flood_risk::config::{self, PipelineMode};
use tidal_flood_risk::ingest::tables::{read_rain_csv, read_tide_csv};
use tidal_flood_risk::logging::{self, DataSource, LogLevel};
use tidal_flood_risk::model::RiskError;
use tidal_flood_risk::report;

#[derive(Debug, Default)]
struct Args {
    mode: Option<PipelineMode>,
    config: Option<String>,
    rain: Option<String>,
    tide: Option<String>,
    out: Option<String>,
    diagrams: Option<String>,
    stations: Option<Vec<String>>,
    dates: Option<Vec<NaiveDate>>,
    log_file: Option<String>,
    verbose: bool,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} --rain CSV --tide CSV [--mode live|historical|interval] [--config PATH] \
         [--out CSV] [--diagrams JSON] [--stations A,B] [--dates YYYY-MM-DD,...] \
         [--log-file PATH] [--verbose]",
        program
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--verbose" {
            parsed.verbose = true;
            i += 1;
            continue;
        }

        let value = args
            .get(i + 1)
            .ok_or_else(|| format!("{} requires a value", flag))?;
        match flag {
            "--mode" => parsed.mode = Some(value.parse().map_err(|e: RiskError| e.to_string())?),
            "--config" => parsed.config = Some(value.clone()),
            "--rain" => parsed.rain = Some(value.clone()),
            "--tide" => parsed.tide = Some(value.clone()),
            "--out" => parsed.out = Some(value.clone()),
            "--diagrams" => parsed.diagrams = Some(value.clone()),
            "--log-file" => parsed.log_file = Some(value.clone()),
            "--stations" => parsed.stations = Some(split_list(value)),
            "--dates" => {
                let dates = split_list(value)
                    .iter()
                    .map(|d| {
                        NaiveDate::parse_from_str(d, "%Y-%m-%d")
                            .map_err(|e| format!("invalid date '{}': {}", d, e))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                parsed.dates = Some(dates);
            }
            _ => return Err(format!("Unknown argument: {}", flag)),
        }
        i += 2;
    }

    Ok(parsed)
}

fn run(args: Args) -> Result<(), RiskError> {
    println!("📋 Loading configuration...");
    let service = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_config_default()?,
    };
    let mut pipeline = service.pipeline;
    if let Some(mode) = args.mode {
        pipeline = pipeline.with_mode(mode);
    }
    if let Some(stations) = args.stations {
        pipeline.stations = stations;
    }
    if let Some(dates) = args.dates {
        pipeline.dates = dates;
    }
    println!(
        "✓ {} stations; rain {:?}, tide {:?}, join {:?}\n",
        service.registry.stations().len(),
        pipeline.rain_mode,
        pipeline.tide_mode,
        pipeline.join_policy
    );

    let rain_path = args
        .rain
        .ok_or_else(|| RiskError::Configuration("--rain is required".to_string()))?;
    let tide_path = args
        .tide
        .ok_or_else(|| RiskError::Configuration("--tide is required".to_string()))?;

    println!("📊 Reading input tables...");
    let rain = read_rain_csv(&rain_path)?;
    let tide = read_tide_csv(&tide_path)?;
    if rain.malformed_rows > 0 {
        logging::warn(
            DataSource::Rain,
            None,
            &format!("{}: {} unreadable rows skipped", rain_path, rain.malformed_rows),
        );
    }
    if tide.malformed_rows > 0 {
        logging::warn(
            DataSource::Tide,
            None,
            &format!("{}: {} unreadable rows skipped", tide_path, tide.malformed_rows),
        );
    }
    println!("✓ {} rain rows, {} tide rows\n", rain.rows.len(), tide.rows.len());

    println!("🌊 Running risk analysis...");
    let output = run_pipeline(&rain.rows, &tide.rows, &pipeline, &service.registry)?;
    let diag = &output.diagnostics;
    println!("✓ {} risk records", output.records.len());
    if !diag.dates_without_tide.is_empty() {
        let dates: Vec<String> = diag.dates_without_tide.iter().map(|d| d.to_string()).collect();
        println!("   ⚠ No tide data for: {}", dates.join(", "));
    }
    println!();

    if output.records.is_empty() {
        println!("No data found for the selected stations and dates.");
        return Ok(());
    }

    println!("📈 Points per risk band");
    println!("================================");
    let groups = report::band_report(&output.records, &pipeline);
    print!("{}", report::format_band_report(&groups));

    if let Some(path) = &args.out {
        let file = File::create(path)?;
        report::write_records_csv(BufWriter::new(file), &output.records, &pipeline)?;
        println!("\n✓ Records written to {}", path);
    }

    if let Some(path) = &args.diagrams {
        let diagrams = report::build_diagrams(&output.records, &pipeline)?;
        report::write_diagrams_json(path, &diagrams)?;
        println!("✓ {} diagrams written to {}", diagrams.len(), path);
    }

    Ok(())
}

fn main() {
    println!("🌧️  Recife Tidal Flood-Risk Analysis");
    println!("====================================\n");

    let argv: Vec<String> = env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("tidal_flood_risk");
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", usage(program));
            process::exit(1);
        }
    };

    let level = if args.verbose { LogLevel::Debug } else { LogLevel::Info };
    logging::init_logger(level, args.log_file.as_deref(), false);

    if let Err(e) = run(args) {
        logging::error(DataSource::System, None, &e.to_string());
        eprintln!("\n❌ {}\n", e);
        process::exit(1);
    }
}
