//! Daily Rain Archive Update
//!
//! Logs in to CEMADEN, fetches the most recent rain-gauge readings for
//! every station in `[archive]` (default: the registry) and appends them
//! to today's
//! `chuva_recife_YYYY-MM-DD.csv`, dropping readings already archived.
//! Meant to be run on a schedule (e.g. every 10 minutes from cron).
//!
//! Usage:
//!   cargo run --release --bin update_rain_archive
//!   cargo run --release --bin update_rain_archive -- --dir data --config recife.toml
//!
//! Environment:
//!   CEMADEN_EMAIL, CEMADEN_PASSWORD - CEMADEN account (a .env file is read)

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use tidal_flood_risk::archive::update_archive;
use tidal_flood_risk::config::{self, credentials_from_env};
use tidal_flood_risk::ingest::cemaden::{fetch_all, request_token};
use tidal_flood_risk::logging::{self, DataSource, LogLevel};
use tidal_flood_risk::model::RiskError;

fn run(dir: PathBuf, config_path: Option<String>) -> Result<(), RiskError> {
    println!("📋 Loading configuration...");
    let service = match config_path {
        Some(path) => config::load_config(path)?,
        None => config::load_config_default()?,
    };
    let offset = service.pipeline.offset()?;
    let credentials = credentials_from_env()?;
    let stations = service.archive_stations();
    println!("✓ {} stations\n", stations.len());

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    println!("🔑 Requesting CEMADEN token...");
    let token = request_token(&client, &credentials)?;
    println!("✓ Token received\n");

    println!("🌧️  Fetching recent readings...");
    let rows = fetch_all(&client, &token, &stations);
    if rows.is_empty() {
        return Err(RiskError::NoDataAvailable("all stations".to_string()));
    }

    let today = Utc::now().with_timezone(&offset).date_naive();
    let update = update_archive(&dir, today, rows)?;

    println!("\n🎉 ARCHIVE UPDATED");
    println!("================================");
    println!("File:               {}", update.path.display());
    println!("Readings fetched:   {}", update.fetched);
    println!("Duplicates removed: {}", update.duplicates_removed);
    println!("Rows in archive:    {}", update.total_rows);
    Ok(())
}

fn main() {
    println!("🌊 CEMADEN Rain Archive Update");
    println!("================================\n");

    let args: Vec<String> = env::args().collect();
    let mut dir = PathBuf::from(".");
    let mut config_path: Option<String> = None;
    let mut log_file: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--dir", Some(value)) => dir = PathBuf::from(value),
            ("--config", Some(value)) => config_path = Some(value.clone()),
            ("--log-file", Some(value)) => log_file = Some(value.clone()),
            (flag, _) => {
                eprintln!("Unknown or incomplete argument: {}", flag);
                eprintln!("Usage: {} [--dir DIR] [--config PATH] [--log-file PATH]", args[0]);
                process::exit(1);
            }
        }
        i += 2;
    }

    logging::init_logger(LogLevel::Info, log_file.as_deref(), log_file.is_some());

    if let Err(e) = run(dir, config_path) {
        logging::error(DataSource::Archive, None, &e.to_string());
        eprintln!("\n❌ Archive update failed: {}\n", e);
        process::exit(1);
    }
}
