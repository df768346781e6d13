/// Daily rain archive: one CSV per local calendar day.
///
/// Each fetch appends its rows to `chuva_recife_YYYY-MM-DD.csv`. The
/// recent-data endpoint returns overlapping windows, so after appending
/// the file is de-duplicated on (station code, timestamp), keeping the
/// most recently fetched copy of each reading. The archive doubles as a
/// rain input for later pipeline runs (`ingest::tables::read_rain_csv`).

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{self, DataSource};
use crate::model::{RawRainRow, RiskError};

pub const ARCHIVE_PREFIX: &str = "chuva_recife_";

/// Outcome of one archive update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUpdate {
    pub path: PathBuf,
    /// Rows received from this fetch.
    pub fetched: usize,
    /// Rows in the file after de-duplication.
    pub total_rows: usize,
    pub duplicates_removed: usize,
}

/// `<dir>/chuva_recife_YYYY-MM-DD.csv`
pub fn archive_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}{}.csv", ARCHIVE_PREFIX, date.format("%Y-%m-%d")))
}

/// Concatenates `existing` and `fresh`, then keeps only the last
/// occurrence of each (station code, timestamp). Surviving rows stay in
/// their relative order. Returns the rows and how many were removed.
pub fn merge_rows(existing: Vec<RawRainRow>, fresh: Vec<RawRainRow>) -> (Vec<RawRainRow>, usize) {
    let combined: Vec<RawRainRow> = existing.into_iter().chain(fresh).collect();

    let keep: Vec<bool> = {
        let mut last_seen: HashMap<(&str, &str), usize> = HashMap::new();
        for (i, row) in combined.iter().enumerate() {
            last_seen.insert((row.station_id.as_str(), row.timestamp.as_str()), i);
        }
        combined
            .iter()
            .enumerate()
            .map(|(i, row)| last_seen[&(row.station_id.as_str(), row.timestamp.as_str())] == i)
            .collect()
    };

    let before = combined.len();
    let merged: Vec<RawRainRow> = combined
        .into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect();
    let removed = before - merged.len();
    (merged, removed)
}

/// Reads an archive file. A missing file is an empty archive.
pub fn read_archive(path: &Path) -> Result<Vec<RawRainRow>, RiskError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new().from_path(path)?;
    let rows = rdr.deserialize().collect::<Result<Vec<RawRainRow>, csv::Error>>()?;
    Ok(rows)
}

/// Writes an archive file, header included.
pub fn write_archive(path: &Path, rows: &[RawRainRow]) -> Result<(), RiskError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Appends `fresh` to the archive for `date` under `dir`.
pub fn update_archive(
    dir: &Path,
    date: NaiveDate,
    fresh: Vec<RawRainRow>,
) -> Result<ArchiveUpdate, RiskError> {
    let path = archive_path(dir, date);
    let fetched = fresh.len();
    let existing = read_archive(&path)?;
    let (merged, duplicates_removed) = merge_rows(existing, fresh);
    write_archive(&path, &merged)?;

    logging::info(
        DataSource::Archive,
        None,
        &format!(
            "{}: +{} fetched, {} duplicates removed, {} rows total",
            path.display(),
            fetched,
            duplicates_removed,
            merged.len()
        ),
    );

    Ok(ArchiveUpdate {
        path,
        fetched,
        total_rows: merged.len(),
        duplicates_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(station: &str, ts: &str, value: &str) -> RawRainRow {
        RawRainRow {
            station_id: station.into(),
            station_name: "Imbiribeira".into(),
            timestamp: ts.into(),
            sensor_id: Some("10".into()),
            value: value.into(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tidal_flood_risk_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_archive_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 14).unwrap();
        assert_eq!(
            archive_path(Path::new("data"), date),
            Path::new("data").join("chuva_recife_2025-05-14.csv")
        );
    }

    #[test]
    fn test_merge_keeps_newest_copy() {
        let existing = vec![
            row("261160609A", "2025-05-14 13:00:00.0", "0.2"),
            row("261160609A", "2025-05-14 13:10:00.0", "0.0"),
        ];
        let fresh = vec![
            row("261160609A", "2025-05-14 13:10:00.0", "0.4"),
            row("261160609A", "2025-05-14 13:20:00.0", "1.0"),
        ];
        let (merged, removed) = merge_rows(existing, fresh);

        assert_eq!(removed, 1);
        let values: Vec<&str> = merged.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["0.2", "0.4", "1.0"]);
    }

    #[test]
    fn test_same_time_different_station_is_not_a_duplicate() {
        let (merged, removed) = merge_rows(
            vec![row("261160609A", "2025-05-14 13:00:00.0", "0.2")],
            vec![row("261160614A", "2025-05-14 13:00:00.0", "0.2")],
        );
        assert_eq!(removed, 0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_update_archive_round_trip_on_disk() {
        let dir = scratch_dir("archive");
        let date = NaiveDate::from_ymd_opt(2025, 5, 14).unwrap();

        let first = update_archive(
            &dir,
            date,
            vec![
                row("261160609A", "2025-05-14 13:00:00.0", "0.2"),
                row("261160609A", "2025-05-14 13:10:00.0", "0.0"),
            ],
        )
        .unwrap();
        assert_eq!(first.total_rows, 2);
        assert_eq!(first.duplicates_removed, 0);

        let second = update_archive(
            &dir,
            date,
            vec![row("261160609A", "2025-05-14 13:10:00.0", "0.6")],
        )
        .unwrap();
        assert_eq!(second.fetched, 1);
        assert_eq!(second.total_rows, 2);
        assert_eq!(second.duplicates_removed, 1);

        let stored = read_archive(&second.path).unwrap();
        assert_eq!(stored[1].value, "0.6");
        assert_eq!(stored[1].sensor_id.as_deref(), Some("10"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_archive_reads_empty() {
        let dir = scratch_dir("missing");
        let path = archive_path(&dir, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(read_archive(&path).unwrap().is_empty());
    }
}
