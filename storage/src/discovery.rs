// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use core_types::Timestamp;

use crate::error::{Result, StorageError};

const LATENT_EXTENSION: &str = ".parquet";
const FILE_STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const FALLBACK_DIR: &str = "processed";

/// Finds the most recent `YYYY-MM-DDTHH:MM:SSZ.parquet` latent file in `dir`, falling back to
/// its `processed/` subdirectory when `dir` itself holds none.
pub fn latest_latent_file(dir: &Path) -> Result<PathBuf> {
    if let Some(found) = latest_in(dir)? {
        return Ok(found);
    }
    let fallback = dir.join(FALLBACK_DIR);
    if fallback.is_dir() {
        if let Some(found) = latest_in(&fallback)? {
            return Ok(found);
        }
    }
    Err(StorageError::NoInput {
        dir: dir.to_path_buf(),
    })
}

fn latest_in(dir: &Path) -> Result<Option<PathBuf>> {
    let mut best: Option<(NaiveDateTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(stamp) = parse_file_stamp(&path) else {
            continue;
        };
        if best.as_ref().map_or(true, |(current, _)| stamp > *current) {
            best = Some((stamp, path));
        }
    }
    Ok(best.map(|(_, path)| path))
}

fn parse_file_stamp(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(LATENT_EXTENSION)?;
    NaiveDateTime::parse_from_str(stem, FILE_STAMP_FORMAT).ok()
}

/// Initial-condition timestamp encoded in a latent file name.
pub fn file_timestamp(path: &Path) -> Result<Timestamp> {
    parse_file_stamp(path)
        .map(Timestamp::floor)
        .ok_or_else(|| StorageError::InvalidFileName {
            path: path.to_path_buf(),
        })
}

/// Output name for a forecast, e.g. `2025-06-01T12Z_PT240H`.
pub fn forecast_name(initial_condition: Timestamp, lead_time_hours: u32) -> String {
    format!(
        "{}_PT{}H",
        initial_condition.format("%Y-%m-%dT%HZ"),
        lead_time_hours
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn picks_latest_matching_file() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("2025-01-01T06:00:00Z.parquet"));
        touch(&dir.path().join("2025-01-02T00:00:00Z.parquet"));
        touch(&dir.path().join("2025-01-03T00:00:00Z.zarr"));
        touch(&dir.path().join("notes.parquet"));
        let latest = latest_latent_file(dir.path()).unwrap();
        assert_eq!(
            latest.file_name().unwrap(),
            "2025-01-02T00:00:00Z.parquet"
        );
        assert_eq!(file_timestamp(&latest).unwrap().fields(), [2025, 1, 2, 0]);
    }

    #[test]
    fn falls_back_to_processed_subdirectory() {
        let dir = tempdir().unwrap();
        let processed = dir.path().join("processed");
        fs::create_dir_all(&processed).unwrap();
        touch(&processed.join("2025-02-01T12:00:00Z.parquet"));
        let latest = latest_latent_file(dir.path()).unwrap();
        assert!(latest.starts_with(&processed));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            latest_latent_file(dir.path()),
            Err(StorageError::NoInput { .. })
        ));
    }

    #[test]
    fn rejects_unstamped_file_names() {
        assert!(file_timestamp(Path::new("/data/latest.parquet")).is_err());
    }

    #[test]
    fn forecast_name_encodes_init_and_lead() {
        let init = Timestamp::new(2025, 6, 1, 12).unwrap();
        assert_eq!(forecast_name(init, 240), "2025-06-01T12Z_PT240H");
    }
}
