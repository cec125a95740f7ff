//! Locating the transaction export to analyze
//!
//! Broker exports are stored as `<prefix>_YYYY-MM-DD.csv`; when no explicit
//! file is given the one with the latest filename date wins.

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::AnalysisError;

fn filename_pattern(prefix: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"^{}_(\d{{4}}-\d{{2}}-\d{{2}})\.csv$",
        regex::escape(prefix)
    ))?)
}

/// Extract the snapshot date embedded in an export filename
pub fn snapshot_date_from_filename(path: &Path, prefix: &str) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let pattern = filename_pattern(prefix).ok()?;
    let captures = pattern.captures(name)?;
    NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").ok()
}

/// Pick the most recent dated export in `dir`
pub fn find_latest_transactions_file(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let not_found = || AnalysisError::NoTransactionFile {
        dir: dir.to_path_buf(),
        pattern: format!("{}_YYYY-MM-DD.csv", prefix),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {:?}: {}", dir, e);
            return Err(not_found().into());
        }
    };

    let latest = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| snapshot_date_from_filename(&path, prefix).map(|date| (date, path)))
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    match latest {
        Some((date, path)) => {
            debug!("Latest transactions file: {:?} ({})", path, date);
            Ok(path)
        }
        None => Err(not_found().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_date_from_filename() {
        let path = Path::new("/data/scalable_transactions_2025-11-03.csv");
        assert_eq!(
            snapshot_date_from_filename(path, "scalable_transactions"),
            NaiveDate::from_ymd_opt(2025, 11, 3)
        );
        assert_eq!(
            snapshot_date_from_filename(Path::new("other_2025-11-03.csv"), "scalable_transactions"),
            None
        );
        assert_eq!(
            snapshot_date_from_filename(
                Path::new("scalable_transactions_2025-13-03.csv"),
                "scalable_transactions"
            ),
            None
        );
    }

    #[test]
    fn test_latest_file_wins_by_filename_date() {
        let dir = TempDir::new().unwrap();
        for name in [
            "scalable_transactions_2024-12-31.csv",
            "scalable_transactions_2025-02-01.csv",
            "scalable_transactions_2025-01-15.csv",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let latest = find_latest_transactions_file(dir.path(), "scalable_transactions").unwrap();
        assert_eq!(
            latest.file_name().unwrap().to_str().unwrap(),
            "scalable_transactions_2025-02-01.csv"
        );
    }

    #[test]
    fn test_no_matching_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = find_latest_transactions_file(dir.path(), "scalable_transactions").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::NoTransactionFile { .. })
        ));
    }
}
