//! Configuration file handling
//!
//! Lookup order: explicit path, `FUNDTRACK_CONFIG`, then
//! `<config home>/fundtrack/config.toml`. A missing file means defaults; an
//! explicitly named file that does not exist is an error.

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::reports::xirr::XirrOptions;

pub const CONFIG_ENV: &str = "FUNDTRACK_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory scanned for `<file_prefix>_YYYY-MM-DD.csv` exports
    pub transactions_dir: PathBuf,
    pub funds_list: PathBuf,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub market_values: Option<PathBuf>,
    pub xirr: XirrOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transactions_dir: PathBuf::from("transactions-data"),
            funds_list: PathBuf::from("portfolio-data/funds_list.csv"),
            output_dir: PathBuf::from("processed_data/transactions"),
            file_prefix: "scalable_transactions".to_string(),
            market_values: None,
            xirr: XirrOptions::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load the configuration following the lookup order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if !path.exists() {
                return Err(anyhow!(
                    "{} points to missing file {}",
                    CONFIG_ENV,
                    path.display()
                ));
            }
            return Self::from_file(&path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("fundtrack").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
output_dir = "out"

[xirr]
max_iterations = 50
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.file_prefix, "scalable_transactions");
        assert_eq!(config.xirr.max_iterations, 50);
        assert_eq!(config.xirr.initial_guess, 0.1);
        assert_eq!(config.xirr.day_count, 365.0);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "transaction_dir = \"typo\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_unknown_xirr_key_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[xirr]\nmax_iteration = 5").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("max_iteration"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/fundtrack.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
