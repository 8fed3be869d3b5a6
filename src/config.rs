//! Runtime configuration: where the database and log file live and how chatty
//! logging is. Values come from the command line (which already folds in the
//! `BDO_*` environment variables); anything left unset falls back to the
//! application data directory under the user's home.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories::BaseDirs;

use crate::cli::Cli;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".bdo-chronicle";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "chronicle.sqlite";
/// Log file name, placed next to the database unless overridden.
const LOG_FILE_NAME: &str = "chronicle.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_file: PathBuf,
    pub log_filter: String,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let db_path = match &cli.database {
            Some(path) => path.clone(),
            None => default_data_dir()?.join(DB_FILE_NAME),
        };
        Ok(Self::resolve(db_path, cli.log_file.clone(), &cli.log_level))
    }

    /// Fill in the log file from the database location when not given.
    pub fn resolve(db_path: PathBuf, log_file: Option<PathBuf>, log_filter: &str) -> Self {
        let log_file = log_file.unwrap_or_else(|| sibling(&db_path, LOG_FILE_NAME));
        let log_filter = match log_filter.trim() {
            "" => "info".to_string(),
            filter => filter.to_string(),
        };
        Self {
            db_path,
            log_file,
            log_filter,
        }
    }
}

fn sibling(path: &Path, file_name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Resolve the absolute path to the data directory inside the user's home.
fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_defaults_next_to_database() {
        let config = Config::resolve(PathBuf::from("/data/bdo/chronicle.sqlite"), None, " ");
        assert_eq!(config.log_file, PathBuf::from("/data/bdo/chronicle.log"));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn explicit_log_file_wins() {
        let config = Config::resolve(
            PathBuf::from("chronicle.sqlite"),
            Some(PathBuf::from("/var/log/bdo.log")),
            "debug",
        );
        assert_eq!(config.log_file, PathBuf::from("/var/log/bdo.log"));
        assert_eq!(config.log_filter, "debug");
    }
}
