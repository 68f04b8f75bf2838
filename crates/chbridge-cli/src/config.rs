//! `config.toml` loading.
//!
//! Lookup order: the `--config` path, then `<config dir>/chbridge/config.toml`,
//! then built-in defaults. Command-line flags are applied on top by the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chbridge_clickhouse::ClickHouseConfig;
use chbridge_pipeline::{
    CsvFormat, DEFAULT_BATCH_SIZE, InsertMode, LocalStorage, ParsePolicy, TransferOptions,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

const APP_QUALIFIER: &str = "";
const APP_ORG: &str = "";
const APP_NAME: &str = "chbridge";
pub const CONFIG_FILENAME: &str = "config.toml";

/// Everything the binary reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub clickhouse: ClickHouseConfig,
    pub transfer: TransferSettings,
}

/// The `[transfer]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub batch_size: usize,
    pub parse_policy: ParsePolicy,
    pub insert_mode: InsertMode,
    pub delimiter: char,
    /// Flat-file paths are looked up by file name inside this directory.
    pub uploads_dir: Option<PathBuf>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parse_policy: ParsePolicy::default(),
            insert_mode: InsertMode::default(),
            delimiter: ',',
            uploads_dir: None,
        }
    }
}

impl TransferSettings {
    /// Pipeline options for these settings.
    ///
    /// `timeout` comes from the connection settings and becomes the deadline
    /// for each insert statement.
    pub fn options(&self, timeout: std::time::Duration) -> Result<TransferOptions> {
        Ok(TransferOptions::new()
            .with_batch_size(self.batch_size)
            .with_parse_policy(self.parse_policy)
            .with_insert_mode(self.insert_mode)
            .with_csv_format(CsvFormat::with_delimiter(delimiter_byte(self.delimiter)?))
            .with_timeout(timeout))
    }

    #[must_use]
    pub fn storage(&self) -> LocalStorage {
        match &self.uploads_dir {
            Some(dir) => LocalStorage::rooted(dir.clone()),
            None => LocalStorage::new(),
        }
    }
}

/// The CSV reader and writer only take single-byte delimiters.
fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
        bail!("unsupported delimiter {delimiter:?}: expected a single ASCII character other than a quote or line break");
    }
    Ok(delimiter as u8)
}

/// Default config file location, if the platform has a config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Load the config from an explicit path or the default location.
///
/// An explicit path must exist; a missing default file means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<BridgeConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    let Some(path) = default_config_path() else {
        debug!("no config directory available, using defaults");
        return Ok(BridgeConfig::default());
    };
    match fs::read_to_string(&path) {
        Ok(text) => parse_config(&text).with_context(|| format!("invalid config {}", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            Ok(BridgeConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read config {}", path.display())),
    }
}

pub fn read_config(path: &Path) -> Result<BridgeConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_config(text: &str) -> Result<BridgeConfig> {
    let config: BridgeConfig = toml::from_str(text)?;
    // Delimiters are checked at load time.
    delimiter_byte(config.transfer.delimiter)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_config("").expect("parse");
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.clickhouse.port, 8123);
        assert_eq!(config.transfer.batch_size, 1000);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = parse_config(
            r#"
            [clickhouse]
            host = "ch.internal"
            database = "analytics"

            [transfer]
            parse_policy = "strict"
            insert_mode = "batched"
            delimiter = ";"
            uploads_dir = "/srv/uploads"
            "#,
        )
        .expect("parse");

        assert_eq!(config.clickhouse.host, "ch.internal");
        assert_eq!(config.clickhouse.user, "default");
        assert_eq!(config.transfer.parse_policy, ParsePolicy::Strict);
        assert_eq!(config.transfer.insert_mode, InsertMode::Batched);
        assert_eq!(config.transfer.delimiter, ';');
        assert_eq!(config.transfer.uploads_dir, Some(PathBuf::from("/srv/uploads")));
        assert_eq!(config.transfer.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(parse_config("[transfer]\nparse_policy = \"loose\"\n").is_err());
    }

    #[test]
    fn multibyte_delimiter_is_rejected() {
        let err = parse_config("[transfer]\ndelimiter = \"§\"\n").unwrap_err();
        assert!(err.to_string().contains("unsupported delimiter"), "{err}");
    }

    #[test]
    fn options_carry_settings() {
        let settings = TransferSettings {
            batch_size: 0,
            delimiter: '\t',
            ..TransferSettings::default()
        };
        let options = settings
            .options(std::time::Duration::from_secs(30))
            .expect("options");
        assert_eq!(options.batch_size, 1);
        assert_eq!(options.csv.delimiter, b'\t');
        assert_eq!(options.context.timeout, Some(std::time::Duration::from_secs(30)));
    }
}
