//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gvtakeout/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gvtakeout/` (~/.config/gvtakeout/)
//! - Data: `$XDG_DATA_HOME/gvtakeout/` (~/.local/share/gvtakeout/)
//! - State/Logs: `$XDG_STATE_HOME/gvtakeout/` (~/.local/state/gvtakeout/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Import settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Database location override
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where conversations go after extraction
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line on stdout
    Json,
    /// Rows in the SQLite database
    Sqlite,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "sqlite" => Ok(OutputFormat::Sqlite),
            _ => Err(Error::Config(format!(
                "invalid format '{}', use 'json' or 'sqlite'",
                s
            ))),
        }
    }
}

/// Import configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Directory holding the exported `.html` files
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Glob pattern (relative to `export_dir`) selecting documents
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Store attachment bytes alongside image references
    #[serde(default = "default_capture_media")]
    pub capture_media: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            pattern: default_pattern(),
            format: default_format(),
            capture_media: default_capture_media(),
        }
    }
}

impl ImportConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            return Err(Error::Config("import.pattern must not be empty".to_string()));
        }
        glob::Pattern::new(&self.pattern)
            .map_err(|e| Error::Config(format!("import.pattern is not a valid glob: {}", e)))?;
        Ok(())
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_pattern() -> String {
    "*.html".to_string()
}

fn default_format() -> OutputFormat {
    OutputFormat::Json
}

fn default_capture_media() -> bool {
    true
}

/// Database configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DatabaseConfig {
    /// Override path for the SQLite database
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.import.validate()?;
        Ok(config)
    }

    /// Database path honoring the `[database] path` override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gvtakeout/config.toml` (~/.config/gvtakeout/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gvtakeout").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/gvtakeout/` (~/.local/share/gvtakeout/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("gvtakeout")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gvtakeout/` (~/.local/state/gvtakeout/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gvtakeout")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/gvtakeout/conversations.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("conversations.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gvtakeout/gvtakeout.log` (~/.local/state/gvtakeout/gvtakeout.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gvtakeout.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
