//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.leadboard.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".leadboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Lead table settings.
    #[serde(default)]
    pub table: TableConfig,

    /// Auto-refresh settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Report output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Page requested from the templates endpoint.
    #[serde(default = "default_templates_page")]
    pub templates_page: u32,

    /// Page size requested from the templates endpoint.
    #[serde(default = "default_templates_limit")]
    pub templates_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            templates_page: default_templates_page(),
            templates_limit: default_templates_limit(),
        }
    }
}

fn default_base_url() -> String {
    "https://okhlryfle2.execute-api.us-east-2.amazonaws.com/dev".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_templates_page() -> u32 {
    1
}

fn default_templates_limit() -> u32 {
    50
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File the session is stored in.
    #[serde(default = "default_session_path")]
    pub path: PathBuf,

    /// Hours a login stays valid.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl SessionConfig {
    /// Session lifetime; `None` unless `ttl_hours` is positive and in range.
    pub fn ttl(&self) -> Option<chrono::Duration> {
        if self.ttl_hours <= 0 {
            return None;
        }
        chrono::Duration::try_hours(self.ttl_hours)
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".leadboard-session.json")
}

fn default_ttl_hours() -> i64 {
    12
}

/// Lead table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    50
}

/// Auto-refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between refreshes in watch mode. Zero disables polling.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

/// Report output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Format used when `--format` is not given.
    #[serde(default)]
    pub default_format: OutputFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.session.ttl().is_none() {
            anyhow::bail!(
                "session.ttl_hours must be a positive number of hours, got {}",
                self.session.ttl_hours
            );
        }
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via env) override
    /// the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(ref session_file) = args.session_file {
            self.session.path = session_file.clone();
        }
        if let Some(format) = args.format {
            self.report.default_format = format;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
