//! Application configuration for ttharvest.
//!
//! User config lives at `~/.ttharvest/ttharvest.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Nothing here touches the filesystem beyond reading the config file;
//! data directories are created by the store when it is opened.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ttharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ttharvest";

// ---------------------------------------------------------------------------
// Config structs (matching ttharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Request pacing and timeout settings.
    #[serde(default)]
    pub politeness: PolitenessConfig,

    /// Retry behavior for transient network failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for raw harvested data.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// First calendar year considered by the year planner.
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Maximum concurrent in-flight fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            start_year: default_start_year(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_data_dir() -> String {
    "~/ttharvest-data".into()
}
fn default_start_year() -> i32 {
    1926
}
fn default_concurrency() -> u32 {
    50
}

/// `[politeness]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Upper bound of the random delay before each request, in milliseconds.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            max_jitter_ms: default_max_jitter_ms(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_jitter_ms() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in seconds; doubles per attempt.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Upper bound on the backoff delay in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> u64 {
    2
}
fn default_max_delay_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime harvest configuration — merged from config file + CLI flags,
/// constructed once at process start and passed by reference into the
/// planner, executor, and coordinator.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Root directory for raw harvested data.
    pub data_dir: PathBuf,
    /// First calendar year considered by the year planner.
    pub start_year: i32,
    /// Maximum concurrent in-flight fetches.
    pub concurrency: u32,
    /// Upper bound of the pre-request jitter delay, in milliseconds.
    pub max_jitter_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Retry settings for transient failures.
    pub retry: RetryConfig,
}

impl From<&AppConfig> for HarvestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            data_dir: expand_home(&config.defaults.data_dir),
            start_year: config.defaults.start_year,
            concurrency: config.defaults.concurrency,
            max_jitter_ms: config.politeness.max_jitter_ms,
            request_timeout_secs: config.politeness.request_timeout_secs,
            retry: config.retry.clone(),
        }
    }
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ttharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ttharvest/ttharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("max_jitter_ms"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.start_year, 1926);
        assert_eq!(parsed.defaults.concurrency, 50);
        assert_eq!(parsed.retry.max_attempts, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
start_year = 2021

[politeness]
max_jitter_ms = 250
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.start_year, 2021);
        assert_eq!(config.defaults.concurrency, 50);
        assert_eq!(config.politeness.max_jitter_ms, 250);
        assert_eq!(config.politeness.request_timeout_secs, 30);
    }

    #[test]
    fn harvest_config_from_app_config() {
        let app = AppConfig::default();
        let harvest = HarvestConfig::from(&app);
        assert_eq!(harvest.start_year, 1926);
        assert_eq!(harvest.concurrency, 50);
        assert_eq!(harvest.request_timeout_secs, 30);
        assert_eq!(harvest.retry.base_delay_secs, 2);
        assert_eq!(harvest.retry.max_delay_secs, 10);
    }

    #[test]
    fn home_expansion() {
        let expanded = expand_home("~/ttharvest-data");
        assert!(!expanded.to_string_lossy().starts_with('~'));

        let absolute = expand_home("/var/data");
        assert_eq!(absolute, PathBuf::from("/var/data"));
    }
}
