//! Configuration loading
//!
//! Bootstrap configuration comes from a small TOML file. The file is located
//! in this priority order:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`CWE_HARVEST_CONFIG`)
//! 3. User config directory (`~/.config/cwe-harvest/config.toml` on Linux)
//! 4. Compiled defaults (no file)
//!
//! Individual command-line flags override whatever the file provides.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CWE_HARVEST_CONFIG";

/// Official MITRE CWE REST API
pub const DEFAULT_BASE_URL: &str = "https://cwe-api.mitre.org/api/v1";

/// CWE-699 "Software Development" view
pub const DEFAULT_VIEW: &str = "699";

/// Bulk snapshot used when the REST API is unreachable
pub const DEFAULT_FALLBACK_URL: &str =
    "https://raw.githubusercontent.com/CWE-CAPEC/REST-API-wg/refs/heads/main/json_repo/cwe.json";

/// Hosts recognised as official MITRE endpoints
pub const TRUSTED_API_DOMAINS: [&str; 3] = ["cwe.mitre.org", "cwe-api.mitre.org", "api.cwe.mitre.org"];

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[api]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST API base URL (without trailing slash)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// View id used as the traversal starting point
    #[serde(default = "default_view")]
    pub view: String,

    /// Bulk JSON snapshot URL
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,

    /// Disable certificate verification (testing only)
    #[serde(default)]
    pub insecure: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            view: default_view(),
            fallback_url: default_fallback_url(),
            insecure: false,
        }
    }
}

/// `[collector]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Outer worker pool size; `None` means `min(32, cores + 4)`
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Identifiers per grouped weakness request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of cached responses
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Application-level retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            batch_size: default_batch_size(),
            cache_capacity: default_cache_capacity(),
            max_retries: default_max_retries(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_view() -> String {
    DEFAULT_VIEW.to_string()
}

fn default_fallback_url() -> String {
    DEFAULT_FALLBACK_URL.to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the config file following the documented priority order
///
/// Returns `None` when no file applies and compiled defaults should be used.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory, only if the file exists
    dirs::config_dir()
        .map(|d| d.join("cwe-harvest").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve and load configuration, falling back to compiled defaults
///
/// An explicitly requested file (CLI or environment) must exist and parse.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            tracing::debug!(path = %path.display(), "Loaded configuration file");
            Ok(config)
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Standard User-Agent for every outgoing request
pub fn get_user_agent() -> String {
    format!("CWE-Harvest/{} (Security Tool)", env!("CARGO_PKG_VERSION"))
}

/// Whether a host is one of the official MITRE API domains
pub fn is_trusted_domain(host: &str) -> bool {
    TRUSTED_API_DOMAINS.contains(&host)
}
