//! Effective collection settings
//!
//! Merges command-line overrides on top of the TOML bootstrap file.

use crate::api::MAX_IDS_PER_REQUEST;
use cwe_common::config::TomlConfig;

/// Hard ceiling on the outer worker pool
pub const MAX_DEFAULT_WORKERS: usize = 32;

/// Values given on the command line (or their `env` equivalents)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub view: Option<String>,
    pub max_workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub base_url: String,
    pub view: String,
    pub fallback_url: String,
    pub insecure: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub cache_capacity: usize,
    pub max_retries: u32,
}

impl FetchSettings {
    /// CLI → TOML → compiled defaults
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        Self {
            base_url: cli.base_url.clone().unwrap_or_else(|| toml.api.base_url.clone()),
            view: cli.view.clone().unwrap_or_else(|| toml.api.view.clone()),
            fallback_url: toml.api.fallback_url.clone(),
            insecure: cli.insecure || toml.api.insecure,
            workers: cli
                .max_workers
                .or(toml.collector.max_workers)
                .unwrap_or_else(default_workers)
                .max(1),
            batch_size: cli
                .batch_size
                .unwrap_or(toml.collector.batch_size)
                .clamp(1, MAX_IDS_PER_REQUEST),
            cache_capacity: toml.collector.cache_capacity,
            max_retries: toml.collector.max_retries,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::resolve(&CliOverrides::default(), &TomlConfig::default())
    }
}

/// `min(32, cores + 4)`
pub fn default_workers() -> usize {
    (num_cpus::get() + 4).min(MAX_DEFAULT_WORKERS)
}
