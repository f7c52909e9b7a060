use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const MIB: u64 = 1024 * 1024;

/// Transport options handed unchanged to the `Fetcher`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Extra request headers ("Name" -> "value").
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Connect timeout in seconds (None = transport default).
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Whole-transfer timeout in seconds (None = no timeout; a hung fetch then holds its slot).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Follow HTTP redirects.
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            connect_timeout_secs: None,
            timeout_secs: None,
            follow_redirects: true,
        }
    }
}

/// Download coordinator options (`[coordinator]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Number of priority tiers; 0 is the highest priority.
    pub priority_levels: usize,
    /// Maximum number of simultaneous fetches.
    pub concurrency_budget: usize,
    /// Seed for level selection; None seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub transport: TransportSettings,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            priority_levels: 3,
            concurrency_budget: 4,
            seed: None,
            transport: TransportSettings::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.priority_levels == 0 {
            return Err(ConfigError::ZeroPriorityLevels);
        }
        if self.concurrency_budget == 0 {
            return Err(ConfigError::ZeroConcurrencyBudget);
        }
        Ok(())
    }
}

/// Chunk cache options (`[cache]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hard cap on the summed byte size of cached chunks.
    pub max_bytes: u64,
    /// Eviction cleans down to `max_bytes * cleaning_ratio`.
    pub cleaning_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 500 * MIB,
            cleaning_ratio: 0.8,
        }
    }
}

impl CacheConfig {
    /// Size the cache in mebibytes.
    pub fn from_megabytes(max_megabytes: u64, cleaning_ratio: f64) -> Self {
        Self {
            max_bytes: max_megabytes.saturating_mul(MIB),
            cleaning_ratio,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        if !(self.cleaning_ratio > 0.0 && self.cleaning_ratio <= 1.0) {
            return Err(ConfigError::InvalidCleaningRatio(self.cleaning_ratio));
        }
        Ok(())
    }

    /// Byte level an eviction pass cleans down to.
    pub fn clean_threshold_bytes(&self) -> u64 {
        (self.max_bytes as f64 * self.cleaning_ratio) as u64
    }
}

/// Global configuration loaded from `~/.config/chunkstream/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinator.validate()?;
        self.cache.validate()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("chunkstream")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<StreamConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = StreamConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<StreamConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: StreamConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
