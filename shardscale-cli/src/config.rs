//! Configuration management
//!
//! Handles storing and loading CLI configuration.
//! Config directory: ~/.shardscale/ (cross-platform)
//!
//! Config file format (~/.shardscale/config.toml):
//! ```toml
//! [connection]
//! region = "eu-west-1"
//! endpoint = "http://localhost:4566"
//! request_timeout_secs = 30
//!
//! [reshard]
//! poll_interval_secs = 5
//! wait_timeout_secs = 600
//! odd_shards = "reject"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shardscale_rebalancer::config::{DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use shardscale_rebalancer::{ConnectionConfig, OddShardPolicy, ReshardConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Structure of ~/.shardscale/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShardScaleConfig {
    /// Control-plane connection settings
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Resharding behaviour
    #[serde(default)]
    pub reshard: ReshardSettings,
}

/// Control-plane connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint, e.g. a local emulator
    #[serde(default = "default_endpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let env = ConnectionConfig::from_env();
        Self {
            region: env.region,
            endpoint: env.endpoint,
            request_timeout_secs: env.request_timeout.as_secs(),
        }
    }
}

fn default_region() -> Option<String> {
    ConnectionConfig::from_env().region
}

fn default_endpoint() -> Option<String> {
    ConnectionConfig::from_env().endpoint
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Resharding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshardSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Unset waits forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,

    #[serde(default)]
    pub odd_shards: OddShardPolicy,
}

impl Default for ReshardSettings {
    fn default() -> Self {
        let env = match ReshardConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Ignoring reshard environment settings: {}", e);
                ReshardConfig::default()
            }
        };
        Self {
            poll_interval_secs: env.poll_interval.as_secs(),
            wait_timeout_secs: env.wait_timeout.map(|d| d.as_secs()),
            odd_shards: env.odd_shard_policy,
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub wait_timeout_secs: Option<u64>,
    pub odd_shards: Option<OddShardPolicy>,
    pub dry_run: bool,
}

impl ShardScaleConfig {
    /// Connection settings with command-line overrides applied
    pub fn connection_config(&self, overrides: &Overrides) -> ConnectionConfig {
        ConnectionConfig {
            region: overrides
                .region
                .clone()
                .or_else(|| self.connection.region.clone()),
            endpoint: overrides
                .endpoint
                .clone()
                .or_else(|| self.connection.endpoint.clone()),
            request_timeout: Duration::from_secs(self.connection.request_timeout_secs),
        }
    }

    /// Reshard settings with command-line overrides applied
    pub fn reshard_config(&self, overrides: &Overrides) -> Result<ReshardConfig> {
        let config = ReshardConfig {
            poll_interval: Duration::from_secs(
                overrides
                    .poll_interval_secs
                    .unwrap_or(self.reshard.poll_interval_secs),
            ),
            wait_timeout: overrides
                .wait_timeout_secs
                .or(self.reshard.wait_timeout_secs)
                .map(Duration::from_secs),
            odd_shard_policy: overrides.odd_shards.unwrap_or(self.reshard.odd_shards),
            dry_run: overrides.dry_run,
        };
        config.validate().context("Invalid reshard settings")?;
        Ok(config)
    }
}

/// Get the config directory path (~/.shardscale/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".shardscale");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.shardscale/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from ~/.shardscale/config.toml
/// Falls back to defaults if the file doesn't exist or can't be parsed
pub fn load_config() -> ShardScaleConfig {
    match config_file_path() {
        Ok(path) if path.exists() => match load_config_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}", e);
                ShardScaleConfig::default()
            }
        },
        _ => ShardScaleConfig::default(),
    }
}

/// Load configuration from a specific file
pub fn load_config_from(path: &Path) -> Result<ShardScaleConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Save configuration to ~/.shardscale/config.toml
pub fn save_config(config: &ShardScaleConfig) -> Result<PathBuf> {
    let path = config_file_path()?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Save configuration to a specific file
pub fn save_config_to(path: &Path, config: &ShardScaleConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}
