//! Rebalancer configuration
//!
//! Connection settings and resharding behaviour, as plain validated structs.
//! Both can be filled from environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default interval between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-request HTTP timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where and how to reach the control plane
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Region used to derive the default endpoint
    pub region: Option<String>,
    /// Custom endpoint, e.g. a local emulator. Wins over `region`.
    pub endpoint: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create configuration from `SHARDSCALE_REGION` / `SHARDSCALE_ENDPOINT`
    pub fn from_env() -> Self {
        let region = std::env::var("SHARDSCALE_REGION")
            .ok()
            .filter(|v| !v.is_empty());
        let endpoint = std::env::var("SHARDSCALE_ENDPOINT")
            .ok()
            .filter(|v| !v.is_empty());
        let request_timeout = std::env::var("SHARDSCALE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Self {
            region,
            endpoint,
            request_timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "region".to_string(),
                    "must not be empty".to_string(),
                ));
            }
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(
                    "endpoint".to_string(),
                    format!("{} is not an http(s) URL", endpoint),
                ));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        if self.endpoint.is_none() && self.region.is_none() {
            return Err(ConfigError::Missing("region or endpoint".to_string()));
        }

        Ok(())
    }

    /// Endpoint URL requests are sent to
    pub fn resolve_endpoint(&self) -> Result<String, ConfigError> {
        self.validate()?;

        match (&self.endpoint, &self.region) {
            (Some(endpoint), _) => Ok(endpoint.trim_end_matches('/').to_string()),
            (None, Some(region)) => Ok(format!("https://kinesis.{}.amazonaws.com", region)),
            (None, None) => Err(ConfigError::Missing("region or endpoint".to_string())),
        }
    }
}

/// What to do when halving finds an odd number of open shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OddShardPolicy {
    /// Fail before issuing any merge
    #[default]
    Reject,
    /// Pair every shard except the highest-keyed one
    LeaveLast,
}

impl FromStr for OddShardPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(OddShardPolicy::Reject),
            "leave-last" => Ok(OddShardPolicy::LeaveLast),
            other => Err(ConfigError::InvalidValue(
                "odd_shards".to_string(),
                format!("{} (expected reject or leave-last)", other),
            )),
        }
    }
}

impl fmt::Display for OddShardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OddShardPolicy::Reject => f.write_str("reject"),
            OddShardPolicy::LeaveLast => f.write_str("leave-last"),
        }
    }
}

/// Resharding behaviour
#[derive(Debug, Clone)]
pub struct ReshardConfig {
    /// Interval between status polls while the stream is not active
    pub poll_interval: Duration,
    /// Give up waiting for the stream after this long. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Halving policy for odd open-shard counts
    pub odd_shard_policy: OddShardPolicy,
    /// Plan only, issue no split/merge calls
    pub dry_run: bool,
}

impl Default for ReshardConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: None,
            odd_shard_policy: OddShardPolicy::Reject,
            dry_run: false,
        }
    }
}

impl ReshardConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let poll_interval_secs = std::env::var("SHARDSCALE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL.as_secs());

        let wait_timeout = std::env::var("SHARDSCALE_WAIT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        let odd_shard_policy = match std::env::var("SHARDSCALE_ODD_SHARDS") {
            Ok(v) => v.parse()?,
            Err(_) => OddShardPolicy::default(),
        };

        let dry_run = std::env::var("SHARDSCALE_DRY_RUN")
            .ok()
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Self {
            poll_interval: Duration::from_secs(poll_interval_secs),
            wait_timeout,
            odd_shard_policy,
            dry_run,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "poll_interval".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
