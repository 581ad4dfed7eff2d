//! Control-plane seam
//!
//! The four calls the orchestrator needs from the stream service. The HTTP
//! client and the in-memory simulator both implement this trait.

use shardscale_core::{HashKey, StreamDescription, StreamDescriptionSummary};
use thiserror::Error;

/// Control-plane errors
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ControlPlaneError {
    /// Provider error code, e.g. `ResourceInUseException`
    pub fn code(&self) -> Option<&str> {
        match self {
            ControlPlaneError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;

/// Stream service operations used for resharding
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    /// One page of the stream's shards, starting after `exclusive_start_shard_id`
    async fn describe_stream(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<StreamDescription>;

    /// Status-only poll
    async fn describe_stream_summary(&self, stream_name: &str)
        -> Result<StreamDescriptionSummary>;

    /// Split `shard_to_split` so a new shard starts at `new_starting_hash_key`
    async fn split_shard(
        &self,
        stream_name: &str,
        shard_to_split: &str,
        new_starting_hash_key: HashKey,
    ) -> Result<()>;

    /// Merge two shards; `adjacent_shard_to_merge` must follow `shard_to_merge` in the key space
    async fn merge_shards(
        &self,
        stream_name: &str,
        shard_to_merge: &str,
        adjacent_shard_to_merge: &str,
    ) -> Result<()>;
}
