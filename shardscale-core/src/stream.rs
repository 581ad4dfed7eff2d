//! Stream descriptions and topology snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classifier::filter_open_shards;
use crate::shard::Shard;

/// Lifecycle status reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Creating,
    Deleting,
    Active,
    Updating,
    #[serde(other)]
    Unknown,
}

impl StreamStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, StreamStatus::Active)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamStatus::Creating => "CREATING",
            StreamStatus::Deleting => "DELETING",
            StreamStatus::Active => "ACTIVE",
            StreamStatus::Updating => "UPDATING",
            StreamStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One page of a describe-stream response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamDescription {
    pub stream_name: String,
    #[serde(default, rename = "StreamARN", skip_serializing_if = "Option::is_none")]
    pub stream_arn: Option<String>,
    pub stream_status: StreamStatus,
    #[serde(default)]
    pub shards: Vec<Shard>,
    #[serde(default)]
    pub has_more_shards: bool,
}

/// Lightweight status-only view of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamDescriptionSummary {
    pub stream_name: String,
    pub stream_status: StreamStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_shard_count: Option<u32>,
}

/// Every shard of a stream, collected while the stream stayed active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTopology {
    pub stream_name: String,
    pub status: StreamStatus,
    pub shards: Vec<Shard>,
    pub captured_at: DateTime<Utc>,
}

impl StreamTopology {
    pub fn new(stream_name: impl Into<String>, status: StreamStatus, shards: Vec<Shard>) -> Self {
        Self {
            stream_name: stream_name.into(),
            status,
            shards,
            captured_at: Utc::now(),
        }
    }

    /// Open shards, optionally ordered by ending hash key
    pub fn open_shards(&self, sort_by_key_range: bool) -> Vec<&Shard> {
        filter_open_shards(&self.shards, sort_by_key_range)
    }

    pub fn open_count(&self) -> usize {
        self.shards.iter().filter(|s| s.is_open()).count()
    }

    pub fn closed_count(&self) -> usize {
        self.shards.len() - self.open_count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} is {}: {} open shards, {} closed",
            self.stream_name,
            self.status,
            self.open_count(),
            self.closed_count()
        )
    }
}
