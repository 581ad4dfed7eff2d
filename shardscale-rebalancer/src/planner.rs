//! Reshard Planner
//!
//! Turns a stable topology into the ordered list of split or merge calls that
//! doubles or halves its open shards. Plans are computed fresh from each
//! snapshot and never stored.

use serde::Serialize;
use shardscale_core::{HashKey, HashKeyRange, StreamTopology};
use std::fmt;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::OddShardPolicy;

/// Planner errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Cannot halve {count} open shards: count is odd")]
    OddShardCount { count: usize },

    #[error("Shard {shard_id} is too narrow to split: {range}")]
    ShardTooNarrow { shard_id: String, range: String },

    #[error("Shards {first} and {second} are not adjacent in the key space")]
    NotAdjacent { first: String, second: String },
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Direction of a reshard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReshardKind {
    Double,
    Halve,
}

impl fmt::Display for ReshardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReshardKind::Double => f.write_str("double"),
            ReshardKind::Halve => f.write_str("halve"),
        }
    }
}

/// A single structural mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReshardStep {
    Split {
        shard_id: String,
        range: HashKeyRange,
        new_starting_hash_key: HashKey,
    },
    Merge {
        shard_to_merge: String,
        adjacent_shard_to_merge: String,
        merged_range: HashKeyRange,
    },
}

impl fmt::Display for ReshardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReshardStep::Split {
                shard_id,
                new_starting_hash_key,
                ..
            } => write!(f, "split {} at {}", shard_id, new_starting_hash_key),
            ReshardStep::Merge {
                shard_to_merge,
                adjacent_shard_to_merge,
                ..
            } => write!(f, "merge {} + {}", shard_to_merge, adjacent_shard_to_merge),
        }
    }
}

/// Ordered mutations for one reshard operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReshardPlan {
    pub stream_name: String,
    pub kind: ReshardKind,
    /// Open shards in the snapshot the plan was built from
    pub open_shards: usize,
    pub steps: Vec<ReshardStep>,
    /// Shard left out of a halving under `OddShardPolicy::LeaveLast`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_over: Option<String>,
}

impl ReshardPlan {
    /// Split every open shard at the midpoint of its range
    #[instrument(skip(topology), fields(stream = %topology.stream_name))]
    pub fn double(topology: &StreamTopology) -> Result<Self> {
        let open = topology.open_shards(false);
        let mut steps = Vec::with_capacity(open.len());

        for shard in &open {
            let range = shard.hash_key_range;
            let midpoint = range.midpoint();

            // The new shard must start strictly after the parent's first key
            if midpoint <= range.starting_hash_key {
                return Err(PlanError::ShardTooNarrow {
                    shard_id: shard.shard_id.clone(),
                    range: range.to_string(),
                });
            }

            steps.push(ReshardStep::Split {
                shard_id: shard.shard_id.clone(),
                range,
                new_starting_hash_key: midpoint,
            });
        }

        let plan = Self {
            stream_name: topology.stream_name.clone(),
            kind: ReshardKind::Double,
            open_shards: open.len(),
            steps,
            left_over: None,
        };
        info!(summary = %plan.summary(), "Split plan created");
        Ok(plan)
    }

    /// Merge consecutive key-ordered pairs of open shards
    #[instrument(skip(topology), fields(stream = %topology.stream_name))]
    pub fn halve(topology: &StreamTopology, policy: OddShardPolicy) -> Result<Self> {
        let open = topology.open_shards(true);
        let mut left_over = None;

        let pairable = if open.len() > 1 && open.len() % 2 == 1 {
            match policy {
                OddShardPolicy::Reject => {
                    return Err(PlanError::OddShardCount { count: open.len() })
                }
                OddShardPolicy::LeaveLast => {
                    let last = open[open.len() - 1];
                    warn!(
                        count = open.len(),
                        shard_id = %last.shard_id,
                        "Odd open shard count, leaving highest shard unmerged"
                    );
                    left_over = Some(last.shard_id.clone());
                    &open[..open.len() - 1]
                }
            }
        } else if open.len() <= 1 {
            &open[..0]
        } else {
            &open[..]
        };

        let mut steps = Vec::with_capacity(pairable.len() / 2);
        for pair in pairable.chunks_exact(2) {
            let (lower, upper) = (pair[0], pair[1]);

            if !lower.hash_key_range.is_adjacent_to(&upper.hash_key_range) {
                return Err(PlanError::NotAdjacent {
                    first: lower.shard_id.clone(),
                    second: upper.shard_id.clone(),
                });
            }

            steps.push(ReshardStep::Merge {
                shard_to_merge: lower.shard_id.clone(),
                adjacent_shard_to_merge: upper.shard_id.clone(),
                merged_range: lower.hash_key_range.union(&upper.hash_key_range),
            });
        }

        let plan = Self {
            stream_name: topology.stream_name.clone(),
            kind: ReshardKind::Halve,
            open_shards: open.len(),
            steps,
            left_over,
        };
        info!(summary = %plan.summary(), "Merge plan created");
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Open shard count once every step has been applied
    pub fn expected_open_shards(&self) -> usize {
        match self.kind {
            ReshardKind::Double => self.open_shards + self.steps.len(),
            ReshardKind::Halve => self.open_shards - self.steps.len(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} steps, {} -> {} open shards",
            self.kind,
            self.stream_name,
            self.steps.len(),
            self.open_shards,
            self.expected_open_shards()
        )
    }
}
