//! shardscale core library
//!
//! Pure building blocks for resharding a partitioned event stream:
//! - Hash-key arithmetic over the `[0, 2^128)` key space
//! - The shard and stream model, decoded from control-plane responses
//! - Open-shard classification and key-space coverage checks

pub mod classifier;
pub mod error;
pub mod hash_key;
pub mod shard;
pub mod stream;

pub use classifier::{filter_open_shards, verify_key_space_coverage, CoverageIssue};
pub use error::{Result, ShardScaleError};
pub use hash_key::{format_percentage, midpoint_key, HashKey, HashKeyRange, KEY_SPACE_SIZE};
pub use shard::{SequenceNumberRange, Shard};
pub use stream::{StreamDescription, StreamDescriptionSummary, StreamStatus, StreamTopology};
