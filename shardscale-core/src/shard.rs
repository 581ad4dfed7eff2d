//! Shard model
//!
//! Field names follow the control plane's wire format (PascalCase JSON), so the
//! same types decode describe-stream pages and encode `--json` output.

use serde::{Deserialize, Serialize};

use crate::hash_key::HashKeyRange;

/// Sequence numbers assigned to records in a shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SequenceNumberRange {
    pub starting_sequence_number: String,
    /// Set once the shard has been retired by a split or merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_sequence_number: Option<String>,
}

impl SequenceNumberRange {
    pub fn open(starting_sequence_number: impl Into<String>) -> Self {
        Self {
            starting_sequence_number: starting_sequence_number.into(),
            ending_sequence_number: None,
        }
    }
}

/// One partition of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Shard {
    pub shard_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_shard_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacent_parent_shard_id: Option<String>,
    pub hash_key_range: HashKeyRange,
    pub sequence_number_range: SequenceNumberRange,
}

impl Shard {
    /// A shard accepts writes until an ending sequence number is assigned
    pub fn is_open(&self) -> bool {
        self.sequence_number_range.ending_sequence_number.is_none()
    }

    /// Parent ids, for display
    pub fn parents(&self) -> Vec<&str> {
        self.parent_shard_id
            .iter()
            .chain(self.adjacent_parent_shard_id.iter())
            .map(String::as_str)
            .collect()
    }
}
