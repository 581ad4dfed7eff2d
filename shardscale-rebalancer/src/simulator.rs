//! In-memory stream control plane
//!
//! Applies splits and merges to a local shard list with the same rules the
//! real service enforces: one mutation at a time, an UPDATING window after each
//! mutation, inclusive hash-key ranges, and merges only between a shard and the
//! shard immediately above it. Used to exercise the orchestrator without a
//! network.

use parking_lot::Mutex;
use shardscale_core::{
    HashKey, HashKeyRange, SequenceNumberRange, Shard, StreamDescription,
    StreamDescriptionSummary, StreamStatus,
};
use tracing::debug;

use crate::control_plane::{ControlPlane, ControlPlaneError, Result};

/// A mutation accepted by the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Split {
        shard_to_split: String,
        new_starting_hash_key: HashKey,
    },
    Merge {
        shard_to_merge: String,
        adjacent_shard_to_merge: String,
    },
}

struct State {
    shards: Vec<Shard>,
    next_shard_index: u64,
    next_sequence: u64,
    /// Status checks left that report UPDATING
    updating_polls: u32,
    mutations: Vec<Mutation>,
    attempts: usize,
}

/// Simulated stream
pub struct SimulatedStream {
    name: String,
    page_size: usize,
    settle_polls: u32,
    fail_on_attempt: Option<usize>,
    state: Mutex<State>,
}

impl SimulatedStream {
    /// A stream whose `count` open shards split the key space evenly
    pub fn with_even_shards(name: impl Into<String>, count: usize) -> Self {
        let count = count.max(1) as u128;
        let step = if count == 1 { 0 } else { u128::MAX / count + 1 };

        let shards = (0..count)
            .map(|i| {
                let start = i * step;
                let end = if i + 1 == count {
                    u128::MAX
                } else {
                    (i + 1) * step - 1
                };
                new_shard(i as u64, key_range(start, end), i as u64, None, None)
            })
            .collect();

        Self::from_shards(name, shards)
    }

    /// A stream with an explicit shard list
    pub fn from_shards(name: impl Into<String>, shards: Vec<Shard>) -> Self {
        let next_shard_index = shards.len() as u64;
        Self {
            name: name.into(),
            page_size: 100,
            settle_polls: 1,
            fail_on_attempt: None,
            state: Mutex::new(State {
                next_sequence: next_shard_index,
                shards,
                next_shard_index,
                updating_polls: 0,
                mutations: Vec::new(),
                attempts: 0,
            }),
        }
    }

    /// Shards returned per describe page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Status checks reporting UPDATING after each mutation
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    /// Fail the `n`th mutation call (0-based) with an API error
    pub fn fail_mutation(mut self, n: usize) -> Self {
        self.fail_on_attempt = Some(n);
        self
    }

    /// Mutations accepted so far
    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().mutations.clone()
    }

    /// Every shard, open and closed
    pub fn shards(&self) -> Vec<Shard> {
        self.state.lock().shards.clone()
    }

    fn check_name(&self, stream_name: &str) -> Result<()> {
        if stream_name != self.name {
            return Err(api_error(
                "ResourceNotFoundException",
                format!("Stream {} not found", stream_name),
            ));
        }
        Ok(())
    }
}

impl State {
    fn observe_status(&mut self) -> StreamStatus {
        if self.updating_polls > 0 {
            self.updating_polls -= 1;
            StreamStatus::Updating
        } else {
            StreamStatus::Active
        }
    }

    fn begin_mutation(&mut self, fail_on_attempt: Option<usize>) -> Result<()> {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.updating_polls > 0 {
            return Err(api_error(
                "ResourceInUseException",
                "Stream is currently being updated".to_string(),
            ));
        }
        if fail_on_attempt == Some(attempt) {
            return Err(api_error(
                "LimitExceededException",
                "Injected failure".to_string(),
            ));
        }
        Ok(())
    }

    fn open_shard(&self, shard_id: &str) -> Result<usize> {
        self.shards
            .iter()
            .position(|s| s.shard_id == shard_id && s.is_open())
            .ok_or_else(|| {
                api_error(
                    "ResourceNotFoundException",
                    format!("Open shard {} not found", shard_id),
                )
            })
    }

    fn close(&mut self, index: usize) {
        let sequence = self.next_sequence();
        self.shards[index].sequence_number_range.ending_sequence_number = Some(sequence);
    }

    fn next_sequence(&mut self) -> String {
        self.next_sequence += 1;
        format!("{:056}", self.next_sequence)
    }

    fn push_child(&mut self, range: HashKeyRange, parent: &str, adjacent_parent: Option<&str>) {
        let index = self.next_shard_index;
        self.next_shard_index += 1;
        self.next_sequence += 1;
        let shard = new_shard(
            index,
            range,
            self.next_sequence,
            Some(parent.to_string()),
            adjacent_parent.map(str::to_string),
        );
        self.shards.push(shard);
    }
}

fn new_shard(
    index: u64,
    range: HashKeyRange,
    sequence: u64,
    parent_shard_id: Option<String>,
    adjacent_parent_shard_id: Option<String>,
) -> Shard {
    Shard {
        shard_id: format!("shardId-{:012}", index),
        parent_shard_id,
        adjacent_parent_shard_id,
        hash_key_range: range,
        sequence_number_range: SequenceNumberRange::open(format!("{:056}", sequence)),
    }
}

fn api_error(code: &str, message: String) -> ControlPlaneError {
    ControlPlaneError::Api {
        status: 400,
        code: code.to_string(),
        message,
    }
}

fn key_range(start: u128, end: u128) -> HashKeyRange {
    HashKeyRange {
        starting_hash_key: HashKey::new(start),
        ending_hash_key: HashKey::new(end),
    }
}

#[async_trait::async_trait]
impl ControlPlane for SimulatedStream {
    async fn describe_stream(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<StreamDescription> {
        self.check_name(stream_name)?;
        let mut state = self.state.lock();
        let status = state.observe_status();

        let start = match exclusive_start_shard_id {
            Some(id) => {
                state
                    .shards
                    .iter()
                    .position(|s| s.shard_id == id)
                    .ok_or_else(|| {
                        api_error(
                            "InvalidArgumentException",
                            format!("Unknown ExclusiveStartShardId {}", id),
                        )
                    })?
                    + 1
            }
            None => 0,
        };

        let end = (start + self.page_size).min(state.shards.len());
        let shards = state.shards[start..end].to_vec();

        Ok(StreamDescription {
            stream_name: self.name.clone(),
            stream_arn: None,
            stream_status: status,
            shards,
            has_more_shards: end < state.shards.len(),
        })
    }

    async fn describe_stream_summary(
        &self,
        stream_name: &str,
    ) -> Result<StreamDescriptionSummary> {
        self.check_name(stream_name)?;
        let mut state = self.state.lock();
        let status = state.observe_status();
        let open = state.shards.iter().filter(|s| s.is_open()).count();

        Ok(StreamDescriptionSummary {
            stream_name: self.name.clone(),
            stream_status: status,
            open_shard_count: Some(open as u32),
        })
    }

    async fn split_shard(
        &self,
        stream_name: &str,
        shard_to_split: &str,
        new_starting_hash_key: HashKey,
    ) -> Result<()> {
        self.check_name(stream_name)?;
        let mut state = self.state.lock();
        state.begin_mutation(self.fail_on_attempt)?;

        let index = state.open_shard(shard_to_split)?;
        let range = state.shards[index].hash_key_range;

        if new_starting_hash_key <= range.starting_hash_key
            || new_starting_hash_key > range.ending_hash_key
        {
            return Err(api_error(
                "InvalidArgumentException",
                format!(
                    "NewStartingHashKey {} is outside {}",
                    new_starting_hash_key, range
                ),
            ));
        }
        let lower_end = HashKey::new(new_starting_hash_key.value() - 1);

        state.close(index);
        state.push_child(
            HashKeyRange {
                starting_hash_key: range.starting_hash_key,
                ending_hash_key: lower_end,
            },
            shard_to_split,
            None,
        );
        state.push_child(
            HashKeyRange {
                starting_hash_key: new_starting_hash_key,
                ending_hash_key: range.ending_hash_key,
            },
            shard_to_split,
            None,
        );

        state.updating_polls = self.settle_polls;
        state.mutations.push(Mutation::Split {
            shard_to_split: shard_to_split.to_string(),
            new_starting_hash_key,
        });
        debug!(shard_to_split, %new_starting_hash_key, "Simulated split");
        Ok(())
    }

    async fn merge_shards(
        &self,
        stream_name: &str,
        shard_to_merge: &str,
        adjacent_shard_to_merge: &str,
    ) -> Result<()> {
        self.check_name(stream_name)?;
        let mut state = self.state.lock();
        state.begin_mutation(self.fail_on_attempt)?;

        let lower = state.open_shard(shard_to_merge)?;
        let upper = state.open_shard(adjacent_shard_to_merge)?;
        let lower_range = state.shards[lower].hash_key_range;
        let upper_range = state.shards[upper].hash_key_range;

        if !lower_range.is_adjacent_to(&upper_range) {
            return Err(api_error(
                "InvalidArgumentException",
                format!(
                    "Shards {} and {} are not adjacent",
                    shard_to_merge, adjacent_shard_to_merge
                ),
            ));
        }

        state.close(lower);
        state.close(upper);
        state.push_child(
            lower_range.union(&upper_range),
            shard_to_merge,
            Some(adjacent_shard_to_merge),
        );

        state.updating_polls = self.settle_polls;
        state.mutations.push(Mutation::Merge {
            shard_to_merge: shard_to_merge.to_string(),
            adjacent_shard_to_merge: adjacent_shard_to_merge.to_string(),
        });
        debug!(shard_to_merge, adjacent_shard_to_merge, "Simulated merge");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardscale_core::verify_key_space_coverage;

    #[test]
    fn test_even_shards_cover_key_space() {
        for count in [1, 2, 3, 4, 7, 16] {
            let stream = SimulatedStream::with_even_shards("clicks", count);
            assert_eq!(stream.shards().len(), count);
            assert_eq!(verify_key_space_coverage(&stream.shards()), Ok(()));
        }
    }

    #[test]
    fn test_four_shards_are_quarters() {
        let stream = SimulatedStream::with_even_shards("clicks", 4);
        let shards = stream.shards();
        assert_eq!(
            shards[1].hash_key_range.starting_hash_key,
            HashKey::new(1u128 << 126)
        );
        assert_eq!(
            shards[2].hash_key_range.starting_hash_key,
            HashKey::new(1u128 << 127)
        );
    }

    #[tokio::test]
    async fn test_pages() {
        let stream = SimulatedStream::with_even_shards("clicks", 5).with_page_size(2);

        let first = stream.describe_stream("clicks", None).await.unwrap();
        assert_eq!(first.shards.len(), 2);
        assert!(first.has_more_shards);

        let last = stream
            .describe_stream("clicks", Some("shardId-000000000003"))
            .await
            .unwrap();
        assert_eq!(last.shards.len(), 1);
        assert!(!last.has_more_shards);
    }

    #[tokio::test]
    async fn test_split_and_updating_window() {
        let stream = SimulatedStream::with_even_shards("clicks", 1).with_settle_polls(2);

        stream
            .split_shard("clicks", "shardId-000000000000", HashKey::new(1u128 << 127))
            .await
            .unwrap();

        // Second mutation while updating is refused
        let err = stream
            .split_shard("clicks", "shardId-000000000001", HashKey::new(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ResourceInUseException"));

        let s1 = stream.describe_stream_summary("clicks").await.unwrap();
        let s2 = stream.describe_stream_summary("clicks").await.unwrap();
        let s3 = stream.describe_stream_summary("clicks").await.unwrap();
        assert_eq!(s1.stream_status, StreamStatus::Updating);
        assert_eq!(s2.stream_status, StreamStatus::Updating);
        assert_eq!(s3.stream_status, StreamStatus::Active);
        assert_eq!(s3.open_shard_count, Some(2));
        assert_eq!(verify_key_space_coverage(&stream.shards()), Ok(()));
    }

    #[tokio::test]
    async fn test_split_rejects_boundary_keys() {
        let stream = SimulatedStream::with_even_shards("clicks", 1);
        let err = stream
            .split_shard("clicks", "shardId-000000000000", HashKey::MIN)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("InvalidArgumentException"));
        assert!(stream.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_merge_requires_lower_shard_first() {
        let stream = SimulatedStream::with_even_shards("clicks", 2).with_settle_polls(0);

        let err = stream
            .merge_shards("clicks", "shardId-000000000001", "shardId-000000000000")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("InvalidArgumentException"));

        stream
            .merge_shards("clicks", "shardId-000000000000", "shardId-000000000001")
            .await
            .unwrap();
        let merged = stream.shards().into_iter().find(|s| s.is_open()).unwrap();
        assert_eq!(merged.hash_key_range, HashKeyRange::full());
        assert_eq!(merged.parents(), vec!["shardId-000000000000", "shardId-000000000001"]);
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let stream = SimulatedStream::with_even_shards("clicks", 1);
        let err = stream.describe_stream_summary("views").await.unwrap_err();
        assert_eq!(err.code(), Some("ResourceNotFoundException"));
    }
}
