//! Topology Reader
//!
//! Rebuilds the full shard list of a stream from the paginated describe call.
//! A snapshot only counts if every page was read while the stream reported
//! ACTIVE; any other status throws away what was collected and starts over.

use shardscale_core::{StreamStatus, StreamTopology};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ReshardConfig;
use crate::control_plane::{ControlPlane, ControlPlaneError};
use crate::error::{ReshardError, Result};

/// Reads stable topologies and waits for streams to settle
pub struct TopologyReader<C: ControlPlane> {
    control_plane: Arc<C>,
    poll_interval: Duration,
    wait_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<C: ControlPlane> TopologyReader<C> {
    pub fn new(control_plane: Arc<C>, config: &ReshardConfig, cancel: CancellationToken) -> Self {
        Self {
            control_plane,
            poll_interval: config.poll_interval,
            wait_timeout: config.wait_timeout,
            cancel,
        }
    }

    /// Every shard of `stream_name`, gathered while the stream stayed ACTIVE
    #[instrument(skip(self))]
    pub async fn fetch_stable_topology(&self, stream_name: &str) -> Result<StreamTopology> {
        let started = Instant::now();
        let mut shards = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        let mut restarts = 0usize;

        loop {
            let page = self
                .control_plane
                .describe_stream(stream_name, cursor.as_deref())
                .await?;

            if !page.stream_status.is_active() {
                restarts += 1;
                debug!(
                    status = %page.stream_status,
                    discarded = shards.len(),
                    restarts,
                    "Stream not active, restarting shard listing"
                );
                shards.clear();
                cursor = None;
                pages = 0;
                self.pause(stream_name, started).await?;
                continue;
            }

            pages += 1;
            let has_more = page.has_more_shards;
            let last_shard_id = page.shards.last().map(|s| s.shard_id.clone());
            shards.extend(page.shards);

            if !has_more {
                debug!(pages, shards = shards.len(), restarts, "Topology complete");
                return Ok(StreamTopology::new(
                    stream_name,
                    StreamStatus::Active,
                    shards,
                ));
            }

            match last_shard_id {
                Some(id) => cursor = Some(id),
                None => {
                    return Err(ControlPlaneError::InvalidResponse(
                        "page reported more shards but contained none".to_string(),
                    )
                    .into())
                }
            }
        }
    }

    /// Poll the status-only call until the stream reports ACTIVE
    #[instrument(skip(self))]
    pub async fn wait_until_active(&self, stream_name: &str) -> Result<()> {
        let started = Instant::now();
        let mut attempt = 0u64;

        loop {
            attempt += 1;
            let summary = self
                .control_plane
                .describe_stream_summary(stream_name)
                .await?;

            if summary.stream_status.is_active() {
                debug!(attempt, elapsed = ?started.elapsed(), "Stream active");
                return Ok(());
            }

            debug!(attempt, status = %summary.stream_status, "Waiting for stream");
            self.pause(stream_name, started).await?;
        }
    }

    /// Sleep one poll interval, honouring the timeout and cancellation
    async fn pause(&self, stream_name: &str, started: Instant) -> Result<()> {
        if let Some(limit) = self.wait_timeout {
            let waited = started.elapsed();
            if waited >= limit {
                return Err(ReshardError::WaitTimedOut {
                    stream: stream_name.to_string(),
                    waited,
                });
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ReshardError::Cancelled),
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::Result as CpResult;
    use parking_lot::Mutex;
    use shardscale_core::{
        HashKey, HashKeyRange, SequenceNumberRange, Shard, StreamDescription,
        StreamDescriptionSummary,
    };
    use std::collections::VecDeque;

    /// Replays canned describe pages and records the cursors it was asked for
    struct ScriptedControlPlane {
        pages: Mutex<VecDeque<StreamDescription>>,
        statuses: Mutex<VecDeque<StreamStatus>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedControlPlane {
        fn with_pages(pages: Vec<StreamDescription>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                statuses: Mutex::new(VecDeque::new()),
                cursors: Mutex::new(Vec::new()),
            }
        }

        fn with_statuses(statuses: Vec<StreamStatus>) -> Self {
            Self {
                pages: Mutex::new(VecDeque::new()),
                statuses: Mutex::new(statuses.into()),
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ControlPlane for ScriptedControlPlane {
        async fn describe_stream(
            &self,
            _stream_name: &str,
            exclusive_start_shard_id: Option<&str>,
        ) -> CpResult<StreamDescription> {
            self.cursors
                .lock()
                .push(exclusive_start_shard_id.map(str::to_string));
            self.pages
                .lock()
                .pop_front()
                .ok_or_else(|| ControlPlaneError::InvalidResponse("script exhausted".into()))
        }

        async fn describe_stream_summary(
            &self,
            stream_name: &str,
        ) -> CpResult<StreamDescriptionSummary> {
            let status = self
                .statuses
                .lock()
                .pop_front()
                .ok_or_else(|| ControlPlaneError::InvalidResponse("script exhausted".into()))?;
            Ok(StreamDescriptionSummary {
                stream_name: stream_name.to_string(),
                stream_status: status,
                open_shard_count: None,
            })
        }

        async fn split_shard(&self, _: &str, _: &str, _: HashKey) -> CpResult<()> {
            unreachable!("reader never mutates")
        }

        async fn merge_shards(&self, _: &str, _: &str, _: &str) -> CpResult<()> {
            unreachable!("reader never mutates")
        }
    }

    fn shard(id: &str, n: u128) -> Shard {
        Shard {
            shard_id: id.to_string(),
            parent_shard_id: None,
            adjacent_parent_shard_id: None,
            hash_key_range: HashKeyRange::new(HashKey::new(n), HashKey::new(n)).unwrap(),
            sequence_number_range: SequenceNumberRange::open("1"),
        }
    }

    fn page(status: StreamStatus, ids: &[&str], has_more: bool) -> StreamDescription {
        StreamDescription {
            stream_name: "clicks".to_string(),
            stream_arn: None,
            stream_status: status,
            shards: ids
                .iter()
                .enumerate()
                .map(|(i, id)| shard(id, i as u128))
                .collect(),
            has_more_shards: has_more,
        }
    }

    fn fast_config() -> ReshardConfig {
        ReshardConfig {
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn ids(topology: &StreamTopology) -> Vec<&str> {
        topology.shards.iter().map(|s| s.shard_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_follows_pagination_cursor() {
        let cp = Arc::new(ScriptedControlPlane::with_pages(vec![
            page(StreamStatus::Active, &["a", "b"], true),
            page(StreamStatus::Active, &["c"], false),
        ]));
        let reader = TopologyReader::new(cp.clone(), &fast_config(), CancellationToken::new());

        let topology = reader.fetch_stable_topology("clicks").await.unwrap();

        assert_eq!(ids(&topology), vec!["a", "b", "c"]);
        assert_eq!(topology.status, StreamStatus::Active);
        assert_eq!(*cp.cursors.lock(), vec![None, Some("b".to_string())]);
    }

    #[tokio::test]
    async fn test_status_flip_discards_collected_pages() {
        let cp = Arc::new(ScriptedControlPlane::with_pages(vec![
            page(StreamStatus::Active, &["a", "b"], true),
            page(StreamStatus::Updating, &["c"], true),
            page(StreamStatus::Active, &["x", "y"], true),
            page(StreamStatus::Active, &["z"], false),
        ]));
        let reader = TopologyReader::new(cp.clone(), &fast_config(), CancellationToken::new());

        let topology = reader.fetch_stable_topology("clicks").await.unwrap();

        assert_eq!(ids(&topology), vec!["x", "y", "z"]);
        assert_eq!(
            *cp.cursors.lock(),
            vec![
                None,
                Some("b".to_string()),
                None,
                Some("y".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_more_page_is_invalid() {
        let cp = Arc::new(ScriptedControlPlane::with_pages(vec![page(
            StreamStatus::Active,
            &[],
            true,
        )]));
        let reader = TopologyReader::new(cp, &fast_config(), CancellationToken::new());

        let err = reader.fetch_stable_topology("clicks").await.unwrap_err();
        assert!(matches!(
            err,
            ReshardError::ControlPlane(ControlPlaneError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_api_error_propagates_immediately() {
        let cp = Arc::new(ScriptedControlPlane::with_pages(Vec::new()));
        let reader = TopologyReader::new(cp.clone(), &fast_config(), CancellationToken::new());

        assert!(reader.fetch_stable_topology("clicks").await.is_err());
        assert_eq!(cp.cursors.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_until_active_polls_summary() {
        let cp = Arc::new(ScriptedControlPlane::with_statuses(vec![
            StreamStatus::Updating,
            StreamStatus::Updating,
            StreamStatus::Active,
        ]));
        let reader = TopologyReader::new(cp.clone(), &fast_config(), CancellationToken::new());

        reader.wait_until_active("clicks").await.unwrap();
        assert!(cp.statuses.lock().is_empty());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let cp = Arc::new(ScriptedControlPlane::with_statuses(
            std::iter::repeat(StreamStatus::Updating).take(1000).collect(),
        ));
        let config = ReshardConfig {
            poll_interval: Duration::from_millis(5),
            wait_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let reader = TopologyReader::new(cp, &config, CancellationToken::new());

        let err = reader.wait_until_active("clicks").await.unwrap_err();
        assert!(matches!(err, ReshardError::WaitTimedOut { .. }));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let cp = Arc::new(ScriptedControlPlane::with_statuses(vec![StreamStatus::Updating]));
        let config = ReshardConfig {
            poll_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let reader = TopologyReader::new(cp, &config, cancel.clone());

        cancel.cancel();
        let err = reader.wait_until_active("clicks").await.unwrap_err();
        assert!(matches!(err, ReshardError::Cancelled));
    }
}
