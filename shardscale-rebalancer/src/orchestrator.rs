//! Resharding Orchestrator
//!
//! Drives split (double) and merge (halve) operations one mutation at a time:
//! - Read a stable topology and build a plan from it
//! - Issue one split/merge call
//! - Wait for the stream to return to ACTIVE
//! - Report the new distribution, then move to the next step
//!
//! The control plane accepts a single structural change per stream at a time,
//! so steps never overlap. A failed step aborts the rest; completed steps stay
//! applied since the control plane has no inverse operation.

use serde::Serialize;
use shardscale_core::StreamTopology;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ReshardConfig;
use crate::control_plane::ControlPlane;
use crate::error::{ReshardError, Result};
use crate::planner::{ReshardKind, ReshardPlan, ReshardStep};
use crate::reporter::TopologyReport;
use crate::topology::TopologyReader;

/// Progress of a running reshard
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Plan computed, nothing issued yet
    Planned(ReshardPlan),
    /// A mutation was accepted; waiting for the stream to settle
    Waiting { step: usize, total: usize, description: String },
    /// The stream is ACTIVE again after a step
    StepCompleted {
        step: usize,
        total: usize,
        report: TopologyReport,
    },
    /// All steps done
    Finished(ReshardOutcome),
}

/// Result of a completed reshard
#[derive(Debug, Clone, Serialize)]
pub struct ReshardOutcome {
    pub stream_name: String,
    pub kind: ReshardKind,
    pub open_before: usize,
    pub open_after: usize,
    pub steps_completed: usize,
    pub dry_run: bool,
    pub duration: Duration,
    pub final_report: Option<TopologyReport>,
}

impl ReshardOutcome {
    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} -> {} open shards, {} steps in {:?}{}",
            self.kind,
            self.stream_name,
            self.open_before,
            self.open_after,
            self.steps_completed,
            self.duration,
            if self.dry_run { " (dry run)" } else { "" }
        )
    }
}

/// Resharding orchestrator
pub struct Orchestrator<C: ControlPlane> {
    control_plane: Arc<C>,
    reader: TopologyReader<C>,
    config: ReshardConfig,
    progress_tx: Option<mpsc::Sender<ProgressEvent>>,
    cancel: CancellationToken,
}

impl<C: ControlPlane> Orchestrator<C> {
    /// Create an orchestrator over an injected control plane
    pub fn new(control_plane: Arc<C>, config: ReshardConfig) -> Self {
        Self::build(control_plane, config, CancellationToken::new())
    }

    /// Create an orchestrator with a progress channel
    pub fn with_progress(
        control_plane: Arc<C>,
        config: ReshardConfig,
    ) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(100);
        let mut orchestrator = Self::new(control_plane, config);
        orchestrator.progress_tx = Some(tx);
        (orchestrator, rx)
    }

    /// Abort waits when `cancel` fires
    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        let mut orchestrator = Self::build(self.control_plane, self.config, cancel);
        orchestrator.progress_tx = self.progress_tx;
        orchestrator
    }

    fn build(control_plane: Arc<C>, config: ReshardConfig, cancel: CancellationToken) -> Self {
        let reader = TopologyReader::new(control_plane.clone(), &config, cancel.clone());
        Self {
            control_plane,
            reader,
            config,
            progress_tx: None,
            cancel,
        }
    }

    /// Stable topology of `stream_name`
    pub async fn describe_topology(&self, stream_name: &str) -> Result<StreamTopology> {
        self.reader.fetch_stable_topology(stream_name).await
    }

    /// Key-space share of every open shard
    #[instrument(skip(self))]
    pub async fn view_topology(&self, stream_name: &str) -> Result<TopologyReport> {
        let topology = self.reader.fetch_stable_topology(stream_name).await?;
        Ok(TopologyReport::from_topology(&topology))
    }

    /// Plan for doubling, without mutating anything
    pub async fn plan_double(&self, stream_name: &str) -> Result<ReshardPlan> {
        let topology = self.reader.fetch_stable_topology(stream_name).await?;
        Ok(ReshardPlan::double(&topology)?)
    }

    /// Plan for halving, without mutating anything
    pub async fn plan_halve(&self, stream_name: &str) -> Result<ReshardPlan> {
        let topology = self.reader.fetch_stable_topology(stream_name).await?;
        Ok(ReshardPlan::halve(&topology, self.config.odd_shard_policy)?)
    }

    /// Split every open shard in two
    #[instrument(skip(self))]
    pub async fn double_shards(&self, stream_name: &str) -> Result<ReshardOutcome> {
        let plan = self.plan_double(stream_name).await?;
        self.execute(plan).await
    }

    /// Merge open shards pairwise
    #[instrument(skip(self))]
    pub async fn halve_shards(&self, stream_name: &str) -> Result<ReshardOutcome> {
        let plan = self.plan_halve(stream_name).await?;
        self.execute(plan).await
    }

    /// Apply a plan step by step
    async fn execute(&self, plan: ReshardPlan) -> Result<ReshardOutcome> {
        let start = Instant::now();
        let stream_name = plan.stream_name.clone();
        let total = plan.steps.len();

        self.emit(ProgressEvent::Planned(plan.clone())).await;

        if plan.is_empty() || self.config.dry_run {
            if self.config.dry_run {
                info!(summary = %plan.summary(), "Dry run, no mutations issued");
            } else {
                info!(stream = %stream_name, open = plan.open_shards, "Nothing to reshard");
            }
            let outcome = ReshardOutcome {
                stream_name,
                kind: plan.kind,
                open_before: plan.open_shards,
                open_after: plan.open_shards,
                steps_completed: 0,
                dry_run: self.config.dry_run,
                duration: start.elapsed(),
                final_report: None,
            };
            self.emit(ProgressEvent::Finished(outcome.clone())).await;
            return Ok(outcome);
        }

        info!(summary = %plan.summary(), "Starting reshard");

        let mut last_report = None;
        for (index, step) in plan.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(completed = index, total, "Cancelled between steps");
                return Err(ReshardError::Cancelled);
            }

            let number = index + 1;
            self.apply(&stream_name, step).await?;

            self.emit(ProgressEvent::Waiting {
                step: number,
                total,
                description: step.to_string(),
            })
            .await;

            // The mutation is in place from here on; failures carry the step
            let settled = match self.reader.wait_until_active(&stream_name).await {
                Ok(()) => self.view_topology(&stream_name).await,
                Err(e) => Err(e),
            };
            let report = settled.map_err(|source| {
                warn!(step = number, total, error = %source, "Step applied but not confirmed");
                ReshardError::StepIncomplete {
                    step: number,
                    total,
                    description: step.to_string(),
                    steps_completed: index,
                    source: Box::new(source),
                }
            })?;
            info!(
                step = number,
                total,
                open_shards = report.open_shards(),
                "Step complete: {}",
                step
            );
            self.emit(ProgressEvent::StepCompleted {
                step: number,
                total,
                report: report.clone(),
            })
            .await;
            last_report = Some(report);
        }

        let outcome = ReshardOutcome {
            stream_name,
            kind: plan.kind,
            open_before: plan.open_shards,
            open_after: last_report
                .as_ref()
                .map(|r| r.open_shards())
                .unwrap_or(plan.open_shards),
            steps_completed: total,
            dry_run: false,
            duration: start.elapsed(),
            final_report: last_report,
        };

        info!(summary = %outcome.summary(), "Reshard complete");
        self.emit(ProgressEvent::Finished(outcome.clone())).await;

        Ok(outcome)
    }

    /// Issue the control-plane call for one step
    async fn apply(&self, stream_name: &str, step: &ReshardStep) -> Result<()> {
        match step {
            ReshardStep::Split {
                shard_id,
                new_starting_hash_key,
                ..
            } => {
                info!(
                    shard_id = %shard_id,
                    new_starting_hash_key = %new_starting_hash_key,
                    "Splitting shard"
                );
                self.control_plane
                    .split_shard(stream_name, shard_id, *new_starting_hash_key)
                    .await
                    .map_err(|source| ReshardError::SplitFailed {
                        shard_id: shard_id.clone(),
                        source,
                    })
            }
            ReshardStep::Merge {
                shard_to_merge,
                adjacent_shard_to_merge,
                ..
            } => {
                info!(
                    shard_to_merge = %shard_to_merge,
                    adjacent_shard_to_merge = %adjacent_shard_to_merge,
                    "Merging shards"
                );
                self.control_plane
                    .merge_shards(stream_name, shard_to_merge, adjacent_shard_to_merge)
                    .await
                    .map_err(|source| ReshardError::MergeFailed {
                        shard_to_merge: shard_to_merge.clone(),
                        adjacent_shard_to_merge: adjacent_shard_to_merge.clone(),
                        source,
                    })
            }
        }
    }

    async fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(event).await;
        }
    }
}
