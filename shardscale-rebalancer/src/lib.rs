//! shardscale Rebalancer Library
//!
//! Doubles or halves the open shards of a stream through its control plane.
//!
//! The orchestrator:
//! - Reads a stable topology (every page collected while the stream is ACTIVE)
//! - Plans midpoint splits or key-adjacent merges
//! - Issues one mutation at a time and waits for the stream to settle
//! - Reports each open shard's share of the key space after every step

pub mod config;
pub mod control_plane;
pub mod error;
pub mod http_client;
pub mod orchestrator;
pub mod planner;
pub mod reporter;
pub mod simulator;
pub mod topology;

// Re-export main types
pub use config::{ConfigError, ConnectionConfig, OddShardPolicy, ReshardConfig};
pub use control_plane::{ControlPlane, ControlPlaneError};
pub use error::ReshardError;
pub use http_client::HttpControlPlane;
pub use orchestrator::{Orchestrator, ProgressEvent, ReshardOutcome};
pub use planner::{PlanError, ReshardKind, ReshardPlan, ReshardStep};
pub use reporter::{ShardCoverage, TopologyReport};
pub use simulator::{Mutation, SimulatedStream};
pub use topology::TopologyReader;
