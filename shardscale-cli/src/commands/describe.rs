//! Describe Command
//!
//! Prints every shard of a stream, open and closed, from a stable topology.

use anyhow::{Context, Result};
use console::style;
use shardscale_core::StreamTopology;
use shardscale_rebalancer::{ControlPlane, Orchestrator};

/// Describe configuration
pub struct DescribeConfig {
    pub stream: String,
    pub json: bool,
}

/// Run describe command
pub async fn run<C: ControlPlane>(
    orchestrator: &Orchestrator<C>,
    config: DescribeConfig,
) -> Result<()> {
    let topology = orchestrator
        .describe_topology(&config.stream)
        .await
        .with_context(|| format!("Failed to describe stream {}", config.stream))?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&topology)?);
        return Ok(());
    }

    println!(
        "{} {}",
        style("Stream:").bold(),
        style(&topology.stream_name).cyan()
    );
    println!("  Status:        {}", style(topology.status).green());
    println!("  Open shards:   {}", topology.open_count());
    println!("  Closed shards: {}", topology.closed_count());
    println!();
    print!("{}", render_shards(&topology));

    Ok(())
}

/// One line per shard: id, state, key range and parents
pub fn render_shards(topology: &StreamTopology) -> String {
    let id_width = topology
        .shards
        .iter()
        .map(|s| s.shard_id.len())
        .max()
        .unwrap_or(0)
        .max("SHARD ID".len());

    let mut out = format!(
        "{:<id_width$}  {:<6}  {}\n",
        "SHARD ID", "STATE", "HASH KEY RANGE",
    );
    for shard in &topology.shards {
        let state = if shard.is_open() { "open" } else { "closed" };
        let parents = shard.parents();

        out.push_str(&format!(
            "{:<id_width$}  {:<6}  {}",
            shard.shard_id, state, shard.hash_key_range,
        ));
        if !parents.is_empty() {
            out.push_str(&format!("  <- {}", parents.join(", ")));
        }
        out.push('\n');
    }
    out
}
