//! View Command
//!
//! Shows how much of the key space each open shard owns.

use anyhow::{Context, Result};
use console::style;
use shardscale_core::format_percentage;
use shardscale_rebalancer::{ControlPlane, Orchestrator, TopologyReport};

/// View configuration
pub struct ViewConfig {
    pub stream: String,
    pub json: bool,
}

/// Run view command
pub async fn run<C: ControlPlane>(
    orchestrator: &Orchestrator<C>,
    config: ViewConfig,
) -> Result<()> {
    let report = orchestrator
        .view_topology(&config.stream)
        .await
        .with_context(|| format!("Failed to read topology of {}", config.stream))?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Print the coverage table followed by the total
pub fn print_report(report: &TopologyReport) {
    print!("{}", report.to_table());

    let total = format_percentage(report.total_coverage);
    let total = if (report.total_coverage - 1.0).abs() < 1e-6 {
        style(total).green()
    } else {
        style(total).yellow()
    };
    println!(
        "{} open shards, total coverage {}",
        report.open_shards(),
        total
    );
}
