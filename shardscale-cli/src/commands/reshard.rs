//! Reshard Commands
//!
//! Doubles or halves the open shards of a stream, rendering progress events
//! as they arrive: a spinner while the stream settles and a coverage table
//! after every step.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use shardscale_rebalancer::{
    ControlPlane, Orchestrator, ProgressEvent, ReshardKind, ReshardPlan, ReshardStep,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::commands::view::print_report;
use crate::symbols;

/// Reshard configuration
pub struct ReshardCommandConfig {
    pub stream: String,
    pub kind: ReshardKind,
}

/// Run double/halve command
pub async fn run<C: ControlPlane>(
    orchestrator: Orchestrator<C>,
    progress: mpsc::Receiver<ProgressEvent>,
    config: ReshardCommandConfig,
) -> Result<()> {
    let renderer = tokio::spawn(render_progress(progress));

    let result = match config.kind {
        ReshardKind::Double => orchestrator.double_shards(&config.stream).await,
        ReshardKind::Halve => orchestrator.halve_shards(&config.stream).await,
    };

    // Closes the progress channel so the renderer drains and exits
    drop(orchestrator);
    match renderer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Progress display failed"),
        Err(e) => warn!(error = %e, "Progress renderer panicked"),
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!(
                "{} Reshard of {} stopped; steps already applied remain in place",
                style(symbols::CROSS).red(),
                config.stream
            );
            return Err(e).with_context(|| {
                format!("Failed to {} shards of {}", config.kind, config.stream)
            });
        }
    };

    println!();
    if outcome.dry_run {
        println!(
            "{} Dry run: no shards were changed",
            style(symbols::WARN).yellow()
        );
    } else {
        println!(
            "{} {}",
            style(symbols::CHECK).green(),
            style(outcome.summary()).bold()
        );
    }

    Ok(())
}

async fn render_progress(mut progress: mpsc::Receiver<ProgressEvent>) -> Result<()> {
    let spinner_style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")?;
    let mut spinner: Option<ProgressBar> = None;

    while let Some(event) = progress.recv().await {
        match event {
            ProgressEvent::Planned(plan) => print!("{}", render_plan(&plan)),
            ProgressEvent::Waiting {
                step,
                total,
                description,
            } => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(spinner_style.clone());
                pb.enable_steady_tick(Duration::from_millis(120));
                pb.set_message(format!(
                    "[{}/{}] {}: waiting for stream to become ACTIVE",
                    step, total, description
                ));
                spinner = Some(pb);
            }
            ProgressEvent::StepCompleted {
                step,
                total,
                report,
            } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_and_clear();
                }
                println!();
                println!(
                    "{} {}",
                    style(format!("Step {}/{}", step, total)).bold(),
                    style(symbols::CHECK).green()
                );
                print_report(&report);
            }
            ProgressEvent::Finished(_) => {}
        }
    }

    // The operation failed while a step was settling
    if let Some(pb) = spinner.take() {
        pb.abandon();
    }

    Ok(())
}

/// Human-readable plan, one line per step
pub fn render_plan(plan: &ReshardPlan) -> String {
    let mut out = format!("Plan: {}\n", plan.summary());

    for (i, step) in plan.steps.iter().enumerate() {
        let detail = match step {
            ReshardStep::Split { range, .. } => format!("{}", range),
            ReshardStep::Merge { merged_range, .. } => {
                format!("{} {}", symbols::ARROW, merged_range)
            }
        };
        out.push_str(&format!("  {:>3}. {}  {}\n", i + 1, step, detail));
    }

    if let Some(shard_id) = &plan.left_over {
        out.push_str(&format!(
            "  {} {} stays unmerged (odd shard count)\n",
            symbols::WARN,
            shard_id
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardscale_rebalancer::{
        OddShardPolicy, PlanError, ReshardConfig, ReshardError, SimulatedStream,
    };
    use std::sync::Arc;

    fn orchestrator(
        stream: SimulatedStream,
        policy: OddShardPolicy,
    ) -> Orchestrator<SimulatedStream> {
        Orchestrator::new(
            Arc::new(stream),
            ReshardConfig {
                poll_interval: Duration::from_millis(1),
                odd_shard_policy: policy,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_render_halve_plan() {
        let orchestrator = orchestrator(
            SimulatedStream::with_even_shards("clicks", 4),
            OddShardPolicy::Reject,
        );
        let plan = orchestrator.plan_halve("clicks").await.unwrap();
        let rendered = render_plan(&plan);
        let lines: Vec<_> = rendered.lines().collect();

        assert_eq!(lines[0], "Plan: halve clicks: 2 steps, 4 -> 2 open shards");
        assert!(lines[1].contains("merge shardId-000000000000 + shardId-000000000001"));
        assert!(lines[2].contains("merge shardId-000000000002 + shardId-000000000003"));
    }

    #[tokio::test]
    async fn test_render_left_over_shard() {
        let orchestrator = orchestrator(
            SimulatedStream::with_even_shards("clicks", 3),
            OddShardPolicy::LeaveLast,
        );
        let plan = orchestrator.plan_halve("clicks").await.unwrap();
        let rendered = render_plan(&plan);

        assert!(rendered.contains("shardId-000000000002 stays unmerged"));
    }

    #[tokio::test]
    async fn test_run_double_to_completion() {
        let stream = Arc::new(SimulatedStream::with_even_shards("clicks", 2));
        let (orchestrator, rx) = Orchestrator::with_progress(
            stream.clone(),
            ReshardConfig {
                poll_interval: Duration::from_millis(1),
                ..Default::default()
            },
        );

        run(
            orchestrator,
            rx,
            ReshardCommandConfig {
                stream: "clicks".to_string(),
                kind: ReshardKind::Double,
            },
        )
        .await
        .unwrap();

        assert_eq!(stream.mutations().len(), 2);
    }

    #[tokio::test]
    async fn test_run_returns_reshard_error() {
        let stream = Arc::new(SimulatedStream::with_even_shards("clicks", 3));
        let (orchestrator, rx) = Orchestrator::with_progress(
            stream.clone(),
            ReshardConfig {
                poll_interval: Duration::from_millis(1),
                ..Default::default()
            },
        );

        let err = run(
            orchestrator,
            rx,
            ReshardCommandConfig {
                stream: "clicks".to_string(),
                kind: ReshardKind::Halve,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Failed to halve shards of clicks");
        assert!(matches!(
            err.downcast_ref::<ReshardError>(),
            Some(ReshardError::Plan(PlanError::OddShardCount { count: 3 }))
        ));
        assert!(stream.mutations().is_empty());
    }
}
