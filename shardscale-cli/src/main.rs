//! shardscale CLI
//!
//! Doubles or halves the open shards of a stream and reports how the hash-key
//! space is spread across them.
//!
//! # Commands
//! - `describe` - Show every shard of a stream
//! - `view` - Show each open shard's share of the key space
//! - `double` - Split every open shard at its midpoint
//! - `halve` - Merge open shards pairwise
//! - `config` - Show or initialize configuration
//!
//! # Configuration
//! Config file: ~/.shardscale/config.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shardscale_rebalancer::{HttpControlPlane, OddShardPolicy, Orchestrator, ReshardKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

mod commands;
mod config;
mod symbols;

use commands::{describe, reshard, view};

#[derive(Parser)]
#[command(name = "shardscale")]
#[command(about = "Double or halve the shards of a data stream")]
#[command(version)]
struct Cli {
    /// Region used to derive the service endpoint (overrides config file)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Custom service endpoint, e.g. a local emulator (overrides config file)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Seconds between status polls while the stream is updating
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Give up waiting for the stream after this many seconds
    #[arg(long, global = true)]
    wait_timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every shard of a stream
    Describe {
        /// Stream name
        stream: String,

        /// Print the topology as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show each open shard's share of the key space
    View {
        /// Stream name
        stream: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split every open shard at the midpoint of its key range
    Double {
        /// Stream name
        stream: String,

        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge open shards pairwise in key order
    Halve {
        /// Stream name
        stream: String,

        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,

        /// What to do with an odd open-shard count: reject or leave-last
        #[arg(long)]
        odd_shards: Option<OddShardPolicy>,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    // Load configuration from ~/.shardscale/config.toml
    let cfg = config::load_config();

    let mut overrides = config::Overrides {
        region: cli.region,
        endpoint: cli.endpoint,
        poll_interval_secs: cli.poll_interval,
        wait_timeout_secs: cli.wait_timeout,
        ..Default::default()
    };

    let (stream, kind) = match cli.command {
        Commands::Config { command } => return handle_config_command(command),

        Commands::Describe { stream, json } => {
            let orchestrator = build_orchestrator(&cfg, &overrides)?;
            return describe::run(&orchestrator, describe::DescribeConfig { stream, json }).await;
        }

        Commands::View { stream, json } => {
            let orchestrator = build_orchestrator(&cfg, &overrides)?;
            return view::run(&orchestrator, view::ViewConfig { stream, json }).await;
        }

        Commands::Double { stream, dry_run } => {
            overrides.dry_run = dry_run;
            (stream, ReshardKind::Double)
        }

        Commands::Halve {
            stream,
            dry_run,
            odd_shards,
        } => {
            overrides.dry_run = dry_run;
            overrides.odd_shards = odd_shards;
            (stream, ReshardKind::Halve)
        }
    };

    let client = build_client(&cfg, &overrides)?;
    let reshard_config = cfg.reshard_config(&overrides)?;
    debug!(?reshard_config, endpoint = client.endpoint(), "Starting reshard");

    // Ctrl-C stops the current wait; a mutation already sent stays applied
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            ctrl_c.cancel();
        }
    });

    let (orchestrator, progress) = Orchestrator::with_progress(Arc::new(client), reshard_config);
    let orchestrator = orchestrator.with_cancellation(cancel);

    reshard::run(
        orchestrator,
        progress,
        reshard::ReshardCommandConfig { stream, kind },
    )
    .await
}

fn build_client(
    cfg: &config::ShardScaleConfig,
    overrides: &config::Overrides,
) -> Result<HttpControlPlane> {
    let connection = cfg.connection_config(overrides);
    HttpControlPlane::new(&connection)
        .context("Invalid connection settings (set --region or --endpoint)")
}

fn build_orchestrator(
    cfg: &config::ShardScaleConfig,
    overrides: &config::Overrides,
) -> Result<Orchestrator<HttpControlPlane>> {
    let client = build_client(cfg, overrides)?;
    let reshard_config = cfg.reshard_config(overrides)?;
    Ok(Orchestrator::new(Arc::new(client), reshard_config))
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    use console::style;

    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = config::load_config();
            println!();
            println!("{}", style("shardscale Configuration").bold().underlined());
            println!();
            println!("{}", style("[connection]").cyan());
            match &cfg.connection.region {
                Some(region) => println!("  region = \"{}\"", region),
                None => println!("  region = {}", style("(unset)").dim()),
            }
            match &cfg.connection.endpoint {
                Some(endpoint) => println!("  endpoint = \"{}\"", endpoint),
                None => println!("  endpoint = {}", style("(unset)").dim()),
            }
            println!(
                "  request_timeout_secs = {}",
                cfg.connection.request_timeout_secs
            );
            println!();
            println!("{}", style("[reshard]").cyan());
            println!("  poll_interval_secs = {}", cfg.reshard.poll_interval_secs);
            match cfg.reshard.wait_timeout_secs {
                Some(secs) => println!("  wait_timeout_secs = {}", secs),
                None => println!("  wait_timeout_secs = {}", style("(wait forever)").dim()),
            }
            println!("  odd_shards = \"{}\"", cfg.reshard.odd_shards);
            println!();

            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("shardscale config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            println!("{}", config::config_file_path()?.display());
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            let path = config::save_config(&config::ShardScaleConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }
    }

    Ok(())
}
