//! spotgridd: the SpotGrid daemon.
//!
//! Single binary that hosts the GPU fleet control plane:
//! - Cluster state, pool manager and autoscaler in one control loop task
//! - Read-only REST API and Prometheus metrics
//! - An offline simulator for replaying the loop against a manual clock
//!
//! # Usage
//!
//! ```text
//! spotgridd run --config fleet.toml --port 8480
//! spotgridd simulate --config fleet.toml --ticks 500 --seed 7 --amplitude 0.4
//! ```

mod daemon;
mod simulate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use spotgrid_core::FleetConfig;

use crate::simulate::SimulateOptions;

#[derive(Parser)]
#[command(name = "spotgridd", about = "SpotGrid GPU fleet daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop and serve the read-only API.
    Run {
        /// Path to fleet.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, default_value = "8480")]
        port: u16,

        /// Seed for the eviction model; overrides `[eviction] seed`.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Replay the control loop offline and print the final snapshot as JSON.
    Simulate {
        /// Path to fleet.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of loop iterations to simulate.
        #[arg(long, default_value = "100")]
        ticks: u32,

        /// Seed for the eviction model; falls back to `[eviction] seed`, then 0.
        #[arg(long)]
        seed: Option<u64>,

        /// Relative swing of each deployment's load (0 = flat).
        #[arg(long, default_value = "0.0")]
        amplitude: f64,

        /// Ticks per full load cycle.
        #[arg(long, default_value = "60")]
        period_ticks: u32,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,spotgridd=debug,spotgrid=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FleetConfig> {
    match path {
        Some(path) => FleetConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(FleetConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run { config, port, seed } => {
            let mut config = load_config(config.as_deref())?;
            if seed.is_some() {
                config.eviction.seed = seed;
            }
            daemon::run_daemon(config, port).await
        }
        Command::Simulate {
            config,
            ticks,
            seed,
            amplitude,
            period_ticks,
        } => {
            let config = load_config(config.as_deref())?;
            let opts = SimulateOptions {
                ticks,
                seed: seed.or(config.eviction.seed).unwrap_or(0),
                amplitude,
                period_ticks,
            };
            let (snapshot, summary) = simulate::simulate(config, &opts)?;
            tracing::info!(
                ticks = summary.ticks,
                evictions = summary.evictions,
                pods_preempted = summary.pods_preempted,
                pods_created = summary.pods_created,
                pods_removed = summary.pods_removed,
                nodes_added = summary.nodes_added,
                nodes_reclaimed = summary.nodes_reclaimed,
                "simulation summary"
            );
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}
