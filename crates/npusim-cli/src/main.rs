//! npusim CLI
//!
//! Command-line interface for running and comparing cluster scheduling
//! simulations.

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// npusim - discrete-event simulator for NPU cluster scheduling policies
#[derive(Parser, Debug)]
#[command(name = "npusim")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Simulation config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Workload and cluster options shared by `run` and `compare`
#[derive(Args, Debug, Clone)]
struct SimArgs {
    /// Workload file (.toml or .json)
    #[arg(long, conflicts_with = "mock")]
    workload: Option<PathBuf>,

    /// Generate this many mock training jobs instead of reading a workload
    #[arg(long)]
    mock: Option<usize>,

    /// Number of NPUs in a homogeneous cluster
    #[arg(long)]
    npus: Option<u32>,

    /// Memory per NPU in GB
    #[arg(long)]
    memory: Option<f64>,

    /// Simulated-seconds cutoff
    #[arg(long, conflicts_with = "no_duration_limit")]
    duration_limit: Option<f64>,

    /// Run until the event queue drains
    #[arg(long)]
    no_duration_limit: bool,
}

impl SimArgs {
    fn overrides(&self) -> commands::Overrides {
        commands::Overrides {
            npus: self.npus,
            memory: self.memory,
            duration_limit: self.duration_limit,
            no_duration_limit: self.no_duration_limit,
        }
    }

    fn source(&self) -> commands::WorkloadSource {
        match (&self.workload, self.mock) {
            (Some(path), _) => commands::WorkloadSource::File(path.clone()),
            (None, Some(n)) => commands::WorkloadSource::Mock(n),
            (None, None) => commands::WorkloadSource::Mock(commands::DEFAULT_MOCK_TASKS),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one simulation
    Run {
        #[command(flatten)]
        sim: SimArgs,

        /// Scheduling policy (fifo, best-fit, adapter-aware)
        #[arg(long)]
        policy: Option<String>,

        /// Print the processed event log
        #[arg(long)]
        events: bool,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the same workload under several policies
    Compare {
        #[command(flatten)]
        sim: SimArgs,

        /// Policies to compare (defaults to all)
        #[arg(long, value_delimiter = ',')]
        policies: Vec<String>,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = commands::load_config(cli.config.as_deref())?;

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
        commands::parse_level(level)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Run {
            sim,
            policy,
            events,
            json,
        } => {
            commands::apply_overrides(&mut config, &sim.overrides());
            if let Some(policy) = policy {
                config.algorithm = policy.parse()?;
            }
            let workload = commands::load_workload(sim.source()).await?;
            commands::run(config, workload, events, json).await?;
        }
        Commands::Compare {
            sim,
            policies,
            json,
        } => {
            commands::apply_overrides(&mut config, &sim.overrides());
            let kinds = commands::parse_policies(&policies)?;
            let workload = commands::load_workload(sim.source()).await?;
            commands::compare(config, workload, kinds, json).await?;
        }
        Commands::Config => {
            commands::show_config(&config)?;
        }
    }

    Ok(())
}
