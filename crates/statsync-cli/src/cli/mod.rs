//! CLI for the statsync batch stats updater.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use statsync_core::checkpoint::SqliteCheckpointStore;
use statsync_core::config;
use statsync_core::statsdb::StatsDb;

use commands::{run_add, run_cycle_cmd, run_plan, run_remove, run_status};

/// Top-level CLI for statsync.
#[derive(Debug, Parser)]
#[command(name = "statsync")]
#[command(about = "statsync: resumable, quota-aware batch stats updater", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Register an entity (or update its label/priority).
    Add {
        /// Entity identifier (e.g. a channel id).
        id: String,
        /// Human-readable label for status output.
        #[arg(long)]
        label: Option<String>,
        /// Dispatch priority; lower runs earlier.
        #[arg(long, default_value = "0")]
        priority: i64,
    },

    /// Deactivate an entity so future cycles skip it.
    Remove {
        /// Entity identifier.
        id: String,
    },

    /// Run one update cycle for today's cycle key (resumes if interrupted).
    Run {
        /// Override the configured worker count.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Override the configured batch size.
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Show registered entities and a cycle's checkpoint summary.
    Status {
        /// Cycle key to inspect (default: today).
        #[arg(long)]
        cycle: Option<String>,
    },

    /// Show the remaining work plan for today's cycle.
    Plan,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = StatsDb::open_default().await?;
        let checkpoints = SqliteCheckpointStore::open_default().await?;

        match cli.command {
            CliCommand::Add {
                id,
                label,
                priority,
            } => run_add(&db, &id, label.as_deref(), priority).await?,
            CliCommand::Remove { id } => run_remove(&db, &id).await?,
            CliCommand::Run {
                workers,
                batch_size,
            } => run_cycle_cmd(&cfg, &db, checkpoints, workers, batch_size).await?,
            CliCommand::Status { cycle } => {
                run_status(&db, &checkpoints, cycle.as_deref()).await?
            }
            CliCommand::Plan => run_plan(&cfg, &db, &checkpoints).await?,
        }

        Ok(())
    }
}
