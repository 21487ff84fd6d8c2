use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// loadlink — load-testing harness for inference-serving backends
#[derive(Parser)]
#[command(name = "loadlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one load-test experiment
    Run {
        /// YAML run plan with prompts and endpoint candidates
        #[arg(long)]
        plan: PathBuf,

        /// Number of simulated users (defaults to LOADLINK_USERS)
        #[arg(short, long)]
        users: Option<u32>,

        /// Users spawned per second (defaults to LOADLINK_SPAWN_RATE)
        #[arg(short = 'r', long)]
        spawn_rate: Option<u32>,

        /// Run-time budget, e.g. "60s", "5m" (defaults to LOADLINK_RUN_TIME)
        #[arg(short = 't', long)]
        run_time: Option<String>,

        /// Directory for JSONL exports (defaults to LOADLINK_RESULTS_DIR)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}
