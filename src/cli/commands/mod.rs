use clap::{Parser, Subcommand};

/// `fleetsync` - declarative reconciler for scheduled automation agents.
#[derive(Parser, Debug)]
#[command(name = "fleetsync")]
#[command(version = "0.1.0")]
#[command(about = "Converge a fleet of scheduled agents to a declared catalog.", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what `apply` would change without touching the platform
    Plan {
        /// Catalog file (.toml or .json)
        #[arg(short, long)]
        catalog: String,

        /// Owner account (email or id); defaults to `owner` in config.toml
        #[arg(long)]
        owner: Option<String>,
    },

    /// Reconcile the fleet, then force one run of every worker and verify output
    Apply {
        /// Catalog file (.toml or .json)
        #[arg(short, long)]
        catalog: String,

        /// Owner account (email or id); defaults to `owner` in config.toml
        #[arg(long)]
        owner: Option<String>,

        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Skip forced runs after reconciliation
        #[arg(long)]
        skip_verify: bool,

        /// Seconds to wait for output per worker
        #[arg(long)]
        timeout: Option<u64>,

        /// Milliseconds between output polls
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Workers verified at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List live workers with schedule validity and output activity
    Status {
        /// Owner account (email or id); defaults to `owner` in config.toml
        #[arg(long)]
        owner: Option<String>,

        /// Include workers outside the managed prefix
        #[arg(long)]
        all: bool,
    },

    /// Print canonical schedule tokens and the legacy aliases they replace
    Schedules,
}
