//! CLI argument definitions using clap
//!
//! Commands:
//! - downline run --config <path> (--period YYYY-MM | --day YYYY-MM-DD | --from D --to D [--daily])
//! - downline show --config <path> --period <period> [--node ID]...

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// downline - deterministic downline rollups for referral forests
#[derive(Parser, Debug)]
#[command(name = "downline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute and persist rollups for one or more periods
    Run(RunArgs),

    /// Print stored rollups of one period, one JSON object per line
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone, Default)]
#[command(group(
    ArgGroup::new("window")
        .required(true)
        .args(["period", "day", "from"])
))]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(long, default_value = "./downline.json")]
    pub config: PathBuf,

    /// Calendar month (YYYY-MM)
    #[arg(long)]
    pub period: Option<String>,

    /// Single day (YYYY-MM-DD)
    #[arg(long)]
    pub day: Option<String>,

    /// First day of a range (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Last day of a range, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Split --from/--to into one period per day
    #[arg(long, requires = "from")]
    pub daily: bool,

    /// Only roll up and persist these nodes (repeatable)
    #[arg(long = "node")]
    pub nodes: Vec<String>,

    /// Override the configured worker pool size
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the configured progress batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip keys already persisted from the same snapshot
    #[arg(long)]
    pub resume: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Path to configuration file
    #[arg(long, default_value = "./downline.json")]
    pub config: PathBuf,

    /// YYYY-MM, YYYY-MM-DD or a stored period key (<start>/<end>)
    #[arg(long)]
    pub period: String,

    /// Only these nodes (repeatable)
    #[arg(long = "node")]
    pub nodes: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
