//! CLI module for downline
//!
//! Provides command-line interface for:
//! - run: Compute and persist rollups for the selected periods
//! - show: Print stored rollups of one period

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, RunArgs, ShowArgs};
pub use commands::{execute_run, resolve_periods, run, run_command, run_rollup, show};
pub use errors::{CliError, CliErrorCode, CliResult};
