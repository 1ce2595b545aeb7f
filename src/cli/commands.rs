//! CLI command implementations
//!
//! `run` sequence:
//! 1. Configuration load (file, then flag overrides, then validation)
//! 2. Period resolution
//! 3. Store open (corruption is fatal)
//! 4. Engine run on a multi-threaded runtime; Ctrl-C stops dispatch
//! 5. Report printed to stdout; non-zero exit past the failure threshold

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::RunConfig;
use crate::engine::{Engine, RunReport, RunRequest};
use crate::ledger::{Period, PeriodError};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::rollup::RollupKey;
use crate::snapshot::{JsonLinesHierarchy, JsonLinesLedger};
use crate::store::{FileRollupStore, RollupStore};

use super::args::{Command, RunArgs, ShowArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_json, write_json_line};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run(args) => run_rollup(&args),
        Command::Show(args) => show(&args),
    }
}

/// Execute a rollup run and print its report.
pub fn run_rollup(args: &RunArgs) -> CliResult<()> {
    let (config, report) = execute_run(args)?;
    write_json(&report.to_json())?;

    if report.exceeds_threshold(config.failure_threshold) {
        return Err(CliError::threshold_exceeded(
            report.failed,
            config.failure_threshold,
        ));
    }
    Ok(())
}

/// Everything `run` does except printing.
pub fn execute_run(args: &RunArgs) -> CliResult<(RunConfig, RunReport)> {
    let config = load_config(&args.config, args)?;
    let periods = resolve_periods(args, config.cutover_offset_hours)?;

    let store = FileRollupStore::open(&config.store_dir)?;
    let engine = Engine::new(
        Arc::new(JsonLinesHierarchy::new(&config.hierarchy_path)),
        Arc::new(JsonLinesLedger::new(&config.ledger_path)),
        Arc::new(store),
    );

    let mut request = RunRequest::new(periods)
        .with_candidates(config.candidates)
        .with_index_options(config.index_options())
        .with_scheduler(config.scheduler_config());
    if !args.nodes.is_empty() {
        request = request.with_nodes(args.nodes.clone());
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;

    let cancel = engine.cancel_flag();
    let report = rt.block_on(async {
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        let result = engine.run(&request).await;
        watcher.abort();
        result
    })?;

    Ok((config, report))
}

/// Print stored records of one period.
pub fn show(args: &ShowArgs) -> CliResult<()> {
    let config = RunConfig::load(&args.config)?;
    Logger::set_min_severity(config.severity()?);
    let period = parse_period_arg(&args.period, config.cutover_offset_hours)?;
    let store = FileRollupStore::open(&config.store_dir)?;

    if args.nodes.is_empty() {
        for record in store.list_period(&period)? {
            write_json_line(&record)?;
        }
        return Ok(());
    }

    for node_id in &args.nodes {
        match store.get(&RollupKey::new(node_id.as_str(), &period))? {
            Some(record) => write_json_line(&record)?,
            None => write_json_line(&serde_json::json!({
                "node_id": node_id,
                "period": period.key(),
                "status": "not_found",
            }))?,
        }
    }
    Ok(())
}

/// Load the config file and apply flag overrides.
fn load_config(path: &Path, args: &RunArgs) -> CliResult<RunConfig> {
    let mut config = RunConfig::load(path)?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.resume {
        config.resume = true;
    }
    config.validate()?;
    Logger::set_min_severity(config.severity()?);

    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("config", &path.display().to_string()),
            ("store_dir", &config.store_dir.display().to_string()),
            ("concurrency", &config.concurrency.to_string()),
            ("batch_size", &config.batch_size.to_string()),
            ("amount_scale", &config.amount_scale.to_string()),
            ("cutover_offset_hours", &config.cutover_offset_hours.to_string()),
        ],
    );
    Ok(config)
}

/// Periods selected by `--period`, `--day` or `--from/--to [--daily]`.
pub fn resolve_periods(args: &RunArgs, offset_hours: i32) -> CliResult<Vec<Period>> {
    if let Some(period) = &args.period {
        return Ok(vec![Period::parse_calendar(period, offset_hours)?]);
    }
    if let Some(day) = &args.day {
        return Ok(vec![Period::day(parse_date(day)?, offset_hours)?]);
    }
    match (&args.from, &args.to) {
        (Some(from), Some(to)) => {
            let (from, to) = (parse_date(from)?, parse_date(to)?);
            if args.daily {
                return Ok(Period::daily_range(from, to, offset_hours)?);
            }
            if from > to {
                return Err(PeriodError::Invalid(format!("{} after {}", from, to)).into());
            }
            let start = Period::day(from, offset_hours)?.start();
            let end = Period::day(to, offset_hours)?.end();
            Ok(vec![Period::new(start, end)?])
        }
        _ => Err(CliError::period_error(
            "one of --period, --day or --from/--to is required",
        )),
    }
}

fn parse_period_arg(value: &str, offset_hours: i32) -> CliResult<Period> {
    if value.contains('/') {
        return Ok(value.parse()?);
    }
    Ok(Period::parse_calendar(value, offset_hours)?)
}

fn parse_date(value: &str) -> CliResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::period_error(format!("invalid date '{}', expected YYYY-MM-DD", value)))
}
