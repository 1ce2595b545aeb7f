//! JSON output for CLI commands
//!
//! - Logs go to stdout/stderr line by line; payloads are plain JSON
//! - UTF-8 only, flushed after every write

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write a raw JSON string to stdout
pub fn write_json(json_str: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", json_str)?;
    stdout.flush()?;

    Ok(())
}

/// Write one value as a single JSON line to stdout
pub fn write_json_line<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
