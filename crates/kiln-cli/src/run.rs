//! Run command implementation for Kiln CLI.
//!
//! Compiles and runs a single program under the configured deadline.

use std::time::Instant;

use anyhow::Context;
use kiln_core::{InputRow, TaskRequest, TaskScheduler};

use crate::options::ExecOptions;
use crate::output::print_response;

/// Run one program. Returns whether it succeeded.
pub fn execute(
    path: &str,
    entry: &str,
    input: Option<&str>,
    options: &ExecOptions,
    json: bool,
) -> anyhow::Result<bool> {
    let config = options.resolve()?;
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let rows = match input {
        Some(input) => read_rows(input)?,
        None => Vec::new(),
    };

    tracing::debug!(
        "Running {} with {:?} strategy ({} input rows)",
        path,
        config.strategy,
        rows.len()
    );

    let scheduler = TaskScheduler::new(config)?;
    let start = Instant::now();
    let response = scheduler.run_task(TaskRequest::new(source, entry).with_input_rows(rows));
    let elapsed = start.elapsed();
    scheduler.shutdown();

    print_response(path, &response, elapsed, json)?;
    Ok(response.is_success())
}

/// Load input rows: a JSON array of string-to-string objects.
pub fn read_rows(path: &str) -> anyhow::Result<Vec<InputRow>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let rows = serde_json::from_str(&text)
        .with_context(|| format!("{} must hold an array of string maps", path))?;
    Ok(rows)
}
