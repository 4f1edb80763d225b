//! Batch command implementation for Kiln CLI.
//!
//! Submits every program at once so admission control applies across the
//! batch, then waits for each ticket on the blocking thread pool.

use std::io::{self, Write};
use std::time::Instant;

use anyhow::Context;
use kiln_core::execute::{classify_error, lock_stdout};
use kiln_core::{Error, TaskRequest, TaskResponse, TaskScheduler};

use crate::colors;
use crate::options::ExecOptions;
use crate::output::print_response;

/// Run several programs concurrently. Returns whether all of them succeeded.
///
/// A file that cannot be read or submitted stops further submissions, but
/// tasks already admitted are still waited for and reported before the
/// error is returned.
pub async fn execute(
    paths: Vec<String>,
    entry: String,
    options: &ExecOptions,
    json: bool,
) -> anyhow::Result<bool> {
    let config = options.resolve()?;
    let scheduler = TaskScheduler::new(config)?;
    let start = Instant::now();

    let mut pending = Vec::with_capacity(paths.len());
    let mut rejected = 0usize;
    let mut aborted: Option<anyhow::Error> = None;

    for path in paths {
        let read = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path));
        let source = match read {
            Ok(source) => source,
            Err(e) => {
                aborted = Some(e);
                break;
            }
        };
        let submitted = Instant::now();

        match scheduler.submit(TaskRequest::new(source, entry.clone())) {
            Ok(ticket) => {
                let handle = tokio::task::spawn_blocking(move || ticket.wait());
                pending.push((path, submitted, handle));
            }
            Err(e @ Error::AdmissionRejected { .. }) => {
                rejected += 1;
                let response = classify_error(&e);
                print_response(&path, &response, submitted.elapsed(), json)?;
            }
            Err(e) => {
                aborted = Some(anyhow::Error::new(e).context(format!("submitting {}", path)));
                break;
            }
        }
    }

    if aborted.is_some() {
        tracing::warn!("Stopped submitting; waiting for {} admitted tasks", pending.len());
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (path, submitted, handle) in pending {
        let response: TaskResponse = handle.await?;
        if response.is_success() {
            succeeded += 1;
        } else {
            failed += 1;
        }
        print_response(&path, &response, submitted.elapsed(), json)?;
    }

    scheduler.shutdown();

    if !json {
        let _stdout = lock_stdout();
        println!(
            "\n{}Completed{} {} succeeded, {} failed, {} rejected in {:.2}s",
            colors::GREEN,
            colors::RESET,
            succeeded,
            failed,
            rejected,
            start.elapsed().as_secs_f64()
        );
        io::stdout().flush()?;
    }

    match aborted {
        Some(e) => Err(e),
        None => Ok(failed == 0 && rejected == 0),
    }
}
