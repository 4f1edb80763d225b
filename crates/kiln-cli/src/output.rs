//! Rendering of task responses.

use std::io::{self, Write};
use std::time::Duration;

use kiln_core::TaskResponse;
use kiln_core::execute::lock_stdout;

use crate::colors;

/// Print one response, either as a JSON object or as labelled text.
///
/// Holds the stdout lock so the output cannot end up inside a running
/// in-process task's capture.
pub fn print_response(
    label: &str,
    response: &TaskResponse,
    elapsed: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let _stdout = lock_stdout();
    let printed = write_response(label, response, elapsed, json);
    io::stdout().flush()?;
    printed
}

fn write_response(
    label: &str,
    response: &TaskResponse,
    elapsed: Duration,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        let mut line = serde_json::to_value(response)?;
        line["file"] = label.into();
        line["elapsedMs"] = (elapsed.as_millis() as u64).into();
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    println!("{}{}{}", colors::BOLD, label, colors::RESET);
    println!("{}", "─".repeat(50));

    match response {
        TaskResponse::Success { stdout } => {
            print_block(stdout);
            status_line(colors::GREEN, "Succeeded", elapsed);
        }
        TaskResponse::Failure { stdout, stderr } => {
            print_block(stdout);
            if !stderr.is_empty() {
                println!("{}stderr:{}", colors::DIM, colors::RESET);
                print_block(stderr);
            }
            status_line(colors::RED, "Failed", elapsed);
        }
        TaskResponse::Exception { message } => {
            println!("{}", message);
            status_line(colors::RED, "Raised", elapsed);
        }
        TaskResponse::Timeout => {
            status_line(colors::YELLOW, "Timed out", elapsed);
        }
    }

    Ok(())
}

fn print_block(text: &str) {
    if text.is_empty() {
        return;
    }
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
}

fn status_line(color: &str, word: &str, elapsed: Duration) {
    println!("{}", "─".repeat(50));
    println!("{}{}{} in {:.2}s", color, word, colors::RESET, elapsed.as_secs_f64());
}
