//! Maps raw outcomes and pipeline errors to public responses.

use crate::compile::render_all;
use crate::error::Error;
use crate::task::{ExecutionOutcome, TaskResponse};

/// Classify a completed run.
///
/// Precedence: a raised entry is an `Exception`, a deadline hit is a
/// `Timeout`, then success or failure by the run's own status.
pub fn classify(outcome: ExecutionOutcome) -> TaskResponse {
    if let Some(message) = outcome.exception_message {
        return TaskResponse::exception(message);
    }
    if outcome.timed_out {
        return TaskResponse::Timeout;
    }
    if outcome.success {
        TaskResponse::success(outcome.stdout.trim_end())
    } else {
        TaskResponse::failure(outcome.stdout, outcome.stderr)
    }
}

/// Classify an error that stopped the pipeline.
///
/// Compile errors are a `Failure` with the rendered diagnostics on stderr;
/// every other error is an `Exception`.
pub fn classify_error(error: &Error) -> TaskResponse {
    match error {
        Error::Compilation { diagnostics } => TaskResponse::failure("", render_all(diagnostics)),
        Error::Timeout(_) | Error::Cancelled => TaskResponse::Timeout,
        other => TaskResponse::exception(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Diagnostic;
    use std::time::Duration;

    #[test]
    fn test_success_trims_trailing_whitespace() {
        let response = classify(ExecutionOutcome::succeeded("hello\n\n"));
        assert_eq!(response, TaskResponse::success("hello"));
    }

    #[test]
    fn test_failure_keeps_streams() {
        let outcome = ExecutionOutcome {
            stdout: "partial\n".to_string(),
            stderr: "boom".to_string(),
            success: false,
            exit_code: Some(101),
            ..Default::default()
        };
        assert_eq!(classify(outcome), TaskResponse::failure("partial\n", "boom"));
    }

    #[test]
    fn test_exception_takes_precedence() {
        let mut outcome = ExecutionOutcome::raised("x", "bad input");
        outcome.timed_out = true;
        assert_eq!(classify(outcome), TaskResponse::exception("bad input"));
        assert_eq!(classify(ExecutionOutcome::timed_out()), TaskResponse::Timeout);
    }

    #[test]
    fn test_compile_error_is_failure() {
        let error = Error::Compilation {
            diagnostics: vec![Diagnostic::at_line(2, "expected `;`")],
        };
        let response = classify_error(&error);
        assert!(!response.is_success());
        assert_eq!(response.std_err(), Some("line 2: expected `;`"));
    }

    #[test]
    fn test_other_errors() {
        assert!(classify_error(&Error::Timeout(Duration::from_secs(1))).is_timeout());
        assert!(classify_error(&Error::Cancelled).is_timeout());

        let response = classify_error(&Error::Toolchain("rustc not found in PATH".to_string()));
        assert!(response.exception_msg().unwrap().contains("rustc not found"));
    }
}
