//! Error types for kiln-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::compile::{Diagnostic, render_all};

/// Result type for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while admitting, building or running a task.
#[derive(Debug, Error)]
pub enum Error {
    /// The worker pool and its queue are saturated.
    #[error("task rejected: {active} workers busy and {queued} tasks queued")]
    AdmissionRejected { active: usize, queued: usize },

    /// The dependency table could not be built or queried.
    #[error("dependency resolution error: {0}")]
    DependencyResolution(String),

    /// The task workspace or staged project could not be written.
    #[error("staging error at {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program did not compile.
    #[error("compilation failed:\n{}", render_all(diagnostics))]
    Compilation { diagnostics: Vec<Diagnostic> },

    /// The entry point raised a panic or returned an error.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The task did not finish before its deadline.
    #[error("execution timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The Rust toolchain is missing or unusable.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// Failed to load the compiled dynamic library.
    #[error("failed to load library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid executor configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The task was cancelled before it completed.
    #[error("task cancelled")]
    Cancelled,
}

impl Error {
    /// Build a staging error for the given path.
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }

    /// The error message followed by its recovery hint, if any.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }

    /// Short recovery hint for operators.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AdmissionRejected { .. } => {
                Some("increase threadQueueSize / maxThreadSize or retry later")
            }
            Self::Toolchain(_) => Some("install Rust via rustup and make sure rustc and cargo are in PATH"),
            Self::Staging { .. } => Some("check that workDir exists and is writable"),
            Self::Timeout(_) => Some("raise codeTimeoutSeconds or simplify the program"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_error_lists_lines() {
        let err = Error::Compilation {
            diagnostics: vec![Diagnostic::at_line(3, "cannot find value `x` in this scope")],
        };
        let text = err.to_string();
        assert!(text.starts_with("compilation failed:"));
        assert!(text.contains("line 3: cannot find value `x`"));
    }

    #[test]
    fn test_hints() {
        let err = Error::AdmissionRejected {
            active: 2,
            queued: 4,
        };
        assert!(err.hint().is_some());
        assert!(err.with_hint().contains("hint: increase threadQueueSize"));
        assert!(Error::Cancelled.hint().is_none());
        assert_eq!(Error::Cancelled.with_hint(), "task cancelled");
    }
}
