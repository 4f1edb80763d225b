//! Requests, raw outcomes and public responses.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One auxiliary input record, string-keyed.
pub type InputRow = BTreeMap<String, String>;

/// Unique identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in file names, crate names and symbols.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..12].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// A request to compile and run one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Program source text.
    pub source_code: String,
    /// Name of the function execution starts at.
    pub entry_point: String,
    /// Rows handed to the program as a JSON array on standard input.
    #[serde(default)]
    pub input_rows: Vec<InputRow>,
}

impl TaskRequest {
    /// Create a request without auxiliary input.
    pub fn new(source_code: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            entry_point: entry_point.into(),
            input_rows: Vec::new(),
        }
    }

    /// Attach auxiliary input rows.
    pub fn with_input_rows(mut self, rows: Vec<InputRow>) -> Self {
        self.input_rows = rows;
        self
    }

    /// Serialized form of the input rows, as staged for the program.
    pub fn input_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.input_rows)
    }
}

/// Raw result of running an artifact, consumed once by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub exception_message: Option<String>,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    /// Outcome of a run that completed normally.
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            success: true,
            exit_code: Some(0),
            ..Default::default()
        }
    }

    /// Outcome of an entry point that raised.
    pub fn raised(stdout: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            success: false,
            exception_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Outcome of a run that was cut off by its deadline.
    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Default::default()
        }
    }
}

/// Public result of a task. Exactly one variant per admitted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TaskResponse {
    Success { stdout: String },
    Failure { stdout: String, stderr: String },
    Exception { message: String },
    Timeout,
}

impl TaskResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::Success {
            stdout: stdout.into(),
        }
    }

    pub fn failure(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Failure {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::Exception {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn std_out(&self) -> Option<&str> {
        match self {
            Self::Success { stdout } | Self::Failure { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    pub fn std_err(&self) -> Option<&str> {
        match self {
            Self::Failure { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn exception_msg(&self) -> Option<&str> {
        match self {
            Self::Exception { message } => Some(message),
            Self::Timeout => Some("execution timed out"),
            _ => None,
        }
    }
}
