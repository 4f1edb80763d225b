//! Per-task lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one task.
///
/// ```text
/// Submitted ─► Admitted ─► Running ─► Succeeded | Failed | TimedOut | Errored
///     │            │
///     └► Rejected  └──────────────► TimedOut (deadline hit while queued)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    Submitted = 0,
    Admitted = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
    TimedOut = 5,
    Errored = 6,
    Rejected = 7,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Errored | Self::Rejected
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Submitted,
            1 => Self::Admitted,
            2 => Self::Running,
            3 => Self::Succeeded,
            4 => Self::Failed,
            5 => Self::TimedOut,
            6 => Self::Errored,
            _ => Self::Rejected,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submitted => "submitted",
            Self::Admitted => "admitted",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed out",
            Self::Errored => "errored",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Atomically updated [`TaskState`], shared by the caller and the worker.
#[derive(Debug)]
pub(crate) struct AtomicTaskState(AtomicU8);

impl AtomicTaskState {
    pub fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`. Fails if the current state is not `from`.
    pub fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Move to a terminal state from any non-terminal one.
    ///
    /// Returns the previous state on success; `None` if a terminal state
    /// was already reached, so exactly one caller wins.
    pub fn finish(&self, to: TaskState) -> Option<TaskState> {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            let state = TaskState::from_u8(current);
            if state.is_terminal() {
                return None;
            }
            match self
                .0
                .compare_exchange(current, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Some(state),
                Err(actual) => current = actual,
            }
        }
    }
}
