//! Cancellation and progress reporting for running tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::scheduler::TaskState;
use crate::task::{TaskId, TaskResponse};

/// Handle for cancelling one task.
///
/// Cloned between the waiting caller and the worker running the task. Any
/// clone can cancel; the flag is visible to all of them. While a child
/// process (rustc, cargo or the program) is running, its process group is
/// registered here and cancelling kills it with `SIGKILL`.
///
/// # Example
///
/// ```
/// use kiln_core::execute::CancelToken;
///
/// let token = CancelToken::new();
/// let clone = token.clone();
///
/// assert!(!token.is_cancelled());
/// clone.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    /// Process group leader of the running child, if any.
    child: Mutex<Option<u32>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation and kill the registered child, if any.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return; // Already cancelled
        }

        if let Ok(guard) = self.inner.child.lock() {
            if let Some(pid) = *guard {
                tracing::debug!("Killing process group {}", pid);
                kill_process_group(pid);
            }
        }
    }

    /// Return `Error::Cancelled` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Register a freshly spawned child as the current process group.
    ///
    /// If the token is already cancelled the group is killed immediately
    /// and `Error::Cancelled` is returned.
    pub(crate) fn register_child(&self, pid: u32) -> Result<()> {
        let mut guard = self
            .inner
            .child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.is_cancelled() {
            kill_process_group(pid);
            return Err(Error::Cancelled);
        }

        *guard = Some(pid);
        Ok(())
    }

    /// Forget the current child once it has been reaped.
    pub(crate) fn clear_child(&self) {
        if let Ok(mut guard) = self.inner.child.lock() {
            *guard = None;
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // Children are spawned as group leaders, so -pid addresses the group.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(pid: u32) {
    tracing::warn!("Cannot kill process {} on this platform", pid);
}

/// Callback trait for task lifecycle reporting.
pub trait TaskObserver: Send + Sync {
    /// Called on every state transition.
    fn on_state_change(&self, task_id: TaskId, from: TaskState, to: TaskState);

    /// Called once with the response delivered to the caller.
    fn on_task_completed(&self, _task_id: TaskId, _response: &TaskResponse) {}
}
