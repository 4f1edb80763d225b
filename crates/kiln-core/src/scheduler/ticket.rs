//! Handles for admitted tasks.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;

use crate::execute::{CancelToken, TaskObserver};
use crate::task::{TaskId, TaskResponse};

use super::state::{AtomicTaskState, TaskState};

/// State shared between a ticket and the worker running its task.
pub(crate) struct TaskRecord {
    id: TaskId,
    state: AtomicTaskState,
    cancel: CancelToken,
    observer: Option<Arc<dyn TaskObserver>>,
}

impl TaskRecord {
    pub fn new(id: TaskId, observer: Option<Arc<dyn TaskObserver>>) -> Self {
        Self {
            id,
            state: AtomicTaskState::new(TaskState::Submitted),
            cancel: CancelToken::new(),
            observer,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state.load()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Compare-and-swap `from` → `to`, notifying the observer on success.
    pub fn transition(&self, from: TaskState, to: TaskState) -> bool {
        let moved = self.state.transition(from, to);
        if moved {
            self.notify(from, to);
        }
        moved
    }

    /// Claim the task for a worker.
    ///
    /// Fails if the task already reached a terminal state (timed out while
    /// queued).
    pub fn start(&self) -> bool {
        self.transition(TaskState::Admitted, TaskState::Running)
            || self.transition(TaskState::Submitted, TaskState::Running)
    }

    /// Move to a terminal state. Only the first caller succeeds.
    pub fn finish(&self, to: TaskState) -> bool {
        match self.state.finish(to) {
            Some(from) => {
                self.notify(from, to);
                true
            }
            None => false,
        }
    }

    pub fn completed(&self, response: &TaskResponse) {
        if let Some(observer) = &self.observer {
            observer.on_task_completed(self.id, response);
        }
    }

    fn notify(&self, from: TaskState, to: TaskState) {
        if let Some(observer) = &self.observer {
            observer.on_state_change(self.id, from, to);
        }
    }
}

/// Terminal state recorded for a response.
pub(crate) fn terminal_state(response: &TaskResponse) -> TaskState {
    match response {
        TaskResponse::Success { .. } => TaskState::Succeeded,
        TaskResponse::Failure { .. } => TaskState::Failed,
        TaskResponse::Timeout => TaskState::TimedOut,
        TaskResponse::Exception { .. } => TaskState::Errored,
    }
}

/// Handle to an admitted task.
///
/// [`wait`](Self::wait) blocks until the task's response arrives or its
/// deadline (submission time + code timeout) passes, whichever is first.
pub struct TaskTicket {
    record: Arc<TaskRecord>,
    receiver: Receiver<TaskResponse>,
    deadline: Instant,
}

impl TaskTicket {
    pub(crate) fn new(
        record: Arc<TaskRecord>,
        receiver: Receiver<TaskResponse>,
        deadline: Instant,
    ) -> Self {
        Self {
            record,
            receiver,
            deadline,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.record.id()
    }

    pub fn state(&self) -> TaskState {
        self.record.state()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the response.
    ///
    /// On deadline expiry the task is marked `TimedOut`, its cancel token is
    /// set (killing any running child process group) and `Timeout` is
    /// returned immediately.
    pub fn wait(self) -> TaskResponse {
        let remaining = self.deadline.saturating_duration_since(Instant::now());

        match self.receiver.recv_timeout(remaining) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => {
                if self.record.finish(TaskState::TimedOut) {
                    tracing::warn!("Task {} timed out; cancelling", self.record.id());
                    self.record.cancel_token().cancel();
                    let response = TaskResponse::Timeout;
                    self.record.completed(&response);
                    response
                } else {
                    // The worker finished at the deadline; its send is in flight
                    self.receiver.recv().unwrap_or_else(|_| lost_task())
                }
            }
            Err(RecvTimeoutError::Disconnected) => lost_task(),
        }
    }
}

fn lost_task() -> TaskResponse {
    TaskResponse::exception("task was dropped before producing a result")
}
