//! Task scheduling with admission control and deadlines.
//!
//! ```text
//! run_task(request)
//!     │
//!     └── submit ──► WorkerPool::execute ──► AdmissionRejected ──► Exception
//!             │
//!             └── TaskTicket::wait (deadline = submitted_at + codeTimeout)
//!                     │
//!                     ├── response from worker ──► Success | Failure | Exception
//!                     └── deadline ──► cancel token ──► Timeout
//! ```

mod pool;
mod state;
mod ticket;

use std::sync::Arc;
use std::sync::mpsc::{SyncSender, sync_channel};
use std::time::Instant;

use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::execute::{Pipeline, TaskExecutor, TaskObserver, classify, classify_error};
use crate::task::{TaskId, TaskRequest, TaskResponse};

pub use pool::{Job, PoolConfig, PoolStats, WorkerPool};
pub use state::TaskState;
pub use ticket::TaskTicket;

use ticket::{TaskRecord, terminal_state};

/// Runs tasks on a bounded worker pool with a per-task deadline.
pub struct TaskScheduler {
    config: ExecutorConfig,
    pool: WorkerPool,
    executor: Arc<dyn TaskExecutor>,
    observer: Option<Arc<dyn TaskObserver>>,
}

impl TaskScheduler {
    /// Create a scheduler running the default pipeline for `config`.
    ///
    /// # Errors
    /// Returns `Error::Config` for invalid settings or `Error::Toolchain` if
    /// rustc/cargo are not available.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = Pipeline::new(&config)?;
        Self::with_executor(config, Arc::new(pipeline))
    }

    /// Create a scheduler around a custom executor.
    pub fn with_executor(config: ExecutorConfig, executor: Arc<dyn TaskExecutor>) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(PoolConfig::from(&config));

        tracing::debug!(
            "Scheduler ready: core={} max={} queue={} timeout={}s strategy={:?}",
            config.core_thread_size,
            config.max_thread_size,
            config.thread_queue_size,
            config.code_timeout_seconds,
            config.strategy
        );

        Ok(Self {
            config,
            pool,
            executor,
            observer: None,
        })
    }

    /// Report every task's state transitions to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn TaskObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Admit a task without waiting for it.
    ///
    /// # Errors
    /// Returns `Error::AdmissionRejected` when every worker is busy and the
    /// queue is full; the task never runs.
    pub fn submit(&self, request: TaskRequest) -> Result<TaskTicket> {
        let submitted_at = Instant::now();
        let record = Arc::new(TaskRecord::new(TaskId::new(), self.observer.clone()));
        let (sender, receiver) = sync_channel(1);

        let job = {
            let record = Arc::clone(&record);
            let executor = Arc::clone(&self.executor);
            Box::new(move || run_job(&record, executor.as_ref(), &request, sender))
        };

        match self.pool.execute(job) {
            Ok(()) => {
                // A fast worker may already have moved the task to Running
                record.transition(TaskState::Submitted, TaskState::Admitted);
                tracing::debug!("Task {} admitted", record.id());
                let deadline = submitted_at + self.config.code_timeout();
                Ok(TaskTicket::new(record, receiver, deadline))
            }
            Err(e) => {
                record.transition(TaskState::Submitted, TaskState::Rejected);
                tracing::warn!("Task {} rejected: {}", record.id(), e);
                Err(e)
            }
        }
    }

    /// Run a task to completion and classify the result.
    ///
    /// Never fails: rejection, errors and panics all become a
    /// `TaskResponse`.
    pub fn run_task(&self, request: TaskRequest) -> TaskResponse {
        match self.submit(request) {
            Ok(ticket) => ticket.wait(),
            Err(e) => classify_error(&e),
        }
    }

    /// Stop accepting tasks. Admitted tasks still complete.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

/// Body of a pool job: run the task unless it was cancelled while queued.
fn run_job(
    record: &TaskRecord,
    executor: &dyn TaskExecutor,
    request: &TaskRequest,
    sender: SyncSender<TaskResponse>,
) {
    if record.cancel_token().is_cancelled() || !record.start() {
        tracing::debug!("Skipping task {}: {}", record.id(), record.state());
        return;
    }

    let started = Instant::now();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        executor.execute(record.id(), request, record.cancel_token())
    }));

    let response = match result {
        Ok(Ok(outcome)) => classify(outcome),
        Ok(Err(e)) => classify_error(&e),
        Err(payload) => TaskResponse::exception(format!("task panicked: {}", panic_message(&*payload))),
    };

    let terminal = terminal_state(&response);
    if record.finish(terminal) {
        tracing::info!(
            "Task {} {} in {}ms",
            record.id(),
            terminal,
            started.elapsed().as_millis()
        );
        record.completed(&response);
        let _ = sender.send(response);
    } else {
        tracing::debug!("Task {} finished after its deadline; result discarded", record.id());
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
