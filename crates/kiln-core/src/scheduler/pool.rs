//! Admission-controlled worker thread pool.
//!
//! Admission follows the classic bounded-executor rules:
//!
//! 1. fewer than `core_size` workers → start a new worker for the job;
//! 2. otherwise, queue has room → enqueue;
//! 3. otherwise, fewer than `max_size` workers → start a new worker;
//! 4. otherwise → reject with `Error::AdmissionRejected`.
//!
//! Workers above `core_size` retire after `keep_alive` without work.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};

/// Unit of work run by a pool thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub keep_alive: Duration,
    pub queue_capacity: usize,
}

impl From<&ExecutorConfig> for PoolConfig {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            core_size: config.core_thread_size,
            max_size: config.max_thread_size,
            keep_alive: config.keep_alive(),
            queue_capacity: config.thread_queue_size,
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Live worker threads.
    pub workers: usize,
    /// Workers currently running a job.
    pub active: usize,
    /// Jobs waiting in the queue.
    pub queued: usize,
}

struct PoolState {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    next_worker_id: usize,
    shutdown: bool,
}

struct Shared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    work_available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded pool of worker threads with a bounded job queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(PoolState {
                    queue: VecDeque::with_capacity(config.queue_capacity),
                    workers: 0,
                    idle: 0,
                    next_worker_id: 0,
                    shutdown: false,
                }),
                work_available: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.shared.config
    }

    /// Admit a job or reject it immediately.
    ///
    /// # Errors
    /// - `Error::AdmissionRejected` when all workers are busy and the queue
    ///   is full, or after shutdown.
    /// - `Error::Io` if a worker thread cannot be spawned.
    pub fn execute(&self, job: Job) -> Result<()> {
        let config = self.shared.config;
        let mut state = self.shared.lock();

        if state.shutdown {
            return Err(rejected(&state));
        }

        if state.workers < config.core_size {
            return self.spawn_worker(&mut state, job);
        }

        if state.queue.len() < config.queue_capacity {
            state.queue.push_back(job);
            self.shared.work_available.notify_one();
            return Ok(());
        }

        if state.workers < config.max_size {
            return self.spawn_worker(&mut state, job);
        }

        Err(rejected(&state))
    }

    /// Stop admitting jobs. Queued jobs still run; idle workers exit.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if !state.shutdown {
            state.shutdown = true;
            tracing::debug!(
                "Shutting down worker pool ({} workers, {} queued)",
                state.workers,
                state.queue.len()
            );
        }
        self.shared.work_available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            workers: state.workers,
            active: state.workers - state.idle,
            queued: state.queue.len(),
        }
    }

    fn spawn_worker(&self, state: &mut PoolState, first_job: Job) -> Result<()> {
        let id = state.next_worker_id;
        state.next_worker_id += 1;
        state.workers += 1;

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(format!("kiln-worker-{}", id))
            .spawn(move || worker_loop(shared, first_job));

        if let Err(e) = spawned {
            state.workers -= 1;
            tracing::warn!("Failed to spawn worker thread: {}", e);
            return Err(Error::Io(e));
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn rejected(state: &PoolState) -> Error {
    Error::AdmissionRejected {
        active: state.workers - state.idle,
        queued: state.queue.len(),
    }
}

fn worker_loop(shared: Arc<Shared>, first_job: Job) {
    let mut job = Some(first_job);

    while let Some(current) = job.take() {
        run_job(current);
        job = next_job(&shared);
    }
}

fn run_job(job: Job) {
    // Jobs handle their own panics; this keeps the worker alive regardless
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
        tracing::warn!("Worker job panicked");
    }
}

/// Block until a job is available, or return `None` when the worker
/// should exit (shutdown, or idle above core size for `keep_alive`).
fn next_job(shared: &Shared) -> Option<Job> {
    let config = shared.config;
    let mut state = shared.lock();

    loop {
        if let Some(job) = state.queue.pop_front() {
            return Some(job);
        }
        if state.shutdown {
            state.workers -= 1;
            return None;
        }

        state.idle += 1;
        if state.workers > config.core_size {
            let (guard, timeout) = shared
                .work_available
                .wait_timeout(state, config.keep_alive)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
            state.idle -= 1;

            if timeout.timed_out() && state.queue.is_empty() && state.workers > config.core_size {
                state.workers -= 1;
                tracing::debug!("Retiring idle worker ({} remain)", state.workers);
                return None;
            }
        } else {
            state = shared
                .work_available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            state.idle -= 1;
        }
    }
}
