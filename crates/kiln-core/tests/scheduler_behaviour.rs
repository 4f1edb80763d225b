//! Integration tests for scheduling: deadlines, admission and lifecycle.
//!
//! Uses a scripted executor so no toolchain is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use kiln_core::execute::{CancelToken, TaskExecutor, TaskObserver};
use kiln_core::{
    Error, ExecutionOutcome, ExecutorConfig, Result, TaskId, TaskRequest, TaskResponse,
    TaskScheduler, TaskState,
};

/// Executor driven by the request source:
/// - `sleep:<ms>` sleeps, checking the cancel token
/// - `panic` panics
/// - anything else echoes the source
#[derive(Default)]
struct Scripted {
    started: AtomicUsize,
    cancelled: AtomicUsize,
}

impl TaskExecutor for Scripted {
    fn execute(
        &self,
        _task_id: TaskId,
        request: &TaskRequest,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome> {
        self.started.fetch_add(1, Ordering::SeqCst);

        if let Some(ms) = request.source_code.strip_prefix("sleep:") {
            let until = Instant::now() + Duration::from_millis(ms.parse().unwrap());
            while Instant::now() < until {
                if cancel.is_cancelled() {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    return Err(Error::Cancelled);
                }
                thread::sleep(Duration::from_millis(5));
            }
            return Ok(ExecutionOutcome::succeeded("woke up"));
        }

        if request.source_code == "panic" {
            panic!("pipeline bug");
        }

        Ok(ExecutionOutcome::succeeded(request.source_code.clone()))
    }
}

fn config(core: usize, max: usize, queue: usize, timeout: u64) -> ExecutorConfig {
    ExecutorConfig {
        core_thread_size: core,
        max_thread_size: max,
        thread_queue_size: queue,
        code_timeout_seconds: timeout,
        keep_thread_alive_time: 1,
        ..Default::default()
    }
}

#[test]
fn test_sleeping_task_times_out_promptly() {
    let executor = Arc::new(Scripted::default());
    let scheduler = TaskScheduler::with_executor(config(1, 1, 1, 1), executor.clone()).unwrap();

    let start = Instant::now();
    let response = scheduler.run_task(TaskRequest::new("sleep:10000", "main"));
    let elapsed = start.elapsed();

    assert!(response.is_timeout(), "Expected timeout, got {:?}", response);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3), "Took {:?}", elapsed);

    // The running task observes the cancellation
    let deadline = Instant::now() + Duration::from_secs(5);
    while executor.cancelled.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(executor.cancelled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_admission_rejects_beyond_queue_plus_max() {
    let executor = Arc::new(Scripted::default());
    let scheduler = TaskScheduler::with_executor(config(1, 2, 2, 10), executor).unwrap();

    let mut tickets = Vec::new();
    let mut rejected = 0;
    for _ in 0..6 {
        match scheduler.submit(TaskRequest::new("sleep:500", "main")) {
            Ok(ticket) => tickets.push(ticket),
            Err(Error::AdmissionRejected { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    // 2 workers + 2 queued
    assert_eq!(tickets.len(), 4);
    assert_eq!(rejected, 2);

    for ticket in tickets {
        assert_eq!(ticket.wait(), TaskResponse::success("woke up"));
    }
}

#[test]
fn test_rejected_run_task_is_exception() {
    let executor = Arc::new(Scripted::default());
    let scheduler = Arc::new(TaskScheduler::with_executor(config(1, 1, 1, 10), executor).unwrap());

    let busy = scheduler.submit(TaskRequest::new("sleep:500", "main")).unwrap();
    let queued = scheduler.submit(TaskRequest::new("sleep:10", "main")).unwrap();

    let response = scheduler.run_task(TaskRequest::new("echo", "main"));
    let message = response.exception_msg().expect("rejection is an exception");
    assert!(message.contains("rejected"), "{}", message);

    assert!(busy.wait().is_success());
    assert!(queued.wait().is_success());
}

#[test]
fn test_queued_task_past_deadline_is_skipped() {
    let executor = Arc::new(Scripted::default());
    let scheduler = TaskScheduler::with_executor(config(1, 1, 4, 1), executor.clone()).unwrap();

    let blocker = scheduler.submit(TaskRequest::new("sleep:1500", "main")).unwrap();
    let queued = scheduler.submit(TaskRequest::new("never runs", "main")).unwrap();

    assert!(queued.wait().is_timeout());
    assert!(blocker.wait().is_timeout());

    // Give the worker time to drain the queue
    thread::sleep(Duration::from_millis(300));
    assert_eq!(executor.started.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_executor_is_exception_and_pool_survives() {
    let executor = Arc::new(Scripted::default());
    let scheduler = TaskScheduler::with_executor(config(1, 1, 1, 5), executor).unwrap();

    let response = scheduler.run_task(TaskRequest::new("panic", "main"));
    assert!(response.exception_msg().unwrap().contains("pipeline bug"));

    let response = scheduler.run_task(TaskRequest::new("still alive", "main"));
    assert_eq!(response, TaskResponse::success("still alive"));
}

#[derive(Default)]
struct Transitions {
    seen: Mutex<Vec<(TaskState, TaskState)>>,
    completed: AtomicUsize,
}

impl TaskObserver for Transitions {
    fn on_state_change(&self, _task_id: TaskId, from: TaskState, to: TaskState) {
        self.seen.lock().unwrap().push((from, to));
    }

    fn on_task_completed(&self, _task_id: TaskId, _response: &TaskResponse) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_state_machine_reaches_one_terminal_state() {
    let observer = Arc::new(Transitions::default());
    let scheduler = TaskScheduler::with_executor(config(1, 1, 1, 5), Arc::new(Scripted::default()))
        .unwrap()
        .with_observer(observer.clone());

    let ticket = scheduler.submit(TaskRequest::new("sleep:100", "main")).unwrap();
    let response = ticket.wait();
    assert!(response.is_success());

    let seen = observer.seen.lock().unwrap().clone();
    let terminal: Vec<_> = seen.iter().filter(|(_, to)| to.is_terminal()).collect();
    assert_eq!(terminal, vec![&(TaskState::Running, TaskState::Succeeded)]);
    assert!(seen.iter().any(|(_, to)| *to == TaskState::Running));
    assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ticket_state_after_timeout() {
    let scheduler =
        TaskScheduler::with_executor(config(1, 1, 1, 1), Arc::new(Scripted::default())).unwrap();

    let ticket = scheduler.submit(TaskRequest::new("sleep:5000", "main")).unwrap();
    let id = ticket.task_id();
    assert!(!ticket.state().is_terminal());

    let response = ticket.wait();
    assert!(response.is_timeout(), "task {} returned {:?}", id, response);
}

#[test]
fn test_concurrent_run_task_callers() {
    let scheduler = Arc::new(
        TaskScheduler::with_executor(config(4, 8, 16, 5), Arc::new(Scripted::default())).unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let scheduler = scheduler.clone();
            thread::spawn(move || scheduler.run_task(TaskRequest::new(format!("task-{}", i), "main")))
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), TaskResponse::success(format!("task-{}", i)));
    }
}
