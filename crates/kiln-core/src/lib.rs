//! Core engine for the Kiln dynamic code execution service.
//!
//! This crate provides:
//! - Dependency resolution from program source
//! - Task-scoped project staging
//! - In-process (cdylib) and out-of-process (cargo) compilation
//! - Invocation with output capture and cancellation
//! - Admission-controlled scheduling with per-task deadlines

pub mod compile;
pub mod config;
pub mod error;
pub mod execute;
pub mod paths;
pub mod scheduler;
pub mod task;

pub use compile::{DependencyManifest, DependencyResolver, DependencyTable, ResolvedDependency};
pub use config::{ExecutorConfig, Strategy};
pub use error::{Error, Result};
pub use execute::{CancelToken, Pipeline, TaskExecutor, TaskObserver};
pub use paths::TaskWorkspace;
pub use scheduler::{TaskScheduler, TaskState, TaskTicket};
pub use task::{ExecutionOutcome, InputRow, TaskId, TaskRequest, TaskResponse};
