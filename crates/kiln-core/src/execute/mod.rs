//! Execution engine for compiled tasks.
//!
//! # Strategies
//!
//! ## In-Process
//!
//! ```text
//! LoadedArtifact (cdylib loaded via libloading)
//!     │
//!     └── OUTPUT_CAPTURE lock (also taken by host stdout writes)
//!             │
//!             ├── cancelled while waiting → skipped
//!             ├── fd 1 → stdout.log, fd 0 ← input.json
//!             ├── FFI call → kiln_entry_<id>
//!             └── fds restored (RAII guard)
//! ```
//!
//! ## Out-of-Process
//!
//! ```text
//! BuiltProject
//!     │
//!     └── cargo run (own process group, RLIMIT_AS)
//!             │
//!             ├── stdin  ← input.json
//!             ├── stdout → reader thread
//!             └── stderr → reader thread
//! ```
//!
//! On timeout the scheduler cancels the task's [`CancelToken`], which
//! kills the running child's process group. In-process calls cannot be
//! interrupted.
//!
//! # Module Structure
//!
//! - `capture` - fd redirection for in-process calls
//! - `classify` - outcome/error → `TaskResponse`
//! - `context` - cancellation token and lifecycle observer
//! - `ffi` - FFI entry types
//! - `invoker` - runs artifacts
//! - `pipeline` - `TaskExecutor` and the default pipeline
//! - `process` - child processes with cancellation

mod capture;
mod classify;
mod context;
mod ffi;
mod invoker;
mod pipeline;
mod process;

pub use capture::{OUTPUT_CAPTURE, lock_stdout, with_captured_stdio};
pub use classify::{classify, classify_error};
pub use context::{CancelToken, TaskObserver};
pub use ffi::{EntryFn, EntryStatus, MESSAGE_CAPACITY};
pub use invoker::Invoker;
pub use pipeline::{Pipeline, TaskExecutor};
pub use process::{ChildInput, ChildLimits, ChildOutput, run_command};
