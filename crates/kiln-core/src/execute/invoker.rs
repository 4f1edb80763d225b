//! Runs compiled artifacts and collects raw outcomes.

use std::path::PathBuf;
use std::process::Command;

use libloading::Symbol;

use crate::compile::{BuiltProject, CompiledArtifact, LoadedArtifact};
use crate::error::{Error, Result};
use crate::task::ExecutionOutcome;

use super::capture::with_captured_stdio;
use super::context::CancelToken;
use super::ffi::{EntryFn, EntryStatus, MESSAGE_CAPACITY};
use super::process::{ChildInput, ChildLimits, ChildOutput, run_command};

/// Invokes the entry point of a compiled artifact.
#[derive(Debug, Clone)]
pub struct Invoker {
    cargo_path: PathBuf,
    memory_limit_bytes: Option<u64>,
}

impl Invoker {
    /// Create an invoker that runs built projects with `cargo_path`.
    pub fn new(cargo_path: impl Into<PathBuf>) -> Self {
        Self {
            cargo_path: cargo_path.into(),
            memory_limit_bytes: None,
        }
    }

    /// Limit the address space of out-of-process programs.
    pub fn with_memory_limit(mut self, bytes: Option<u64>) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    /// Run `artifact` and return its raw outcome.
    ///
    /// A program that fails at runtime is an `Ok` outcome with
    /// `success = false`; `Err` is reserved for infrastructure failures
    /// and cancellation.
    pub fn invoke(
        &self,
        artifact: &CompiledArtifact,
        entry_point: &str,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome> {
        cancel.check()?;

        match artifact {
            CompiledArtifact::Loaded(loaded) => self.invoke_loaded(loaded, entry_point, cancel),
            CompiledArtifact::Built(built) => self.invoke_built(built, entry_point, cancel),
        }
    }

    /// Call the generated entry with fds 0/1 redirected.
    ///
    /// A task cancelled while waiting for the capture lock is skipped. Once
    /// started, the call cannot be interrupted and runs to completion.
    fn invoke_loaded(
        &self,
        loaded: &LoadedArtifact,
        entry_point: &str,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome> {
        // Safety: the symbol was generated by DylibCompiler with this signature
        let symbol: Symbol<EntryFn> = unsafe { loaded.library().get(loaded.entry_symbol.as_bytes()) }
            .map_err(|e| {
                Error::Runtime(format!("Failed to get symbol {}: {}", loaded.entry_symbol, e))
            })?;
        let func: EntryFn = *symbol;

        let mut message = vec![0u8; MESSAGE_CAPACITY];
        let mut message_len: usize = 0;

        tracing::debug!("Calling {} ({}) for task {}", entry_point, loaded.entry_symbol, loaded.task_id);

        let (code, stdout) = with_captured_stdio(&loaded.capture_path, &loaded.input_path, cancel, || {
            // Safety: the buffer outlives the call and its capacity is passed along
            unsafe { func(message.as_mut_ptr(), message.len(), &mut message_len) }
        })?;

        let message = String::from_utf8_lossy(&message[..message_len.min(MESSAGE_CAPACITY)]).into_owned();

        Ok(match EntryStatus::from(code) {
            EntryStatus::Completed => ExecutionOutcome::succeeded(stdout),
            EntryStatus::ReturnedError => ExecutionOutcome::raised(stdout, message),
            EntryStatus::Panicked => ExecutionOutcome::raised(stdout, format!("panicked: {}", message)),
        })
    }

    /// `cargo run` the built project with the staged input on stdin.
    fn invoke_built(
        &self,
        built: &BuiltProject,
        entry_point: &str,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome> {
        let mut cmd = Command::new(&self.cargo_path);
        cmd.arg("run")
            .arg("--quiet")
            .arg("--manifest-path")
            .arg(built.manifest_path())
            .arg("--bin")
            .arg(built.project.bin_name())
            .env("CARGO_TARGET_DIR", &built.target_dir)
            .current_dir(built.project.dir());

        tracing::debug!("Running {} via cargo for {}", entry_point, built.project.package_name());

        let limits = ChildLimits {
            memory_bytes: self.memory_limit_bytes,
        };
        let output = run_command(&mut cmd, ChildInput::File(built.input_path()), &limits, cancel)?;

        Ok(outcome_from_exit(output))
    }
}

/// Map a finished program run to an outcome.
///
/// Killed by a signal, or non-zero exit with something on stderr, is a
/// failure. Anything else counts as success.
fn outcome_from_exit(output: ChildOutput) -> ExecutionOutcome {
    let exit_code = output.status.code();

    if let Some(signal) = output.exit_signal() {
        let mut stderr = output.stderr;
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("terminated by signal {}", signal));
        return ExecutionOutcome {
            stdout: output.stdout,
            stderr,
            success: false,
            exit_code,
            exception_message: None,
            timed_out: false,
        };
    }

    let failed = exit_code != Some(0) && !output.stderr.trim().is_empty();
    ExecutionOutcome {
        stdout: output.stdout,
        stderr: output.stderr,
        success: !failed,
        exit_code,
        exception_message: None,
        timed_out: false,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn run_sh(script: &str) -> ChildOutput {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        run_command(&mut cmd, ChildInput::Null, &ChildLimits::default(), &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn test_clean_exit_is_success() {
        let outcome = outcome_from_exit(run_sh("echo hello"));
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "hello\n");
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn test_nonzero_exit_with_stderr_is_failure() {
        let outcome = outcome_from_exit(run_sh("echo partial; echo boom >&2; exit 101"));
        assert!(!outcome.success);
        assert_eq!(outcome.stdout, "partial\n");
        assert_eq!(outcome.stderr, "boom\n");
        assert_eq!(outcome.exit_code, Some(101));
    }

    #[test]
    fn test_nonzero_exit_without_stderr_is_success() {
        let outcome = outcome_from_exit(run_sh("echo done; exit 2"));
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(2));
    }

    #[test]
    fn test_signal_is_failure() {
        let outcome = outcome_from_exit(run_sh("kill -9 $$"));
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("terminated by signal 9"));
        assert_eq!(outcome.exit_code, None);
    }
}
