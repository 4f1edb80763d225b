//! Child process execution with cancellation.
//!
//! Every tool the pipeline launches (rustc, cargo, the built program) goes
//! through [`run_command`]: the child becomes the leader of its own process
//! group, registers with the task's [`CancelToken`], and has stdout and
//! stderr drained by two independent reader threads so neither pipe can
//! fill up and stall the other.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{Error, Result};

use super::context::CancelToken;

/// What the child reads on stdin.
#[derive(Debug, Clone, Copy)]
pub enum ChildInput<'a> {
    /// Nothing (`/dev/null`).
    Null,
    /// Bytes written through a pipe, then closed.
    Bytes(&'a [u8]),
    /// Contents of a file.
    File(&'a Path),
}

/// Resource limits applied to the child before exec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildLimits {
    /// Address-space limit in bytes.
    pub memory_bytes: Option<u64>,
}

/// Exit status and captured output of a finished child.
#[derive(Debug)]
pub struct ChildOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ChildOutput {
    /// Signal that terminated the child, if any.
    pub fn exit_signal(&self) -> Option<i32> {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt as _;
            self.status.signal()
        }
        #[cfg(not(unix))]
        {
            None
        }
    }
}

/// Run `cmd` to completion, feeding `input` and capturing both streams.
///
/// # Errors
/// - `Error::Cancelled` if the token was cancelled before or while the
///   child ran (the child's process group is killed).
/// - `Error::Io` / `Error::Staging` if the child or its input cannot be
///   set up.
pub fn run_command(
    cmd: &mut Command,
    input: ChildInput<'_>,
    limits: &ChildLimits,
    cancel: &CancelToken,
) -> Result<ChildOutput> {
    cancel.check()?;

    match input {
        ChildInput::Null => {
            cmd.stdin(Stdio::null());
        }
        ChildInput::Bytes(_) => {
            cmd.stdin(Stdio::piped());
        }
        ChildInput::File(path) => {
            let file = File::open(path).map_err(|e| Error::staging(path, e))?;
            cmd.stdin(file);
        }
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        cmd.process_group(0);
        if let Some(bytes) = limits.memory_bytes {
            unsafe {
                cmd.pre_exec(move || apply_memory_limit(bytes));
            }
        }
    }
    #[cfg(not(unix))]
    let _ = limits;

    let mut child = cmd.spawn()?;
    if let Err(e) = cancel.register_child(child.id()) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e);
    }

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let waited = std::thread::scope(|scope| {
        let writer = scope.spawn(move || {
            if let (Some(mut pipe), ChildInput::Bytes(bytes)) = (stdin, input) {
                // The child may exit without reading everything.
                let _ = pipe.write_all(bytes);
            }
        });
        let out_reader = scope.spawn(move || read_stream(stdout));
        let err_reader = scope.spawn(move || read_stream(stderr));

        let status = child.wait();
        let _ = writer.join();
        let stdout = out_reader.join().unwrap_or_default();
        let stderr = err_reader.join().unwrap_or_default();
        (status, stdout, stderr)
    });

    cancel.clear_child();

    let (status, stdout, stderr) = waited;
    let status = status?;
    cancel.check()?;

    Ok(ChildOutput {
        status,
        stdout,
        stderr,
    })
}

fn read_stream(stream: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf) {
            tracing::debug!("Failed to read child output: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn apply_memory_limit(bytes: u64) -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: bytes as libc::rlim_t,
        rlim_max: bytes as libc::rlim_t,
    };
    // Only async-signal-safe calls are allowed between fork and exec.
    if unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_captures_both_streams() {
        let output = run_command(
            &mut sh("echo out; echo err >&2; exit 3"),
            ChildInput::Null,
            &ChildLimits::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.exit_signal(), None);
    }

    #[test]
    fn test_feeds_stdin_bytes() {
        let output = run_command(
            &mut sh("cat"),
            ChildInput::Bytes(b"[1,2,3]"),
            &ChildLimits::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(output.stdout, "[1,2,3]");
    }

    #[test]
    fn test_feeds_stdin_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("input.json");
        std::fs::write(&path, "rows").unwrap();

        let output = run_command(
            &mut sh("cat"),
            ChildInput::File(&path),
            &ChildLimits::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(output.stdout, "rows");
    }

    #[test]
    fn test_large_output_does_not_deadlock() {
        let output = run_command(
            &mut sh("head -c 1000000 /dev/zero | tr '\\0' a; head -c 1000000 /dev/zero | tr '\\0' b >&2"),
            ChildInput::Null,
            &ChildLimits::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(output.stdout.len(), 1_000_000);
        assert_eq!(output.stderr.len(), 1_000_000);
    }

    #[test]
    fn test_cancel_kills_whole_group() {
        let token = CancelToken::new();
        let canceller = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        let start = Instant::now();
        // The grandchild `sleep` holds stdout open; it must die too.
        let result = run_command(
            &mut sh("sleep 30 & sleep 30; wait"),
            ChildInput::Null,
            &ChildLimits::default(),
            &token,
        );

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_cancelled_token_refuses_to_spawn() {
        let token = CancelToken::new();
        token.cancel();
        let result = run_command(
            &mut sh("echo never"),
            ChildInput::Null,
            &ChildLimits::default(),
            &token,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_limit_is_applied() {
        let limits = ChildLimits {
            memory_bytes: Some(512 * 1024 * 1024),
        };
        let output = run_command(
            &mut sh("ulimit -v"),
            ChildInput::Null,
            &limits,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(output.stdout.trim(), "524288");
    }
}
