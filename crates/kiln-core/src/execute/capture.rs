//! Output capture for in-process calls.
//!
//! File descriptors 0 and 1 belong to the whole process, so only one
//! in-process call may have them redirected at a time. [`with_captured_stdio`]
//! holds [`OUTPUT_CAPTURE`] for the full redirect → call → restore sequence.
//!
//! Host code that writes to stdout while in-process tasks may be running
//! must hold [`lock_stdout`] for the write. Otherwise the bytes land in
//! whichever task currently owns fd 1.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

use super::context::CancelToken;

/// Guards the process-wide stdin/stdout descriptors.
///
/// Held by an in-process call for as long as fds 0/1 are redirected, and by
/// host code for every stdout write that may overlap such a call.
pub static OUTPUT_CAPTURE: Mutex<()> = Mutex::new(());

/// Take [`OUTPUT_CAPTURE`] for a host-side stdout write.
///
/// While the guard is alive fd 1 is the real stdout. Take it before locking
/// `io::stdout()`, never after.
pub fn lock_stdout() -> MutexGuard<'static, ()> {
    OUTPUT_CAPTURE.lock().unwrap_or_else(PoisonError::into_inner)
}

const STDIN_FD: libc::c_int = 0;
const STDOUT_FD: libc::c_int = 1;

/// Restores fds 0 and 1 when dropped.
struct StdioRedirect {
    saved_stdin: libc::c_int,
    saved_stdout: libc::c_int,
}

impl StdioRedirect {
    /// Point fd 1 at `stdout_to` and fd 0 at `stdin_from`.
    fn redirect(stdout_to: &File, stdin_from: &File) -> io::Result<Self> {
        io::stdout().flush()?;

        let saved_stdout = unsafe { libc::dup(STDOUT_FD) };
        if saved_stdout < 0 {
            return Err(io::Error::last_os_error());
        }
        let saved_stdin = unsafe { libc::dup(STDIN_FD) };
        if saved_stdin < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(saved_stdout) };
            return Err(err);
        }

        // From here on, dropping the guard undoes any partial redirect.
        let guard = Self {
            saved_stdin,
            saved_stdout,
        };

        if unsafe { libc::dup2(stdout_to.as_raw_fd(), STDOUT_FD) } < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::dup2(stdin_from.as_raw_fd(), STDIN_FD) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(guard)
    }
}

impl Drop for StdioRedirect {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        unsafe {
            libc::dup2(self.saved_stdout, STDOUT_FD);
            libc::dup2(self.saved_stdin, STDIN_FD);
            libc::close(self.saved_stdout);
            libc::close(self.saved_stdin);
        }
    }
}

/// Run `call` with stdout captured into `capture_path` and stdin read from
/// `input_path`. Returns the call's result and everything it printed.
///
/// `cancel` is checked once the lock is held, so a task that timed out
/// while waiting for another call never runs.
///
/// # Errors
/// Returns `Error::Cancelled` if the task was cancelled while waiting,
/// `Error::Staging` if either file cannot be opened, or `Error::Io` if the
/// descriptors cannot be redirected.
pub fn with_captured_stdio<T>(
    capture_path: &Path,
    input_path: &Path,
    cancel: &CancelToken,
    call: impl FnOnce() -> T,
) -> Result<(T, String)> {
    let capture = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(capture_path)
        .map_err(|e| Error::staging(capture_path, e))?;
    let input = File::open(input_path).map_err(|e| Error::staging(input_path, e))?;

    let value = {
        let _lock = lock_stdout();
        cancel.check()?;
        let _redirect = StdioRedirect::redirect(&capture, &input)?;
        call()
    };

    let output = fs::read(capture_path).map_err(|e| Error::staging(capture_path, e))?;
    Ok((value, String::from_utf8_lossy(&output).into_owned()))
}
