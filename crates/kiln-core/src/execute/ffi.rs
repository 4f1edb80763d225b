//! FFI types for in-process entry points.

/// Capacity of the buffer the entry writes its error message into.
pub const MESSAGE_CAPACITY: usize = 4096;

/// Entry function generated around a program's entry point.
///
/// Arguments: message buffer, its capacity, out-param for the message
/// length. Returns an [`EntryStatus`] code.
pub type EntryFn = unsafe extern "C" fn(*mut u8, usize, *mut usize) -> i32;

/// Status code returned by a generated entry function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EntryStatus {
    /// Entry returned normally
    Completed = 0,
    /// Entry returned `Err`
    ReturnedError = 1,
    /// Entry panicked
    Panicked = 2,
}

impl From<i32> for EntryStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Completed,
            2 => Self::Panicked,
            _ => Self::ReturnedError, // Unknown codes treated as errors
        }
    }
}
