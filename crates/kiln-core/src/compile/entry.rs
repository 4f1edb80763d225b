//! Generated glue around a program's entry point.
//!
//! Both strategies call the entry through the same conversion trait, so an
//! entry may return `()` or `Result<(), E>` for any `E: Debug`.

use crate::error::{Error, Result};
use crate::task::TaskId;

use super::errors::Diagnostic;

/// Converts an entry's return value to `Ok(())` or an error message.
pub(crate) const TERMINATION_TRAIT: &str = r#"#[doc(hidden)]
trait __KilnTermination {
    fn __kiln_report(self) -> ::std::result::Result<(), ::std::string::String>;
}

impl __KilnTermination for () {
    fn __kiln_report(self) -> ::std::result::Result<(), ::std::string::String> {
        Ok(())
    }
}

impl<E: ::std::fmt::Debug> __KilnTermination for ::std::result::Result<(), E> {
    fn __kiln_report(self) -> ::std::result::Result<(), ::std::string::String> {
        self.map_err(|e| format!("{:?}", e))
    }
}
"#;

/// Exported symbol name for a task's in-process entry.
pub fn entry_symbol(task_id: TaskId) -> String {
    format!("kiln_entry_{}", task_id.short())
}

/// Reject entry names that are not plain identifiers.
///
/// The name is spliced into generated code, so anything else is reported
/// as a compile failure.
pub fn validate_entry_point(entry_point: &str) -> Result<()> {
    let mut chars = entry_point.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Compilation {
            diagnostics: vec![Diagnostic::raw(format!(
                "invalid entry point '{}': expected a function name",
                entry_point
            ))],
        })
    }
}

/// `fn main` that calls `entry_point` and maps an `Err` to exit code 1.
pub(crate) fn main_shim(entry_point: &str) -> String {
    format!(
        "\n{}\nfn main() {{\n    if let Err(message) = __KilnTermination::__kiln_report({}()) {{\n        eprintln!(\"Error: {{}}\", message);\n        ::std::process::exit(1);\n    }}\n}}\n",
        TERMINATION_TRAIT, entry_point
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_symbol_is_task_scoped() {
        let a = entry_symbol(TaskId::new());
        let b = entry_symbol(TaskId::new());
        assert!(a.starts_with("kiln_entry_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_entry_point() {
        assert!(validate_entry_point("main").is_ok());
        assert!(validate_entry_point("_run2").is_ok());
        assert!(validate_entry_point("").is_err());
        assert!(validate_entry_point("2fast").is_err());
        assert!(matches!(
            validate_entry_point("run(); evil"),
            Err(Error::Compilation { .. })
        ));
    }

    #[test]
    fn test_main_shim_calls_entry() {
        let shim = main_shim("process");
        assert!(shim.contains("fn main()"));
        assert!(shim.contains("__kiln_report(process())"));
        assert!(shim.contains("trait __KilnTermination"));
    }
}
