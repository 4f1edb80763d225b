//! In-process compiler.
//!
//! Wraps the program with a generated FFI entry point, pipes it to rustc on
//! stdin and loads the resulting cdylib from the task workspace.
//!
//! ```text
//! #![allow(...)]            ← prelude (1 line)
//! <program source>
//! __KilnTermination trait   ← epilogue
//! #[no_mangle] kiln_entry_<id>(msg, cap, len) -> i32
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use libloading::Library;

use crate::error::{Error, Result};
use crate::execute::{CancelToken, ChildInput, ChildLimits, run_command};

use super::entry::{TERMINATION_TRAIT, entry_symbol, validate_entry_point};
use super::errors::{Diagnostic, DiagnosticParser};
use super::types::{
    CodeCompiler, CompilationUnit, CompiledArtifact, LoadedArtifact, dylib_extension, dylib_prefix,
};

const PRELUDE: &str = "#![allow(dead_code, unused_imports, unused_variables, unused_mut)]\n";

/// Generated lines before the program source.
const PRELUDE_LINES: usize = 1;

/// Compiles programs to dynamic libraries loaded into this process.
#[derive(Debug, Clone)]
pub struct DylibCompiler {
    rustc_path: PathBuf,
    opt_level: u8,
}

impl DylibCompiler {
    pub fn new(rustc_path: impl Into<PathBuf>) -> Self {
        Self {
            rustc_path: rustc_path.into(),
            opt_level: 0,
        }
    }

    /// Set the optimization level (0-3).
    pub fn with_opt_level(mut self, level: u8) -> Self {
        self.opt_level = level.min(3);
        self
    }

    /// Generate the wrapper code for a program.
    pub fn generate_wrapper(source: &str, entry_point: &str, symbol: &str) -> String {
        let mut code = String::with_capacity(source.len() + 2048);

        code.push_str(PRELUDE);
        code.push_str(source);
        if !source.ends_with('\n') {
            code.push('\n');
        }
        code.push('\n');
        code.push_str(TERMINATION_TRAIT);
        code.push('\n');

        code.push_str("#[no_mangle]\n");
        code.push_str(&format!(
            "pub unsafe extern \"C\" fn {}(msg_ptr: *mut u8, msg_cap: usize, msg_len: *mut usize) -> i32 {{\n",
            symbol
        ));
        // The hook lives in this library's copy of std; the host's is untouched
        code.push_str("    ::std::panic::set_hook(::std::boxed::Box::new(|_| {}));\n");
        code.push_str(&format!(
            "    let outcome = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| __KilnTermination::__kiln_report({}())));\n",
            entry_point
        ));
        code.push_str("    let _ = ::std::io::Write::flush(&mut ::std::io::stdout());\n");
        code.push_str("    let (status, message) = match outcome {\n");
        code.push_str("        Ok(Ok(())) => (0, ::std::string::String::new()),\n");
        code.push_str("        Ok(Err(message)) => (1, message),\n");
        code.push_str("        Err(payload) => {\n");
        code.push_str("            let message = if let Some(s) = payload.downcast_ref::<&str>() {\n");
        code.push_str("                s.to_string()\n");
        code.push_str("            } else if let Some(s) = payload.downcast_ref::<::std::string::String>() {\n");
        code.push_str("                s.clone()\n");
        code.push_str("            } else {\n");
        code.push_str("                \"non-string panic payload\".to_string()\n");
        code.push_str("            };\n");
        code.push_str("            (2, message)\n");
        code.push_str("        }\n");
        code.push_str("    };\n");
        code.push_str("    let bytes = message.as_bytes();\n");
        code.push_str("    let n = bytes.len().min(msg_cap);\n");
        code.push_str("    ::std::ptr::copy_nonoverlapping(bytes.as_ptr(), msg_ptr, n);\n");
        code.push_str("    *msg_len = n;\n");
        code.push_str("    status\n");
        code.push_str("}\n");

        code
    }
}

impl CodeCompiler for DylibCompiler {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn compile(&self, unit: &CompilationUnit<'_>, cancel: &CancelToken) -> Result<CompiledArtifact> {
        validate_entry_point(unit.entry_point)?;

        if !unit.manifest.is_empty() {
            let names: Vec<_> = unit.manifest.iter().map(|d| d.artifact.as_str()).collect();
            tracing::warn!(
                "Task {} declares external crates ({}) which the in-process strategy cannot link",
                unit.task_id,
                names.join(", ")
            );
        }

        let symbol = entry_symbol(unit.task_id);
        let wrapper = Self::generate_wrapper(unit.source, unit.entry_point, &symbol);

        let lib_dir = unit.workspace.lib_dir();
        fs::create_dir_all(&lib_dir).map_err(|e| Error::staging(&lib_dir, e))?;

        let crate_name = format!("kiln_task_{}", unit.task_id.short());
        let library_path = lib_dir.join(format!(
            "{}{}.{}",
            dylib_prefix(),
            crate_name,
            dylib_extension()
        ));

        let mut cmd = std::process::Command::new(&self.rustc_path);
        cmd.arg("-")
            .arg("--crate-type=cdylib")
            .arg("--edition=2021")
            .arg("--crate-name")
            .arg(&crate_name)
            .arg("--error-format=json")
            .arg(format!("-Copt-level={}", self.opt_level))
            .arg("-o")
            .arg(&library_path)
            .current_dir(unit.workspace.root());

        let start = Instant::now();
        let output = run_command(
            &mut cmd,
            ChildInput::Bytes(wrapper.as_bytes()),
            &ChildLimits::default(),
            cancel,
        )?;

        if !output.status.success() {
            let parser = DiagnosticParser::new(PRELUDE_LINES, unit.source.lines().count());
            let mut diagnostics = parser.parse_rustc_output(&output.stderr);
            if diagnostics.is_empty() {
                // Fallback if JSON parsing failed
                diagnostics.push(Diagnostic::raw(output.stderr.trim()));
            }
            return Err(Error::Compilation { diagnostics });
        }
        let compile_time_ms = start.elapsed().as_millis() as u64;

        let input_path = unit.workspace.write_input(&serde_json::to_string(unit.input_rows)?)?;

        // Safety: built from the wrapper above, at a path no other task uses
        let library = unsafe { Library::new(&library_path) }?;

        tracing::debug!(
            "Compiled {} in {}ms ({})",
            library_path.display(),
            compile_time_ms,
            symbol
        );

        Ok(CompiledArtifact::Loaded(LoadedArtifact {
            task_id: unit.task_id,
            entry_symbol: symbol,
            library_path,
            input_path,
            capture_path: unit.workspace.stdout_capture_file(),
            compile_time_ms,
            library,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_layout() {
        let source = "fn run() {\n    println!(\"hi\");\n}";
        let wrapper = DylibCompiler::generate_wrapper(source, "run", "kiln_entry_abc");

        // Program starts right after the prelude
        let lines: Vec<&str> = wrapper.lines().collect();
        assert_eq!(lines[PRELUDE_LINES], "fn run() {");
        assert!(lines[0].starts_with("#![allow("));

        assert!(wrapper.contains("#[no_mangle]"));
        assert!(wrapper.contains("pub unsafe extern \"C\" fn kiln_entry_abc("));
        assert!(wrapper.contains("__kiln_report(run())"));
        assert!(wrapper.contains("catch_unwind"));
    }

    #[test]
    fn test_opt_level_is_clamped() {
        let compiler = DylibCompiler::new("rustc").with_opt_level(9);
        assert_eq!(compiler.opt_level, 3);
        assert_eq!(compiler.name(), "in-process");
    }
}
