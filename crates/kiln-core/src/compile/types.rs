//! Common types for the compilation pipeline.

use std::path::{Path, PathBuf};

use libloading::Library;

use crate::error::Result;
use crate::execute::CancelToken;
use crate::paths::TaskWorkspace;
use crate::task::{InputRow, TaskId};

use super::dependency_resolver::DependencyManifest;
use super::stager::StagedProject;

/// Everything a compiler needs to build one task.
#[derive(Debug, Clone, Copy)]
pub struct CompilationUnit<'a> {
    pub task_id: TaskId,
    /// Program source as submitted.
    pub source: &'a str,
    /// Function execution starts at.
    pub entry_point: &'a str,
    /// Dependencies derived from the source.
    pub manifest: &'a DependencyManifest,
    /// Auxiliary rows, staged as JSON for the program's stdin.
    pub input_rows: &'a [InputRow],
    /// Task-scoped directory all artifacts go into.
    pub workspace: &'a TaskWorkspace,
}

/// A dynamic library loaded for exactly one task.
///
/// Dropping it unloads the library.
#[derive(Debug)]
pub struct LoadedArtifact {
    pub task_id: TaskId,
    /// Per-task FFI symbol generated around the entry point.
    pub entry_symbol: String,
    /// Location of the library inside the task workspace.
    pub library_path: PathBuf,
    /// Staged input fed to fd 0 during the call.
    pub input_path: PathBuf,
    /// File fd 1 is redirected to during the call.
    pub capture_path: PathBuf,
    /// Time spent in rustc.
    pub compile_time_ms: u64,
    pub(crate) library: Library,
}

impl LoadedArtifact {
    pub fn library(&self) -> &Library {
        &self.library
    }
}

/// A cargo project that built successfully.
#[derive(Debug)]
pub struct BuiltProject {
    pub project: StagedProject,
    /// Task-scoped cargo target directory.
    pub target_dir: PathBuf,
    /// Time spent in `cargo build`.
    pub compile_time_ms: u64,
}

impl BuiltProject {
    pub fn manifest_path(&self) -> PathBuf {
        self.project.manifest_path()
    }

    pub fn input_path(&self) -> &Path {
        self.project.input_path()
    }
}

/// Result of a successful compilation, ready for the invoker.
#[derive(Debug)]
pub enum CompiledArtifact {
    /// In-process: library loaded into this process.
    Loaded(LoadedArtifact),
    /// Out-of-process: binary built by cargo.
    Built(BuiltProject),
}

impl CompiledArtifact {
    pub fn compile_time_ms(&self) -> u64 {
        match self {
            Self::Loaded(loaded) => loaded.compile_time_ms,
            Self::Built(built) => built.compile_time_ms,
        }
    }
}

/// A strategy that turns source into something the invoker can run.
///
/// Implementations report compile errors as `Error::Compilation` and never
/// panic past this boundary.
pub trait CodeCompiler: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Compile one task.
    fn compile(&self, unit: &CompilationUnit<'_>, cancel: &CancelToken)
    -> Result<CompiledArtifact>;
}

/// Platform-specific dynamic library extension.
pub fn dylib_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dll"
    }
    #[cfg(target_os = "macos")]
    {
        "dylib"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "so"
    }
}

/// Platform-specific dynamic library prefix.
pub fn dylib_prefix() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ""
    }
    #[cfg(not(target_os = "windows"))]
    {
        "lib"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dylib_extension() {
        let ext = dylib_extension();
        #[cfg(target_os = "linux")]
        assert_eq!(ext, "so");
        #[cfg(target_os = "macos")]
        assert_eq!(ext, "dylib");
        #[cfg(target_os = "windows")]
        assert_eq!(ext, "dll");
    }

    #[test]
    fn test_dylib_prefix() {
        #[cfg(unix)]
        assert_eq!(dylib_prefix(), "lib");
    }
}
