//! Task-scoped working directories.
//!
//! Every task gets its own directory under the configured work root:
//!
//! ```text
//! <work_dir>/
//! └── kiln-task-<id>-XXXX/
//!     ├── input.json     # Auxiliary rows, fed to the program's stdin
//!     ├── stdout.log     # In-process output capture
//!     ├── lib/           # In-process cdylib
//!     ├── project/       # Out-of-process cargo project
//!     │   ├── Cargo.toml
//!     │   ├── input.json
//!     │   └── src/main.rs
//!     └── target/        # CARGO_TARGET_DIR for the project
//! ```
//!
//! The directory is removed when the workspace is dropped. Nothing here is
//! ever shared between tasks.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::task::TaskId;

/// Directory owned by exactly one in-flight task.
#[derive(Debug)]
pub struct TaskWorkspace {
    task_id: TaskId,
    dir: TempDir,
}

impl TaskWorkspace {
    /// Create a fresh workspace for `task_id` under `root`.
    ///
    /// # Errors
    /// Returns `Error::Staging` if the root or the task directory cannot be
    /// created.
    pub fn create(root: &Path, task_id: TaskId) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| Error::staging(root, e))?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("kiln-task-{}-", task_id.short()))
            .tempdir_in(root)
            .map_err(|e| Error::staging(root, e))?;

        tracing::debug!("Created workspace {} for task {}", dir.path().display(), task_id);
        Ok(Self { task_id, dir })
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Staged auxiliary input.
    pub fn input_file(&self) -> PathBuf {
        self.root().join("input.json")
    }

    /// File the in-process invoker redirects stdout into.
    pub fn stdout_capture_file(&self) -> PathBuf {
        self.root().join("stdout.log")
    }

    /// Output directory for the in-process library.
    pub fn lib_dir(&self) -> PathBuf {
        self.root().join("lib")
    }

    /// Root of the staged cargo project.
    pub fn project_dir(&self) -> PathBuf {
        self.root().join("project")
    }

    /// Cargo target directory for the staged project.
    pub fn target_dir(&self) -> PathBuf {
        self.root().join("target")
    }

    /// Write the serialized input rows.
    pub fn write_input(&self, json: &str) -> Result<PathBuf> {
        let path = self.input_file();
        fs::write(&path, json).map_err(|e| Error::staging(&path, e))?;
        Ok(path)
    }

    /// Remove the directory now and report failures.
    ///
    /// Dropping the workspace does the same silently.
    pub fn close(self) -> Result<()> {
        let path = self.root().to_path_buf();
        self.dir.close().map_err(|e| {
            tracing::warn!("Failed to remove workspace {}: {}", path.display(), e);
            Error::Io(e)
        })
    }
}
