//! Out-of-process compiler: stage a cargo project and build it.

use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::execute::{CancelToken, ChildInput, ChildLimits, run_command};

use super::errors::Diagnostic;
use super::stager::ProjectStager;
use super::types::{BuiltProject, CodeCompiler, CompilationUnit, CompiledArtifact};

/// Builds staged projects with `cargo build`.
#[derive(Debug, Clone)]
pub struct CargoCompiler {
    cargo_path: PathBuf,
    stager: ProjectStager,
}

impl CargoCompiler {
    pub fn new(cargo_path: impl Into<PathBuf>, stager: ProjectStager) -> Self {
        Self {
            cargo_path: cargo_path.into(),
            stager,
        }
    }
}

impl CodeCompiler for CargoCompiler {
    fn name(&self) -> &'static str {
        "out-of-process"
    }

    fn compile(&self, unit: &CompilationUnit<'_>, cancel: &CancelToken) -> Result<CompiledArtifact> {
        let project = self.stager.stage(
            unit.source,
            unit.entry_point,
            unit.manifest,
            unit.input_rows,
            unit.workspace,
        )?;
        let target_dir = unit.workspace.target_dir();

        let mut cmd = Command::new(&self.cargo_path);
        cmd.arg("build")
            .arg("--quiet")
            .arg("--manifest-path")
            .arg(project.manifest_path())
            .env("CARGO_TARGET_DIR", &target_dir)
            .current_dir(project.dir());

        let start = Instant::now();
        let output = run_command(&mut cmd, ChildInput::Null, &ChildLimits::default(), cancel)?;

        if !output.status.success() {
            tracing::debug!("cargo build failed for {}", project.package_name());
            return Err(Error::Compilation {
                diagnostics: vec![Diagnostic::raw(output.stderr)],
            });
        }
        let compile_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("Built {} in {}ms", project.package_name(), compile_time_ms);

        Ok(CompiledArtifact::Built(BuiltProject {
            project,
            target_dir,
            compile_time_ms,
        }))
    }
}
