//! The default task executor: resolve → stage → compile → invoke.

use std::path::PathBuf;
use std::sync::Arc;

use crate::compile::{
    CargoCompiler, CodeCompiler, CompilationUnit, DependencyResolver, DylibCompiler,
    ProjectStager, ToolchainManager,
};
use crate::config::{ExecutorConfig, Strategy};
use crate::error::Result;
use crate::paths::TaskWorkspace;
use crate::task::{ExecutionOutcome, TaskId, TaskRequest};

use super::context::CancelToken;
use super::invoker::Invoker;

/// Runs one task from source to raw outcome.
///
/// This is the seam between the scheduler and the pipeline; tests plug in
/// their own implementations.
pub trait TaskExecutor: Send + Sync {
    fn execute(
        &self,
        task_id: TaskId,
        request: &TaskRequest,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome>;
}

/// Source-to-outcome pipeline for one strategy.
pub struct Pipeline {
    resolver: DependencyResolver,
    compiler: Arc<dyn CodeCompiler>,
    invoker: Invoker,
    work_root: PathBuf,
}

impl Pipeline {
    /// Build the pipeline selected by `config`, using the toolchain in PATH.
    ///
    /// # Errors
    /// Returns `Error::Toolchain` if rustc or cargo cannot be found.
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        let toolchain = ToolchainManager::new()?;

        let compiler: Arc<dyn CodeCompiler> = match config.strategy {
            Strategy::InProcess => Arc::new(DylibCompiler::new(toolchain.rustc_path())),
            Strategy::OutOfProcess => Arc::new(CargoCompiler::new(
                toolchain.cargo_path(),
                ProjectStager::new(toolchain.rust_version_pin()),
            )),
        };
        let invoker =
            Invoker::new(toolchain.cargo_path()).with_memory_limit(config.memory_limit_bytes());

        if config.strategy == Strategy::InProcess && config.limit_memory.is_some() {
            tracing::warn!("limitMemory only applies to the out-of-process strategy");
        }

        Ok(Self::from_parts(compiler, invoker, config.work_root()))
    }

    /// Assemble a pipeline from explicit parts.
    pub fn from_parts(
        compiler: Arc<dyn CodeCompiler>,
        invoker: Invoker,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver: DependencyResolver::new(),
            compiler,
            invoker,
            work_root: work_root.into(),
        }
    }

    /// Replace the dependency resolver (e.g. with a custom table).
    pub fn with_resolver(mut self, resolver: DependencyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Name of the compiler strategy in use.
    pub fn strategy_name(&self) -> &'static str {
        self.compiler.name()
    }
}

impl TaskExecutor for Pipeline {
    fn execute(
        &self,
        task_id: TaskId,
        request: &TaskRequest,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome> {
        let manifest = self.resolver.resolve(&request.source_code);
        tracing::debug!("Task {} resolved {} dependencies", task_id, manifest.len());

        let workspace = TaskWorkspace::create(&self.work_root, task_id)?;

        let unit = CompilationUnit {
            task_id,
            source: &request.source_code,
            entry_point: &request.entry_point,
            manifest: &manifest,
            input_rows: &request.input_rows,
            workspace: &workspace,
        };

        let artifact = self.compiler.compile(&unit, cancel)?;
        tracing::debug!(
            "Task {} compiled ({}) in {}ms",
            task_id,
            self.compiler.name(),
            artifact.compile_time_ms()
        );

        let outcome = self.invoker.invoke(&artifact, &request.entry_point, cancel);

        // Unload / remove the artifact before its workspace goes away
        drop(artifact);
        if let Err(e) = workspace.close() {
            tracing::debug!("Task {} workspace cleanup failed: {}", task_id, e);
        }

        outcome
    }
}
