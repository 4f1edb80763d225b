//! Executor configuration.
//!
//! Pool sizing, backpressure and the execution deadline. Keys use the
//! camelCase names operators already know (`coreThreadSize`, ...).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which compiler/loader variant runs tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Compile to a dynamic library and call it inside this process.
    InProcess,
    /// Stage a cargo project, build it and run it as a child process.
    #[default]
    OutOfProcess,
}

impl std::str::FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in-process" | "inProcess" => Ok(Self::InProcess),
            "out-of-process" | "outOfProcess" => Ok(Self::OutOfProcess),
            other => Err(Error::Config(format!("unknown strategy '{}'", other))),
        }
    }
}

/// Configuration for the task scheduler and its pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// Workers kept alive even when idle.
    pub core_thread_size: usize,
    /// Upper bound on concurrently running workers.
    pub max_thread_size: usize,
    /// Seconds an idle worker above the core size waits before retiring.
    pub keep_thread_alive_time: u64,
    /// Capacity of the admission queue.
    pub thread_queue_size: usize,
    /// Wall-clock deadline per task, measured from submission.
    pub code_timeout_seconds: u64,
    /// Address-space limit for child programs, in MiB. `None` is unlimited.
    pub limit_memory: Option<u64>,
    /// Execution variant.
    pub strategy: Strategy,
    /// Root for task workspaces. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_thread_size: 4,
            max_thread_size: 8,
            keep_thread_alive_time: 60,
            thread_queue_size: 16,
            code_timeout_seconds: 30,
            limit_memory: None,
            strategy: Strategy::default(),
            work_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Load a JSON configuration file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!("Loaded executor config from {}", path.display());
        Ok(config)
    }

    /// Check the pool and deadline settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_thread_size == 0 {
            return Err(Error::Config("maxThreadSize must be at least 1".to_string()));
        }
        if self.core_thread_size > self.max_thread_size {
            return Err(Error::Config(format!(
                "coreThreadSize ({}) exceeds maxThreadSize ({})",
                self.core_thread_size, self.max_thread_size
            )));
        }
        if self.thread_queue_size == 0 {
            return Err(Error::Config("threadQueueSize must be at least 1".to_string()));
        }
        if self.code_timeout_seconds == 0 {
            return Err(Error::Config("codeTimeoutSeconds must be positive".to_string()));
        }
        if self.limit_memory == Some(0) {
            return Err(Error::Config("limitMemory must be positive when set".to_string()));
        }
        Ok(())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_thread_alive_time)
    }

    pub fn code_timeout(&self) -> Duration {
        Duration::from_secs(self.code_timeout_seconds)
    }

    /// Memory limit in bytes, if any.
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.limit_memory.map(|mib| mib.saturating_mul(1024 * 1024))
    }

    /// Directory under which task workspaces are created.
    pub fn work_root(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("kiln"))
    }
}
