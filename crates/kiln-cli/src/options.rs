//! Executor options shared by `run` and `batch`.

use clap::Args;
use kiln_core::{ExecutorConfig, Strategy};

#[derive(Args, Debug, Clone, Default)]
pub struct ExecOptions {
    /// Execution strategy: in-process or out-of-process
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// JSON executor configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// Wall-clock limit per program, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ExecOptions {
    /// Configuration file values, overridden by command-line flags.
    pub fn resolve(&self) -> anyhow::Result<ExecutorConfig> {
        let mut config = match &self.config {
            Some(path) => ExecutorConfig::from_file(path)?,
            None => ExecutorConfig::default(),
        };

        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(timeout) = self.timeout {
            config.code_timeout_seconds = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("kiln.json");
        std::fs::write(&path, r#"{"codeTimeoutSeconds": 9, "strategy": "inProcess"}"#).unwrap();

        let options = ExecOptions {
            strategy: Some(Strategy::OutOfProcess),
            config: Some(path.display().to_string()),
            timeout: None,
        };
        let config = options.resolve().unwrap();

        assert_eq!(config.strategy, Strategy::OutOfProcess);
        assert_eq!(config.code_timeout_seconds, 9);
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let options = ExecOptions {
            timeout: Some(0),
            ..Default::default()
        };
        assert!(options.resolve().is_err());
    }
}
