//! Toolchain discovery for task compilation.
//!
//! Locates `rustc` and `cargo` and records the compiler version used to
//! pin staged projects.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Paths and version of the Rust toolchain used to build tasks.
#[derive(Debug, Clone)]
pub struct ToolchainManager {
    /// Path to rustc
    rustc_path: PathBuf,

    /// Path to cargo
    cargo_path: PathBuf,

    /// Full `rustc --version` output
    version: String,
}

impl ToolchainManager {
    /// Detect the toolchain from PATH.
    pub fn new() -> Result<Self> {
        let rustc_path = Self::find_tool("rustc")?;
        let cargo_path = Self::find_tool("cargo")?;
        let version = Self::get_rustc_version(&rustc_path)?;

        tracing::debug!("Using {} ({})", version, rustc_path.display());

        Ok(Self {
            rustc_path,
            cargo_path,
            version,
        })
    }

    /// Get the rustc path.
    pub fn rustc_path(&self) -> &Path {
        &self.rustc_path
    }

    /// Get the cargo path.
    pub fn cargo_path(&self) -> &Path {
        &self.cargo_path
    }

    /// Get the toolchain version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Version suitable for a manifest `rust-version` pin (e.g. `1.85.0`).
    pub fn rust_version_pin(&self) -> Option<String> {
        parse_semver(&self.version)
    }

    /// Find a tool in PATH.
    fn find_tool(name: &str) -> Result<PathBuf> {
        which::which(name).map_err(|_| Error::Toolchain(format!("{} not found in PATH", name)))
    }

    /// Get rustc version string.
    fn get_rustc_version(rustc: &Path) -> Result<String> {
        let output = Command::new(rustc)
            .arg("--version")
            .output()
            .map_err(|e| Error::Toolchain(format!("Failed to run rustc: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Toolchain("Failed to get rustc version".to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Extract `MAJOR.MINOR.PATCH` from `rustc 1.85.0-nightly (abc 2025-01-01)`.
fn parse_semver(version: &str) -> Option<String> {
    let raw = version.split_whitespace().nth(1)?;
    let core = raw.split('-').next()?;
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() == 3 && parts.iter().all(|p| p.parse::<u32>().is_ok()) {
        Some(core.to_string())
    } else {
        None
    }
}
