//! External dependency resolution for generated programs.
//!
//! Scans `use` and `extern crate` declarations and maps the crate root of
//! each one through a table of known crates. This is a convenience mapping,
//! not a package manager: roots missing from the table (`std`, `crate`,
//! local modules, unknown crates) are skipped without error.
//!
//! ```text
//! use serde_json::Value;        ──► serde_json = "1"
//! use std::collections::HashMap; ──► (ignored)
//! extern crate regex;           ──► regex = "1"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// Registry group used for crates.io coordinates.
pub const CRATES_IO: &str = "crates.io";

/// One match per declaration line; capture 1 is the crate root.
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:pub(?:\([^)]*\))?[ \t]+)?use[ \t]+(?:::)?|extern[ \t]+crate[ \t]+)([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("declaration pattern is valid")
});

/// Where a dependency is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinateSource {
    /// Regular registry download.
    Registry,
    /// Unusual resolution scope: a crate on the local filesystem.
    LocalPath(PathBuf),
}

/// Build coordinates of one external crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResolvedDependency {
    /// Registry group (e.g. `crates.io`).
    pub group: String,
    /// Package name as published.
    pub artifact: String,
    /// Version requirement.
    pub version: String,
    /// Features to enable.
    pub features: Vec<String>,
    /// Resolution scope.
    pub source: CoordinateSource,
}

impl ResolvedDependency {
    /// A crates.io dependency.
    pub fn registry(artifact: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: CRATES_IO.to_string(),
            artifact: artifact.into(),
            version: version.into(),
            features: Vec::new(),
            source: CoordinateSource::Registry,
        }
    }

    /// A dependency resolved from a local path.
    pub fn local(artifact: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            group: "local".to_string(),
            artifact: artifact.into(),
            version: "*".to_string(),
            features: Vec::new(),
            source: CoordinateSource::LocalPath(path.into()),
        }
    }

    /// Add features to this dependency.
    pub fn with_features(mut self, features: &[&str]) -> Self {
        self.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Whether the coordinates need a non-registry resolution scope.
    pub fn is_flagged(&self) -> bool {
        !matches!(self.source, CoordinateSource::Registry)
    }
}

/// Deduplicated set of dependencies a program appears to need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyManifest {
    dependencies: BTreeSet<ResolvedDependency>,
}

impl DependencyManifest {
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter()
    }

    /// Whether a crate with this artifact name is present.
    pub fn contains(&self, artifact: &str) -> bool {
        self.dependencies.iter().any(|d| d.artifact == artifact)
    }

    fn insert(&mut self, dependency: ResolvedDependency) {
        self.dependencies.insert(dependency);
    }
}

/// Table from crate root namespace to build coordinates.
#[derive(Debug, Clone, Default)]
pub struct DependencyTable {
    entries: BTreeMap<String, ResolvedDependency>,
}

impl DependencyTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table of commonly generated crates.
    pub fn builtin() -> Self {
        let entries = [
            ("serde", ResolvedDependency::registry("serde", "1").with_features(&["derive"])),
            ("serde_json", ResolvedDependency::registry("serde_json", "1")),
            ("regex", ResolvedDependency::registry("regex", "1")),
            ("chrono", ResolvedDependency::registry("chrono", "0.4")),
            ("rand", ResolvedDependency::registry("rand", "0.8")),
            ("itertools", ResolvedDependency::registry("itertools", "0.13")),
            ("csv", ResolvedDependency::registry("csv", "1")),
            ("anyhow", ResolvedDependency::registry("anyhow", "1")),
            ("thiserror", ResolvedDependency::registry("thiserror", "2")),
        ];

        Self {
            entries: entries
                .into_iter()
                .map(|(ns, dep)| (ns.to_string(), dep))
                .collect(),
        }
    }

    /// Add or replace an entry.
    ///
    /// # Errors
    /// Returns `Error::DependencyResolution` if the namespace is not a valid
    /// identifier or the coordinates are incomplete.
    pub fn insert(&mut self, namespace: &str, dependency: ResolvedDependency) -> Result<()> {
        if !is_identifier(namespace) {
            return Err(Error::DependencyResolution(format!(
                "'{}' is not a valid crate namespace",
                namespace
            )));
        }
        if dependency.artifact.trim().is_empty() {
            return Err(Error::DependencyResolution(format!(
                "dependency for '{}' has no artifact name",
                namespace
            )));
        }
        if !is_version_requirement(&dependency.version) {
            return Err(Error::DependencyResolution(format!(
                "dependency '{}' has invalid version '{}'",
                dependency.artifact, dependency.version
            )));
        }

        self.entries.insert(namespace.to_string(), dependency);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, namespace: &str, dependency: ResolvedDependency) -> Result<Self> {
        self.insert(namespace, dependency)?;
        Ok(self)
    }

    pub fn get(&self, namespace: &str) -> Option<&ResolvedDependency> {
        self.entries.get(namespace)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps program source to a dependency manifest.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    table: Arc<DependencyTable>,
}

impl DependencyResolver {
    /// Create a resolver over the built-in table.
    pub fn new() -> Self {
        Self::with_table(DependencyTable::builtin())
    }

    /// Create a resolver over a custom table.
    pub fn with_table(table: DependencyTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &DependencyTable {
        &self.table
    }

    /// Resolve the dependencies declared in `source`.
    ///
    /// Pure: no I/O, and the same source always yields the same manifest.
    pub fn resolve(&self, source: &str) -> DependencyManifest {
        let mut manifest = DependencyManifest::default();

        for root in declared_roots(source) {
            if let Some(dependency) = self.table.get(root) {
                manifest.insert(dependency.clone());
            }
        }

        manifest
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Crate roots named by `use` / `extern crate` declarations, in order.
pub fn declared_roots(source: &str) -> Vec<&str> {
    DECLARATION
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_version_requirement(s: &str) -> bool {
    !s.trim().is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".^~=<>*,-+ ".contains(c))
}
