//! Project staging for out-of-process builds.
//!
//! Materializes a self-contained cargo project inside the task workspace:
//!
//! ```text
//! project/
//! ├── Cargo.toml     # Generated manifest, [[bin]] named after the task
//! ├── input.json     # Auxiliary rows
//! └── src/main.rs    # Program source (+ `fn main` shim)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::TaskWorkspace;
use crate::task::InputRow;

use super::cargo_generator::{ManifestConfig, generate_cargo_toml};
use super::dependency_resolver::DependencyManifest;
use super::entry::{main_shim, validate_entry_point};

/// A cargo project staged for one task.
#[derive(Debug)]
pub struct StagedProject {
    dir: PathBuf,
    package_name: String,
    bin_name: String,
    input_path: PathBuf,
    flagged: Vec<String>,
    skipped: Vec<String>,
}

impl StagedProject {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("Cargo.toml")
    }

    pub fn main_path(&self) -> PathBuf {
        self.dir.join("src").join("main.rs")
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Name of the binary target.
    pub fn bin_name(&self) -> &str {
        &self.bin_name
    }

    /// Dependencies with an unusual resolution scope.
    pub fn flagged(&self) -> &[String] {
        &self.flagged
    }

    /// Flagged dependencies left out of the manifest.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

impl Drop for StagedProject {
    fn drop(&mut self) {
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                tracing::warn!("Failed to remove staged project {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Writes task-scoped cargo projects.
#[derive(Debug, Clone)]
pub struct ProjectStager {
    edition: String,
    rust_version: Option<String>,
}

impl ProjectStager {
    /// Create a stager pinning `rust_version` in generated manifests.
    pub fn new(rust_version: Option<String>) -> Self {
        Self {
            edition: "2021".to_string(),
            rust_version,
        }
    }

    /// Override the edition of generated projects.
    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = edition.into();
        self
    }

    /// Stage `source` as a binary crate under the workspace's project dir.
    ///
    /// # Errors
    /// Returns `Error::Staging` naming the path that could not be written,
    /// or `Error::Compilation` for an entry point that is not an identifier.
    pub fn stage(
        &self,
        source: &str,
        entry_point: &str,
        manifest: &DependencyManifest,
        input_rows: &[InputRow],
        workspace: &TaskWorkspace,
    ) -> Result<StagedProject> {
        validate_entry_point(entry_point)?;

        let short = workspace.task_id().short();
        let package_name = format!("kiln-task-{}", short);
        let bin_name = format!("task_{}", short);

        let dir = workspace.project_dir();
        let src_dir = dir.join("src");
        fs::create_dir_all(&src_dir).map_err(|e| Error::staging(&src_dir, e))?;

        let flagged: Vec<String> = manifest
            .iter()
            .filter(|dep| dep.is_flagged())
            .map(|dep| dep.artifact.clone())
            .collect();
        for name in &flagged {
            tracing::warn!("Task {} uses flagged dependency '{}'", workspace.task_id(), name);
        }

        let config = ManifestConfig {
            name: &package_name,
            edition: &self.edition,
            rust_version: self.rust_version.as_deref(),
            bin_name: Some(&bin_name),
            ..Default::default()
        };
        let (cargo_toml, skipped) = generate_cargo_toml(&config, manifest.iter());
        for name in &skipped {
            tracing::warn!("Skipping local dependency '{}': path does not exist", name);
        }

        let manifest_path = dir.join("Cargo.toml");
        fs::write(&manifest_path, cargo_toml).map_err(|e| Error::staging(&manifest_path, e))?;

        let main_path = src_dir.join("main.rs");
        fs::write(&main_path, main_source(source, entry_point))
            .map_err(|e| Error::staging(&main_path, e))?;

        let input_path = dir.join("input.json");
        let input = serde_json::to_string(input_rows)?;
        fs::write(&input_path, input).map_err(|e| Error::staging(&input_path, e))?;

        tracing::debug!(
            "Staged project {} with {} dependencies at {}",
            package_name,
            manifest.len(),
            dir.display()
        );

        Ok(StagedProject {
            dir,
            package_name,
            bin_name,
            input_path,
            flagged,
            skipped,
        })
    }
}

/// Source of `src/main.rs`: the program, plus a shim unless it is `main`.
fn main_source(source: &str, entry_point: &str) -> String {
    if entry_point == "main" {
        source.to_string()
    } else {
        let mut code = String::with_capacity(source.len() + 512);
        code.push_str(source);
        if !source.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&main_shim(entry_point));
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{DependencyResolver, ResolvedDependency};
    use crate::task::TaskId;
    use tempfile::TempDir;

    fn workspace(temp: &TempDir) -> TaskWorkspace {
        TaskWorkspace::create(temp.path(), TaskId::new()).unwrap()
    }

    #[test]
    fn test_stage_writes_project() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let source = "use serde_json::Value;\nfn main() { println!(\"hi\"); }\n";
        let manifest = DependencyResolver::new().resolve(source);
        let rows = vec![InputRow::from([("a".to_string(), "1".to_string())])];

        let project = ProjectStager::new(Some("1.85.0".to_string()))
            .stage(source, "main", &manifest, &rows, &ws)
            .unwrap();

        let toml = fs::read_to_string(project.manifest_path()).unwrap();
        assert!(toml.contains(&format!("name = \"{}\"", project.package_name())));
        assert!(toml.contains(&format!("name = \"{}\"", project.bin_name())));
        assert!(toml.contains("rust-version = \"1.85.0\""));
        assert!(toml.contains("serde_json = \"1\""));

        assert_eq!(fs::read_to_string(project.main_path()).unwrap(), source);
        assert_eq!(
            fs::read_to_string(project.input_path()).unwrap(),
            r#"[{"a":"1"}]"#
        );
        assert!(project.flagged().is_empty());
    }

    #[test]
    fn test_non_main_entry_gets_shim() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let source = "fn run() { println!(\"hi\"); }";

        let project = ProjectStager::new(None)
            .stage(source, "run", &DependencyManifest::default(), &[], &ws)
            .unwrap();

        let main = fs::read_to_string(project.main_path()).unwrap();
        assert!(main.starts_with(source));
        assert!(main.contains("fn main()"));
        assert!(main.contains("run()"));
    }

    #[test]
    fn test_flagged_dependencies_are_recorded() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let table = crate::compile::DependencyTable::empty()
            .with("helpers", ResolvedDependency::local("helpers", "/does/not/exist"))
            .unwrap();
        let source = "use helpers::x;\nfn main() {}\n";
        let manifest = DependencyResolver::with_table(table).resolve(source);

        let project = ProjectStager::new(None)
            .stage(source, "main", &manifest, &[], &ws)
            .unwrap();

        assert_eq!(project.flagged(), ["helpers".to_string()]);
        assert_eq!(project.skipped(), ["helpers".to_string()]);
        let toml = fs::read_to_string(project.manifest_path()).unwrap();
        assert!(!toml.contains("helpers ="));
    }

    #[test]
    fn test_invalid_entry_point() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let result = ProjectStager::new(None).stage(
            "fn main() {}",
            "main() {} fn x",
            &DependencyManifest::default(),
            &[],
            &ws,
        );
        assert!(matches!(result, Err(Error::Compilation { .. })));
    }

    #[test]
    fn test_drop_removes_project() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let dir = {
            let project = ProjectStager::new(None)
                .stage("fn main() {}", "main", &DependencyManifest::default(), &[], &ws)
                .unwrap();
            project.dir().to_path_buf()
        };
        assert!(!dir.exists());
        assert!(ws.root().exists());
    }
}
