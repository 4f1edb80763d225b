//! Cargo manifest generation for staged projects.

use std::path::Path;

use super::dependency_resolver::{CoordinateSource, ResolvedDependency};

/// Configuration for generating a Cargo manifest.
#[derive(Debug, Clone)]
pub struct ManifestConfig<'a> {
    /// Package name.
    pub name: &'a str,
    /// Package version.
    pub version: &'a str,
    /// Rust edition.
    pub edition: &'a str,
    /// Minimum supported Rust version pin.
    pub rust_version: Option<&'a str>,
    /// Name of the binary target (the designated entry).
    pub bin_name: Option<&'a str>,
    /// Whether to add an empty [workspace] table.
    pub standalone_workspace: bool,
}

impl<'a> Default for ManifestConfig<'a> {
    fn default() -> Self {
        Self {
            name: "generated",
            version: "0.1.0",
            edition: "2021",
            rust_version: None,
            bin_name: None,
            standalone_workspace: true,
        }
    }
}

/// Generate a Cargo.toml manifest.
///
/// Registry dependencies are always written. Local-path dependencies are
/// written only when the path exists; the names of the skipped ones are
/// returned alongside the manifest.
pub fn generate_cargo_toml<'d>(
    config: &ManifestConfig<'_>,
    dependencies: impl IntoIterator<Item = &'d ResolvedDependency>,
) -> (String, Vec<String>) {
    let mut toml = String::new();
    let mut skipped = Vec::new();

    // Package section
    toml.push_str("[package]\n");
    toml.push_str(&format!("name = \"{}\"\n", config.name));
    toml.push_str(&format!("version = \"{}\"\n", config.version));
    toml.push_str(&format!("edition = \"{}\"\n", config.edition));
    if let Some(rust_version) = config.rust_version {
        toml.push_str(&format!("rust-version = \"{}\"\n", rust_version));
    }
    toml.push_str("publish = false\n");
    toml.push('\n');

    if let Some(bin) = config.bin_name {
        toml.push_str("[[bin]]\n");
        toml.push_str(&format!("name = \"{}\"\n", bin));
        toml.push_str("path = \"src/main.rs\"\n");
        toml.push('\n');
    }

    // Dependencies section
    toml.push_str("[dependencies]\n");
    for dep in dependencies {
        if !format_dependency(&mut toml, dep) {
            skipped.push(dep.artifact.clone());
        }
    }

    // Standalone workspace table (prevents being part of parent workspace)
    if config.standalone_workspace {
        toml.push('\n');
        toml.push_str("[workspace]\n");
    }

    (toml, skipped)
}

/// Format a single dependency entry. Returns false if it was not written.
fn format_dependency(toml: &mut String, dep: &ResolvedDependency) -> bool {
    match &dep.source {
        CoordinateSource::LocalPath(path) => {
            if !Path::new(path).exists() {
                return false;
            }
            toml.push_str(&format!(
                "{} = {{ path = \"{}\" }}  # flagged: local path\n",
                dep.artifact,
                path.display()
            ));
        }
        CoordinateSource::Registry => {
            if dep.features.is_empty() {
                toml.push_str(&format!("{} = \"{}\"\n", dep.artifact, dep.version));
            } else {
                let features: Vec<_> = dep.features.iter().map(|f| format!("\"{}\"", f)).collect();
                toml.push_str(&format!(
                    "{} = {{ version = \"{}\", features = [{}] }}\n",
                    dep.artifact,
                    dep.version,
                    features.join(", ")
                ));
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_deps() -> Vec<ResolvedDependency> {
        vec![
            ResolvedDependency::registry("serde", "1").with_features(&["derive"]),
            ResolvedDependency::registry("serde_json", "1"),
        ]
    }

    #[test]
    fn test_basic_manifest() {
        let config = ManifestConfig {
            name: "kiln-task-abc",
            rust_version: Some("1.85.0"),
            bin_name: Some("task_abc"),
            ..Default::default()
        };
        let deps = make_deps();
        let (toml, skipped) = generate_cargo_toml(&config, &deps);

        assert!(skipped.is_empty());
        assert!(toml.contains("name = \"kiln-task-abc\""));
        assert!(toml.contains("rust-version = \"1.85.0\""));
        assert!(toml.contains("[[bin]]\nname = \"task_abc\""));
        assert!(toml.contains("serde = { version = \"1\", features = [\"derive\"] }"));
        assert!(toml.contains("serde_json = \"1\""));
    }

    #[test]
    fn test_standalone_workspace() {
        let (toml, _) = generate_cargo_toml(&ManifestConfig::default(), &[]);
        assert!(toml.trim_end().ends_with("[workspace]"));

        let config = ManifestConfig {
            standalone_workspace: false,
            ..Default::default()
        };
        let (toml, _) = generate_cargo_toml(&config, &[]);
        assert!(!toml.contains("[workspace]"));
    }

    #[test]
    fn test_local_path_dependency() {
        let temp = tempfile::TempDir::new().unwrap();
        let deps = vec![
            ResolvedDependency::local("helpers", temp.path()),
            ResolvedDependency::local("missing", "/definitely/not/here"),
        ];

        let (toml, skipped) = generate_cargo_toml(&ManifestConfig::default(), &deps);

        assert!(toml.contains("helpers = { path ="));
        assert!(toml.contains("# flagged: local path"));
        assert!(!toml.contains("missing"));
        assert_eq!(skipped, vec!["missing".to_string()]);
    }
}
