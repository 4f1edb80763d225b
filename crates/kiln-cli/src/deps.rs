//! Deps command implementation for Kiln CLI.

use anyhow::Context;
use kiln_core::{DependencyResolver, compile::CoordinateSource};

use crate::colors;

/// Print the dependency manifest inferred for a program.
pub fn execute(path: &str, json: bool) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let manifest = DependencyResolver::new().resolve(&source);

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    if manifest.is_empty() {
        println!("{}No external crates.{}", colors::DIM, colors::RESET);
        return Ok(());
    }

    for dependency in manifest.iter() {
        let features = if dependency.features.is_empty() {
            String::new()
        } else {
            format!(" [{}]", dependency.features.join(", "))
        };
        match &dependency.source {
            CoordinateSource::Registry => println!(
                "{}{}{} = \"{}\"{}",
                colors::BOLD,
                dependency.artifact,
                colors::RESET,
                dependency.version,
                features
            ),
            CoordinateSource::LocalPath(dir) => println!(
                "{}{}{} = {{ path = \"{}\" }}{} {}(local){}",
                colors::BOLD,
                dependency.artifact,
                colors::RESET,
                dir.display(),
                features,
                colors::YELLOW,
                colors::RESET
            ),
        }
    }

    Ok(())
}
