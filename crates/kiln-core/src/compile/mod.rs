//! Compilation pipeline for submitted programs.
//!
//! This module provides:
//! - Dependency resolution (crate roots → build coordinates)
//! - Project staging (task-scoped cargo projects)
//! - Two compiler strategies behind [`CodeCompiler`]
//! - Error mapping (rustc diagnostics → source lines)
//! - Toolchain discovery
//!
//! # Architecture
//!
//! ```text
//! source
//!   │
//!   ├── DependencyResolver ──► DependencyManifest
//!   │
//!   ├── in-process:      DylibCompiler ──► rustc (stdin) ──► lib*.so ──► libloading
//!   │
//!   └── out-of-process:  ProjectStager ──► Cargo.toml + src/main.rs
//!                              │
//!                              └── CargoCompiler ──► cargo build
//! ```

mod cargo;
mod cargo_generator;
mod dependency_resolver;
mod dylib;
mod entry;
mod errors;
mod stager;
mod toolchain;
mod types;

pub use cargo::CargoCompiler;
pub use cargo_generator::{ManifestConfig, generate_cargo_toml};
pub use dependency_resolver::{
    CRATES_IO, CoordinateSource, DependencyManifest, DependencyResolver, DependencyTable,
    ResolvedDependency, declared_roots,
};
pub use dylib::DylibCompiler;
pub use entry::{entry_symbol, validate_entry_point};
pub use errors::{Diagnostic, DiagnosticLevel, DiagnosticParser, render_all};
pub use stager::{ProjectStager, StagedProject};
pub use toolchain::ToolchainManager;
pub use types::{
    BuiltProject, CodeCompiler, CompilationUnit, CompiledArtifact, LoadedArtifact,
    dylib_extension, dylib_prefix,
};
