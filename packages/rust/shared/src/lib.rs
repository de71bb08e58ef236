//! Shared types, error model, and configuration for pkgdoc.
//!
//! This crate is the foundation depended on by all other pkgdoc crates.
//! It provides:
//! - [`PkgDocError`], the unified error type
//! - Domain types ([`Package`], [`BuildType`], [`Dependency`])
//! - Configuration ([`AppConfig`], [`BuildOptions`], config loading)
//! - Path helpers ([`slugify`], [`relative_path`], tree copy and move)

pub mod config;
pub mod error;
pub mod types;
pub mod util;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildOptions, DefaultsConfig, ScanConfig, ToolCommands, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_base_url,
};
pub use error::{PkgDocError, Result};
pub use types::{BuildType, Dependency, DependencyKind, Package, PackageUrl, Person};
pub use util::{relative_path, slugify};
