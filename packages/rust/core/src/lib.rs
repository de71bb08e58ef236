//! Documentation build orchestration for pkgdoc.
//!
//! This crate ties the manifest reader, the per-package configuration and the
//! builder jobs together into end-to-end workflows:
//! - [`build_package`] builds one package into `<output>/<package>`
//! - [`scan_packages`] builds every package below a directory in child processes

pub mod config;
pub mod defaults;
pub mod pipeline;
pub mod scan;
pub mod stager;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    BuilderEntry, CONFIG_FILE_NAME, ConfigDocument, ConfigSource, ContextSeed, LocatedConfig,
    ResolvedConfig, locate_config, parse_config, resolve_config,
};
pub use defaults::default_config_text;
pub use pipeline::{BuildReport, build_package};
pub use scan::{
    PackageOutcome, ScanOptions, ScanProgress, ScanReport, ScanStatus, SilentScanProgress,
    scan_packages,
};
pub use stager::{OutputStager, StagedJob};
