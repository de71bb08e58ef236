//! Application configuration for pkgdoc.
//!
//! User config lives at `~/.pkgdoc/pkgdoc.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PkgDocError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pkgdoc.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pkgdoc";

// ---------------------------------------------------------------------------
// Config structs (matching pkgdoc.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory and URL defaults for builds.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// External tool executables.
    #[serde(default)]
    pub tools: ToolCommands,

    /// Batch scan limits.
    #[serde(default)]
    pub scan: ScanConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Base URL the package docs will be hosted under, used for cross-package links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Scratch directory for per-package builds.
    #[serde(default = "default_doc_build_directory")]
    pub doc_build_directory: String,

    /// Directory receiving the final per-package documentation trees.
    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    /// Shared cross-reference index root.
    #[serde(default = "default_cross_reference_directory")]
    pub cross_reference_directory: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            doc_build_directory: default_doc_build_directory(),
            output_directory: default_output_directory(),
            cross_reference_directory: default_cross_reference_directory(),
        }
    }
}

fn default_base_url() -> String {
    "http://docs.ros.org/en/latest/p".into()
}
fn default_doc_build_directory() -> String {
    "docs_build".into()
}
fn default_output_directory() -> String {
    "docs_output".into()
}
fn default_cross_reference_directory() -> String {
    "cross_reference".into()
}

/// `[tools]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommands {
    #[serde(default = "default_doxygen")]
    pub doxygen: String,

    #[serde(default = "default_sphinx_build")]
    pub sphinx_build: String,

    #[serde(default = "default_sphinx_apidoc")]
    pub sphinx_apidoc: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            doxygen: default_doxygen(),
            sphinx_build: default_sphinx_build(),
            sphinx_apidoc: default_sphinx_apidoc(),
        }
    }
}

fn default_doxygen() -> String {
    "doxygen".into()
}
fn default_sphinx_build() -> String {
    "sphinx-build".into()
}
fn default_sphinx_apidoc() -> String {
    "sphinx-apidoc".into()
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum seconds allowed per package before the build is killed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of packages processed in one scan.
    #[serde(default = "default_max_packages")]
    pub max_packages: usize,

    /// Concurrent package builds. Defaults to the available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprocesses: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_packages: default_max_packages(),
            subprocesses: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    15 * 60
}
fn default_max_packages() -> usize {
    10_000
}

// ---------------------------------------------------------------------------
// Build options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime options for one package build, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Package directory (or its manifest).
    pub package_path: PathBuf,
    /// Build directory of the package; only checked for existence.
    pub build_directory: Option<PathBuf>,
    /// Deprecated install directory; only checked for existence.
    pub install_directory: Option<PathBuf>,
    /// Cross-reference index root.
    pub cross_reference_directory: PathBuf,
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Final output root; the package lands in `<output_directory>/<name>`.
    pub output_directory: PathBuf,
    /// Scratch root; the package builds in `<doc_build_directory>/<name>`.
    pub doc_build_directory: PathBuf,
    /// External tool executables.
    pub tools: ToolCommands,
}

impl BuildOptions {
    /// Options for `package_path` with every other value taken from `config`.
    pub fn new(package_path: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            package_path: package_path.into(),
            build_directory: None,
            install_directory: None,
            cross_reference_directory: PathBuf::from(&config.defaults.cross_reference_directory),
            base_url: config.defaults.base_url.trim_end_matches('/').to_string(),
            output_directory: PathBuf::from(&config.defaults.output_directory),
            doc_build_directory: PathBuf::from(&config.defaults.doc_build_directory),
            tools: config.tools.clone(),
        }
    }
}

/// Check that `base_url` parses as an absolute URL and strip any trailing slash.
pub fn validate_base_url(base_url: &str) -> Result<String> {
    Url::parse(base_url)
        .map_err(|e| PkgDocError::config(format!("invalid base url '{base_url}': {e}")))?;
    Ok(base_url.trim_end_matches('/').to_string())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pkgdoc/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| PkgDocError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pkgdoc/pkgdoc.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PkgDocError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PkgDocError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PkgDocError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PkgDocError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PkgDocError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
