//! Per-package configuration: locating, parsing and resolving `pkgdoc.yaml`.
//!
//! The file is two YAML documents:
//!
//! ```yaml
//! type: 'pkgdoc config'
//! version: 1
//! ---
//! settings: {always_run_doxygen: false}
//! builders:
//!   - doxygen: {name: 'API', output_dir: 'generated/doxygen'}
//!   - sphinx: {}
//! ```
//!
//! Parsing checks structure only. Resolution validates settings and builder
//! options and instantiates the builders; neither step writes files or runs
//! processes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use pkgdoc_builders::{BuildContext, BuildServices, Builder, ToolSettings, create_builder};
use pkgdoc_shared::{Package, PkgDocError, Result, ToolCommands};

use crate::defaults::default_config_text;

/// Required value of `type` in the first document.
pub const CONFIG_TYPE_TAG: &str = "pkgdoc config";

/// Only supported value of `version` in the first document.
pub const CONFIG_VERSION: u64 = 1;

/// Conventional configuration file name in the package root.
pub const CONFIG_FILE_NAME: &str = "pkgdoc.yaml";

// ---------------------------------------------------------------------------
// Parsed form
// ---------------------------------------------------------------------------

/// One entry of the `builders` list.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderEntry {
    pub kind: String,
    pub options: Mapping,
}

/// A structurally valid configuration, not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    /// File the text came from; relative paths in options resolve against it.
    pub path: PathBuf,
    pub settings: Mapping,
    pub builders: Vec<BuilderEntry>,
}

/// Parse configuration `text` read from `path`.
pub fn parse_config(text: &str, path: &Path) -> Result<ConfigDocument> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)
            .map_err(|e| PkgDocError::config_format(path, format!("invalid YAML: {e}")))?;
        documents.push(value);
    }
    if documents.len() != 2 {
        return Err(PkgDocError::config_format(
            path,
            format!(
                "expected two YAML documents separated by '---', found {}",
                documents.len()
            ),
        ));
    }

    let header = documents[0].as_mapping();
    let type_tag = header.and_then(|h| h.get("type")).and_then(Value::as_str);
    if type_tag != Some(CONFIG_TYPE_TAG) {
        return Err(PkgDocError::config_format(
            path,
            format!("expected the first document to have \"type: '{CONFIG_TYPE_TAG}'\""),
        ));
    }
    let version = header.and_then(|h| h.get("version")).and_then(Value::as_u64);
    if version != Some(CONFIG_VERSION) {
        return Err(PkgDocError::config_format(
            path,
            format!("expected the first document to have 'version: {CONFIG_VERSION}', the only supported version"),
        ));
    }

    let Some(body) = documents[1].as_mapping() else {
        return Err(PkgDocError::config_format(
            path,
            "expected the second document to be a mapping like {settings: ..., builders: [...]}",
        ));
    };

    let settings = match body.get("settings") {
        None | Some(Value::Null) => {
            return Err(PkgDocError::config_format(
                path,
                "missing 'settings' key, expected a mapping (use {} for none)",
            ));
        }
        Some(Value::Mapping(settings)) => settings.clone(),
        Some(_) => {
            return Err(PkgDocError::config_format(path, "'settings' must be a mapping"));
        }
    };

    let builders = match body.get("builders") {
        None | Some(Value::Null) => {
            return Err(PkgDocError::config_format(
                path,
                "missing 'builders' key, expected a list (use [] for none)",
            ));
        }
        Some(Value::Sequence(entries)) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_builder_entry(path, index, entry))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(PkgDocError::config_format(
                path,
                "'builders' must be a list of single-key mappings",
            ));
        }
    };

    Ok(ConfigDocument {
        path: path.to_path_buf(),
        settings,
        builders,
    })
}

fn parse_builder_entry(path: &Path, index: usize, entry: &Value) -> Result<BuilderEntry> {
    let single = entry
        .as_mapping()
        .filter(|m| m.len() == 1)
        .and_then(|m| m.iter().next());
    let Some((Value::String(kind), options)) = single else {
        return Err(PkgDocError::config_format(
            path,
            format!("builder entry {index} must be a mapping with a single key naming the builder kind"),
        ));
    };
    let options = match options {
        Value::Null => Mapping::new(),
        Value::Mapping(options) => options.clone(),
        _ => {
            return Err(PkgDocError::config_format(
                path,
                format!("options of builder entry {index} ('{kind}') must be a mapping"),
            ));
        }
    };
    Ok(BuilderEntry {
        kind: kind.clone(),
        options,
    })
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Inputs to resolution that do not come from the configuration file.
pub struct ContextSeed {
    pub package: Package,
    pub base_url: String,
    pub tools: ToolCommands,
    pub services: BuildServices,
}

/// Shared context plus the ordered builder jobs.
pub struct ResolvedConfig {
    pub context: Arc<BuildContext>,
    pub builders: Vec<Box<dyn Builder>>,
}

/// Validate settings, create the build context and instantiate every builder
/// in declaration order.
pub fn resolve_config(document: &ConfigDocument, seed: ContextSeed) -> Result<ResolvedConfig> {
    // Settings first: builder defaults depend on them.
    let settings = ToolSettings::from_mapping(&document.settings)?;
    let context = Arc::new(BuildContext::new(
        seed.package,
        document.path.clone(),
        settings,
        seed.base_url,
        seed.tools,
        seed.services,
    ));
    debug!(build_type = %context.build_type, "resolved build type");

    let builders = document
        .builders
        .iter()
        .map(|entry| create_builder(&entry.kind, &entry.options, context.clone()))
        .collect::<Result<Vec<_>>>()?;

    info!(
        count = builders.len(),
        config = %document.path.display(),
        "resolved builders"
    );
    Ok(ResolvedConfig { context, builders })
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Where the configuration text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by `<export><pkgdoc>` in the manifest.
    Manifest,
    /// `pkgdoc.yaml` in the package root.
    Conventional,
    /// Generated; the file does not exist.
    Default,
}

#[derive(Debug, Clone)]
pub struct LocatedConfig {
    pub path: PathBuf,
    pub text: String,
    pub source: ConfigSource,
}

/// Find the configuration for `package`.
pub fn locate_config(package: &Package) -> Result<LocatedConfig> {
    let directory = package.directory();

    if let Some(relative) = &package.pkgdoc_config {
        let path = directory.join(relative);
        if !path.is_file() {
            return Err(PkgDocError::missing_input(format!(
                "configuration file '{}' named in '{}' does not exist",
                relative.display(),
                package.manifest_path.display()
            )));
        }
        info!(config = %path.display(), "using configuration named in the manifest");
        return read_config(path, ConfigSource::Manifest);
    }

    let conventional = directory.join(CONFIG_FILE_NAME);
    if conventional.is_file() {
        info!(config = %conventional.display(), "using configuration found in the package");
        return read_config(conventional, ConfigSource::Conventional);
    }

    info!("no configuration found, using the default configuration");
    Ok(LocatedConfig {
        path: conventional,
        text: default_config_text(package),
        source: ConfigSource::Default,
    })
}

fn read_config(path: PathBuf, source: ConfigSource) -> Result<LocatedConfig> {
    let text = std::fs::read_to_string(&path).map_err(|e| PkgDocError::io(&path, e))?;
    Ok(LocatedConfig { path, text, source })
}
