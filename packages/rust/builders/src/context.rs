//! Per-package build context shared by every builder job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Mapping;
use tracing::info;

use pkgdoc_shared::{BuildType, Package, PkgDocError, Result, ToolCommands};
use pkgdoc_xref::CrossReferenceStore;

use crate::observer::BuildObserver;
use crate::options::{OptionShape, OptionSpec, OptionValues};
use crate::runner::{CommandRunner, ToolExit, ToolInvocation};

/// Keys accepted in the configuration's `settings` mapping.
pub const SETTINGS_SPEC: &[OptionSpec] = &[
    OptionSpec::new("always_run_doxygen", OptionShape::Bool),
    OptionSpec::new("always_run_sphinx_apidoc", OptionShape::Bool),
    OptionSpec::new("never_run_sphinx_apidoc", OptionShape::Bool),
    OptionSpec::new("python_source", OptionShape::OptionalString),
    OptionSpec::new("override_build_type", OptionShape::OptionalString),
];

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tool-wide toggles from the `settings` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    /// Run the API extractor whatever the build type.
    pub always_run_doxygen: bool,
    /// Run Python module indexing whatever the build type.
    pub always_run_sphinx_apidoc: bool,
    /// Never run Python module indexing. Wins over `always_run_sphinx_apidoc`.
    pub never_run_sphinx_apidoc: bool,
    /// Python source directory relative to the package, replacing detection.
    pub python_source: Option<String>,
    /// Build type replacing the one derived from the manifest.
    pub override_build_type: Option<BuildType>,
}

impl ToolSettings {
    /// Validate and read the `settings` mapping.
    pub fn from_mapping(settings: &Mapping) -> Result<Self> {
        let values = OptionValues::validate("settings", SETTINGS_SPEC, settings)?;

        let override_build_type = match values.string("override_build_type") {
            Some(raw) => Some(BuildType::parse(&raw).ok_or_else(|| {
                PkgDocError::InvalidOption {
                    kind: "settings".into(),
                    key: "override_build_type".into(),
                    expected: "one of compiled, scripted, mixed, meta or a manifest build type"
                        .into(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            always_run_doxygen: values.bool("always_run_doxygen").unwrap_or(false),
            always_run_sphinx_apidoc: values.bool("always_run_sphinx_apidoc").unwrap_or(false),
            never_run_sphinx_apidoc: values.bool("never_run_sphinx_apidoc").unwrap_or(false),
            python_source: values.string("python_source"),
            override_build_type,
        })
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Collaborators a build talks to.
#[derive(Clone)]
pub struct BuildServices {
    pub xref: Arc<dyn CrossReferenceStore>,
    pub runner: Arc<dyn CommandRunner>,
    pub observer: Arc<dyn BuildObserver>,
}

// ---------------------------------------------------------------------------
// BuildContext
// ---------------------------------------------------------------------------

/// Everything a builder may consult. Created once per package build and
/// read-only afterwards.
pub struct BuildContext {
    pub package: Package,
    /// Configuration file the builders came from. May not exist when the
    /// generated default configuration is in use.
    pub configuration_file_path: PathBuf,
    /// Build type after applying `override_build_type`.
    pub build_type: BuildType,
    pub settings: ToolSettings,
    /// Base URL sibling packages are hosted under, without a trailing slash.
    pub base_url: String,
    pub tools: ToolCommands,
    pub services: BuildServices,
}

impl BuildContext {
    pub fn new(
        package: Package,
        configuration_file_path: PathBuf,
        settings: ToolSettings,
        base_url: impl Into<String>,
        tools: ToolCommands,
        services: BuildServices,
    ) -> Self {
        let build_type = settings
            .override_build_type
            .unwrap_or_else(|| package.build_type());
        Self {
            package,
            configuration_file_path,
            build_type,
            settings,
            base_url: base_url.into(),
            tools,
            services,
        }
    }

    /// Directory containing the package manifest.
    pub fn package_directory(&self) -> &Path {
        self.package.directory()
    }

    /// Directory user-supplied relative paths resolve against: the configuration
    /// file's directory, or the package directory when the file does not exist.
    pub fn configuration_directory(&self) -> PathBuf {
        if self.configuration_file_path.is_file() {
            if let Some(parent) = self.configuration_file_path.parent() {
                return parent.to_path_buf();
            }
        }
        self.package_directory().to_path_buf()
    }

    pub fn xref(&self) -> &dyn CrossReferenceStore {
        self.services.xref.as_ref()
    }

    pub fn observer(&self) -> &dyn BuildObserver {
        self.services.observer.as_ref()
    }

    /// Run an external tool, reporting it to the observer.
    pub fn run_tool(&self, invocation: &ToolInvocation) -> Result<ToolExit> {
        info!(
            command = %invocation.command_line(),
            cwd = %invocation.cwd.display(),
            "running tool"
        );
        self.observer().tool_started(invocation);
        let exit = self.services.runner.run(invocation)?;
        self.observer().tool_finished(invocation, exit);
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn settings_defaults() {
        let settings = ToolSettings::from_mapping(&Mapping::new()).unwrap();
        assert_eq!(settings, ToolSettings::default());
    }

    #[test]
    fn settings_are_read() {
        let settings = ToolSettings::from_mapping(&mapping(
            "{always_run_doxygen: true, python_source: lib, override_build_type: ament_python}",
        ))
        .unwrap();
        assert!(settings.always_run_doxygen);
        assert_eq!(settings.python_source.as_deref(), Some("lib"));
        assert_eq!(settings.override_build_type, Some(BuildType::Scripted));
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let err = ToolSettings::from_mapping(&mapping("{generate_everything: true}")).unwrap_err();
        assert!(err.to_string().contains("generate_everything"));
    }

    #[test]
    fn bad_override_is_rejected() {
        let err = ToolSettings::from_mapping(&mapping("{override_build_type: gradle}")).unwrap_err();
        assert!(matches!(err, PkgDocError::InvalidOption { .. }));
    }
}
