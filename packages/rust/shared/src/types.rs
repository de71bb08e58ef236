//! Core domain types for documented packages.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Manifest build type names that compile sources with public headers.
const COMPILED_BUILD_TYPES: &[&str] = &["ament_cmake", "cmake", "catkin"];

/// Manifest build type names that ship scripted sources only.
const SCRIPTED_BUILD_TYPES: &[&str] = &["ament_python"];

/// Buildtool dependency that marks a compiled package as also shipping Python.
const PYTHON_BUILDTOOL: &str = "ament_cmake_python";

// ---------------------------------------------------------------------------
// BuildType
// ---------------------------------------------------------------------------

/// How a package's sources are structured, which decides the tooling that applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    /// Compiled sources with headers.
    Compiled,
    /// Scripted sources only.
    Scripted,
    /// Compiled sources that also install a Python module.
    Mixed,
    /// No sources of its own.
    Meta,
}

impl BuildType {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compiled => "compiled",
            Self::Scripted => "scripted",
            Self::Mixed => "mixed",
            Self::Meta => "meta",
        }
    }

    /// Parse either a canonical name or a manifest build type name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "compiled" => Some(Self::Compiled),
            "scripted" => Some(Self::Scripted),
            "mixed" => Some(Self::Mixed),
            "meta" => Some(Self::Meta),
            other if COMPILED_BUILD_TYPES.contains(&other) => Some(Self::Compiled),
            other if SCRIPTED_BUILD_TYPES.contains(&other) => Some(Self::Scripted),
            _ => None,
        }
    }

    /// Whether API extraction from headers applies by default.
    pub fn has_compiled_sources(&self) -> bool {
        matches!(self, Self::Compiled | Self::Mixed)
    }

    /// Whether Python module indexing applies by default.
    pub fn has_python(&self) -> bool {
        matches!(self, Self::Scripted | Self::Mixed)
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dependencies and people
// ---------------------------------------------------------------------------

/// The manifest element a dependency was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Depend,
    Build,
    BuildExport,
    Buildtool,
    BuildtoolExport,
    Exec,
    Doc,
    Test,
}

impl DependencyKind {
    /// Map a manifest element name (`build_depend`, `run_depend`, ...) to a kind.
    pub fn from_element(element: &str) -> Option<Self> {
        match element {
            "depend" => Some(Self::Depend),
            "build_depend" => Some(Self::Build),
            "build_export_depend" => Some(Self::BuildExport),
            "buildtool_depend" => Some(Self::Buildtool),
            "buildtool_export_depend" => Some(Self::BuildtoolExport),
            "exec_depend" | "run_depend" => Some(Self::Exec),
            "doc_depend" => Some(Self::Doc),
            "test_depend" => Some(Self::Test),
            _ => None,
        }
    }
}

/// A single declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
}

/// An author or maintainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A link declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUrl {
    pub url: String,
    /// `website`, `repository`, `bugtracker`, ...
    #[serde(rename = "type")]
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// A package as described by its manifest. Immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub authors: Vec<Person>,
    #[serde(default)]
    pub maintainers: Vec<Person>,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub urls: Vec<PackageUrl>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Build type string from `<export><build_type>`.
    pub declared_build_type: String,
    /// Whether the manifest exports `<metapackage/>`.
    #[serde(default)]
    pub metapackage: bool,
    /// Configuration path from `<export><pkgdoc>`, relative to the package directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkgdoc_config: Option<PathBuf>,
    /// Absolute path to the manifest file.
    pub manifest_path: PathBuf,
}

impl Package {
    /// Directory containing the manifest.
    pub fn directory(&self) -> &Path {
        self.manifest_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Classify the package from its declared build type and exports.
    pub fn build_type(&self) -> BuildType {
        if self.metapackage {
            return BuildType::Meta;
        }
        match BuildType::parse(&self.declared_build_type) {
            Some(BuildType::Compiled) if self.has_dependency(PYTHON_BUILDTOOL) => BuildType::Mixed,
            Some(build_type) => build_type,
            None => BuildType::Meta,
        }
    }

    /// Whether any dependency of any kind has the given name.
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == name)
    }

    /// Names of every non-test dependency. This is the allow-list used for
    /// cross-reference lookups.
    pub fn doc_dependency_names(&self) -> BTreeSet<String> {
        self.dependencies
            .iter()
            .filter(|d| d.kind != DependencyKind::Test)
            .map(|d| d.name.clone())
            .collect()
    }

    /// Runtime and documentation dependencies, in declaration order, without repeats.
    pub fn exec_and_doc_dependency_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.dependencies
            .iter()
            .filter(|d| {
                matches!(
                    d.kind,
                    DependencyKind::Exec | DependencyKind::Depend | DependencyKind::Doc
                )
            })
            .filter(|d| seen.insert(d.name.clone()))
            .map(|d| d.name.clone())
            .collect()
    }

    /// `major.minor` part of the version.
    pub fn version_short(&self) -> String {
        self.version
            .split('.')
            .take(2)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Sorted, de-duplicated names of authors and maintainers.
    pub fn author_names(&self) -> Vec<String> {
        self.authors
            .iter()
            .chain(self.maintainers.iter())
            .map(|p| p.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
