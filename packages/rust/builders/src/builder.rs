//! Builder trait and registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Mapping;

use pkgdoc_shared::{PkgDocError, Result};

use crate::context::BuildContext;
use crate::doxygen::DoxygenBuilder;
use crate::sphinx::SphinxBuilder;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Registered builder kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderKind {
    /// API extraction from compiled-language headers.
    Doxygen,
    /// Prose and API documentation site.
    Sphinx,
}

/// Every registered kind, in the order they are listed to users.
pub const SUPPORTED_BUILDERS: &[BuilderKind] = &[BuilderKind::Doxygen, BuilderKind::Sphinx];

impl BuilderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doxygen => "doxygen",
            Self::Sphinx => "sphinx",
        }
    }

    /// Resolve a configuration key. The role names `api-extractor` and
    /// `doc-site` are accepted as aliases.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "doxygen" | "api-extractor" => Some(Self::Doxygen),
            "sphinx" | "doc-site" => Some(Self::Sphinx),
            _ => None,
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A documentation job.
///
/// Constructed once from its configuration entry (which validates the
/// options), built once, then discarded.
pub trait Builder: Send + Sync {
    /// Display name; also decides the scratch directory name.
    fn name(&self) -> &str;

    fn kind(&self) -> BuilderKind;

    /// Directory, relative to the package's documentation root, this job's
    /// output is merged into.
    fn output_dir(&self) -> &str;

    /// Build into `doc_build_folder`, a scratch directory owned by this job.
    ///
    /// `output_staging_directory` holds the merged output of the jobs that ran
    /// before this one and must not be written. Returns the directory holding
    /// this job's output, or `None` when there is nothing to merge.
    fn build(&self, doc_build_folder: &Path, output_staging_directory: &Path)
    -> Result<Option<PathBuf>>;

    /// `name (kind)`, as used in messages.
    fn label(&self) -> String {
        format!("{} ({})", self.name(), self.kind())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Instantiate the builder registered under `kind` with its raw `options`.
pub fn create_builder(
    kind: &str,
    options: &Mapping,
    context: Arc<BuildContext>,
) -> Result<Box<dyn Builder>> {
    match BuilderKind::parse(kind) {
        Some(BuilderKind::Doxygen) => Ok(Box::new(DoxygenBuilder::new(options, context)?)),
        Some(BuilderKind::Sphinx) => Ok(Box::new(SphinxBuilder::new(options, context)?)),
        None => Err(PkgDocError::UnknownBuilder {
            kind: kind.to_string(),
            supported: SUPPORTED_BUILDERS
                .iter()
                .map(BuilderKind::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}
