//! Doc-site builder driving Sphinx.
//!
//! The package's own documentation is never built in place. Everything Sphinx
//! reads is assembled in `<scratch>/wrapped_sphinx_directory`: generated
//! pages for interfaces, standard documents, links and dependencies, the
//! user's documentation, the user's (or a default) `__conf.py` and a wrapping
//! `conf.py` that extends it.

mod conf;
mod documents;
mod index;
mod interfaces;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Mapping;
use tracing::{debug, info, instrument, warn};

use pkgdoc_shared::util::{
    absolute, copy_dir_all, ensure_dir, remove_dir_if_exists, to_slash,
};
use pkgdoc_shared::{PkgDocError, Result};
use pkgdoc_xref::{ArtifactKind, INVENTORY_FILE_NAME, LocationRecord, write_sidecar};

use crate::builder::{Builder, BuilderKind};
use crate::context::BuildContext;
use crate::options::{OptionShape, OptionSpec, OptionValues};
use crate::runner::ToolInvocation;

pub use conf::{ALLOWED_EXTENSIONS, ProjectInfo, PyConfWriter, PyValue, WrappingConf};
pub use documents::{DocumentFormat, STANDARD_DOCUMENTS, StandardDocument};
pub use index::IndexContents;
pub use interfaces::InterfaceCounts;

/// Options accepted by the sphinx builder.
pub const SPHINX_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("name", OptionShape::String),
    OptionSpec::new("output_dir", OptionShape::String),
    OptionSpec::new("sphinx_sourcedir", OptionShape::OptionalString),
    OptionSpec::new("user_doc_dir", OptionShape::OptionalString),
    OptionSpec::new("doxygen_xml_directory", OptionShape::String),
];

const DEFAULT_DOXYGEN_XML_DIRECTORY: &str = "generated/doxygen/xml";

/// Project directory Sphinx runs on, inside the scratch directory.
pub const WRAPPED_DIR: &str = "wrapped_sphinx_directory";

/// Sphinx output directory, inside the wrapped directory.
pub const SPHINX_OUTPUT_DIR: &str = "sphinx_output";

/// Searched in order when no user documentation directory is configured.
const STANDARD_USER_DOC_DIRS: &[&str] = &["doc/source", "doc"];

const USER_CONF_FILE_NAME: &str = "__conf.py";

/// Where user documentation comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UserDocDir {
    /// Look in the standard locations.
    Auto,
    /// Configured as `null`.
    Disabled,
    Explicit(PathBuf),
}

pub struct SphinxBuilder {
    context: Arc<BuildContext>,
    name: String,
    output_dir: String,
    /// Replaces the generated project wholesale when set.
    sphinx_sourcedir: Option<PathBuf>,
    user_doc_dir: UserDocDir,
    /// Relative to the output staging directory.
    doxygen_xml_directory: String,
}

impl SphinxBuilder {
    pub fn new(options: &Mapping, context: Arc<BuildContext>) -> Result<Self> {
        let values =
            OptionValues::validate(&format!("{} builder", BuilderKind::Sphinx), SPHINX_OPTIONS, options)?;

        let name = values
            .string("name")
            .unwrap_or_else(|| context.package.name.clone());
        let output_dir = values.relative_dir("output_dir")?.unwrap_or_default();
        let doxygen_xml_directory = values
            .string("doxygen_xml_directory")
            .unwrap_or_else(|| DEFAULT_DOXYGEN_XML_DIRECTORY.to_string());

        let sphinx_sourcedir = match values.string("sphinx_sourcedir") {
            Some(dir) => {
                let path = Self::existing_directory(&context, &dir, "Sphinx source directory")?;
                info!(sphinx_sourcedir = %path.display(), "using user specified Sphinx source directory");
                Some(path)
            }
            None => None,
        };

        let user_doc_dir = match values.string("user_doc_dir") {
            Some(dir) => UserDocDir::Explicit(Self::existing_directory(
                &context,
                &dir,
                "user documentation directory",
            )?),
            None if values.is_null("user_doc_dir") => UserDocDir::Disabled,
            None => UserDocDir::Auto,
        };

        Ok(Self {
            context,
            name,
            output_dir,
            sphinx_sourcedir,
            user_doc_dir,
            doxygen_xml_directory,
        })
    }

    fn existing_directory(context: &BuildContext, dir: &str, what: &str) -> Result<PathBuf> {
        let path = context.configuration_directory().join(dir);
        if !path.is_dir() {
            return Err(PkgDocError::missing_input(format!(
                "{what} '{dir}' does not exist relative to '{}', or is not a directory",
                context.configuration_file_path.display()
            )));
        }
        absolute(&path)
    }

    /// Python package directory, from the `python_source` setting or the
    /// usual `<pkg>/<name>` and `<pkg>/src/<name>` layouts.
    fn python_source_directory(&self) -> Result<Option<PathBuf>> {
        let package_directory = self.context.package_directory();
        if let Some(source) = &self.context.settings.python_source {
            let path = package_directory.join(source);
            if path.is_dir() {
                return absolute(&path).map(Some);
            }
            warn!(python_source = %source, "python_source is not a directory, ignoring it");
            self.context
                .observer()
                .warning(&format!("python_source '{source}' is not a directory"));
        }

        for search in [".", "src"] {
            let candidate = package_directory
                .join(search)
                .join(&self.context.package.name);
            if candidate.join("__init__.py").is_file() {
                return absolute(&candidate).map(Some);
            }
        }
        Ok(None)
    }

    fn locate_user_doc_dir(&self) -> Option<PathBuf> {
        match &self.user_doc_dir {
            UserDocDir::Disabled => None,
            UserDocDir::Explicit(path) => Some(path.clone()),
            UserDocDir::Auto => {
                let package_directory = self.context.package_directory();
                let found = STANDARD_USER_DOC_DIRS
                    .iter()
                    .map(|dir| package_directory.join(dir))
                    .find(|path| path.is_dir());
                if let Some(path) = &found {
                    info!(
                        user_doc_dir = %path.display(),
                        "no user_doc_dir configured, using documentation found in a standard location"
                    );
                }
                found
            }
        }
    }

    fn has_python(&self) -> bool {
        let settings = &self.context.settings;
        (self.context.build_type.has_python() || settings.always_run_sphinx_apidoc)
            && !settings.never_run_sphinx_apidoc
    }

    fn project_info(&self) -> ProjectInfo {
        let package = &self.context.package;
        ProjectInfo {
            name: package.name.clone(),
            licenses: package.licenses.clone(),
            authors: package.author_names(),
            release: package.version.clone(),
            version: package.version_short(),
        }
    }

    /// `(package, url, inventory)` for each documented dependency with an inventory.
    fn intersphinx_mapping(&self) -> Result<Vec<(String, String, String)>> {
        let package = &self.context.package;
        let inventories = self
            .context
            .xref()
            .query(ArtifactKind::Inventory, &package.doc_dependency_names())?;
        Ok(inventories
            .into_iter()
            .filter(|(name, _)| *name != package.name)
            .map(|(name, entry)| {
                let url = format!(
                    "{}/{}/{}",
                    self.context.base_url, name, entry.location.relative_root
                );
                (name, url, entry.artifact_path.display().to_string())
            })
            .collect())
    }

    fn run_sphinx_apidoc(&self, wrapped: &Path, python_source: Option<&Path>) -> Result<()> {
        let Some(source) = python_source.filter(|p| p.is_dir()) else {
            warn!(
                "could not locate the Python source directory for sphinx-apidoc; \
                 set python_source in the settings if the layout is not standard"
            );
            self.context
                .observer()
                .warning("no Python source directory found for sphinx-apidoc");
            return Ok(());
        };

        let invocation = ToolInvocation::new(&self.context.tools.sphinx_apidoc, wrapped)
            .arg("-o")
            .arg(wrapped)
            .arg("-e")
            .arg(source);
        let exit = self.context.run_tool(&invocation)?;
        if exit.success() {
            debug!(%exit, "sphinx-apidoc finished");
        } else {
            warn!(%exit, "sphinx-apidoc failed");
            self.context
                .observer()
                .warning(&format!("sphinx-apidoc exited with {exit}"));
        }
        Ok(())
    }
}

impl Builder for SphinxBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BuilderKind {
        BuilderKind::Sphinx
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    #[instrument(skip_all, fields(builder = %self.name))]
    fn build(
        &self,
        doc_build_folder: &Path,
        output_staging_directory: &Path,
    ) -> Result<Option<PathBuf>> {
        let context = &self.context;
        let package = &context.package;
        let package_directory = context.package_directory().to_path_buf();

        // Doxygen output from an earlier job, if any.
        let doxygen_xml = absolute(output_staging_directory)?.join(&self.doxygen_xml_directory);
        let has_cpp = doxygen_xml.is_dir();
        if !has_cpp {
            info!(path = %doxygen_xml.display(), "no doxygen XML found, apparently doxygen did not run");
            if context.settings.always_run_doxygen {
                return Err(PkgDocError::missing_input(format!(
                    "doxygen XML directory '{}' does not exist",
                    doxygen_xml.display()
                )));
            }
        }

        let python_source = self.python_source_directory()?;

        let wrapped = absolute(doc_build_folder)?.join(WRAPPED_DIR);
        remove_dir_if_exists(&wrapped)?;
        ensure_dir(&wrapped)?;
        let marker = wrapped.join("COLCON_IGNORE");
        std::fs::write(&marker, "").map_err(|e| PkgDocError::io(&marker, e))?;

        let interface_counts =
            interfaces::generate_interface_docs(&package_directory, &wrapped.join("interfaces"))?;
        debug!(?interface_counts, "generated interface pages");

        let standard_documents = documents::locate_standard_documents(&package_directory)?;
        documents::generate_standard_documents(&standard_documents, &wrapped)?;
        debug!(count = standard_documents.len(), "included standard documents");

        let mut doc_directories = Vec::new();
        let conf_directory = match &self.sphinx_sourcedir {
            Some(source) => {
                info!(sphinx_sourcedir = %source.display(), "copying the user's Sphinx project");
                copy_dir_all(source, &wrapped)?;
                Some(wrapped.clone())
            }
            None => match self.locate_user_doc_dir() {
                Some(source) => {
                    doc_directories = documents::include_user_docs(&source, &wrapped)?;
                    debug!(?doc_directories, "included user documentation");
                    Some(wrapped.join(documents::USER_DOCS_DIR))
                }
                None => None,
            },
        };

        documents::write_links(package, &wrapped)?;
        let has_dependencies =
            documents::write_package_dependencies(package, &context.base_url, &wrapped)?;

        let user_conf_py = match conf_directory.filter(|dir| dir.join("conf.py").is_file()) {
            Some(dir) => {
                let user_conf = dir.join(USER_CONF_FILE_NAME);
                let original = dir.join("conf.py");
                std::fs::rename(&original, &user_conf)
                    .map_err(|e| PkgDocError::io(&original, e))?;
                info!(conf = %original.display(), "using the user's conf.py");
                user_conf
            }
            None => {
                info!("no conf.py provided, using a default Sphinx configuration");
                let user_conf = wrapped.join(USER_CONF_FILE_NAME);
                std::fs::write(&user_conf, conf::default_conf_py(&self.project_info()))
                    .map_err(|e| PkgDocError::io(&user_conf, e))?;
                user_conf
            }
        };

        let has_python = self.has_python();
        let index = wrapped.join("index.rst");
        if !index.is_file() {
            let contents = IndexContents {
                has_cpp,
                has_python,
                has_documentation: !doc_directories.is_empty(),
                has_readme: standard_documents.iter().any(|d| d.key == "readme"),
                has_standard_docs: !standard_documents.is_empty(),
                has_dependencies,
                interfaces: interface_counts,
            };
            std::fs::write(&index, index::index_rst(package, &contents))
                .map_err(|e| PkgDocError::io(&index, e))?;
        }

        let wrapping = WrappingConf {
            project: self.project_info(),
            user_conf_py: user_conf_py.display().to_string(),
            python_src_directory: python_source.as_ref().map(|p| p.display().to_string()),
            exec_depends: package.exec_and_doc_dependency_names(),
            build_type: context.build_type.to_string(),
            always_run_doxygen: context.settings.always_run_doxygen,
            wrapped_sphinx_directory: wrapped.display().to_string(),
            breathe_project: has_cpp.then(|| {
                (
                    format!("{} Doxygen Project", package.name),
                    doxygen_xml.display().to_string(),
                )
            }),
            intersphinx: self.intersphinx_mapping()?,
        };
        let conf_py = wrapped.join("conf.py");
        std::fs::write(&conf_py, conf::wrapping_conf_py(&wrapping))
            .map_err(|e| PkgDocError::io(&conf_py, e))?;

        if has_python {
            self.run_sphinx_apidoc(&wrapped, python_source.as_deref())?;
        }

        let output = wrapped.join(SPHINX_OUTPUT_DIR);
        let invocation = ToolInvocation::new(&context.tools.sphinx_build, &wrapped)
            .arg(&wrapped)
            .arg(&output);
        let exit = context.run_tool(&invocation)?;
        if !exit.success() {
            return Err(PkgDocError::ToolFailed {
                tool: context.tools.sphinx_build.clone(),
                status: exit.to_string(),
            });
        }
        info!(%exit, "sphinx-build finished");

        let inventory = output.join(INVENTORY_FILE_NAME);
        if inventory.is_file() {
            let location = LocationRecord::new(to_slash(Path::new(&self.output_dir)));
            context
                .xref()
                .record(&package.name, ArtifactKind::Inventory, &inventory, &location)?;
            write_sidecar(&inventory, ArtifactKind::Inventory, &location)?;
        } else {
            warn!(path = %inventory.display(), "sphinx produced no inventory");
        }

        // Doctrees are large and not needed to browse the output.
        remove_dir_if_exists(&output.join(".doctrees"))?;

        Ok(Some(output))
    }
}
