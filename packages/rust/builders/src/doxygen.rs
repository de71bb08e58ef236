//! API-extractor builder driving Doxygen.
//!
//! Decision table, evaluated at construction:
//!
//! | condition                                                   | action                          |
//! |-------------------------------------------------------------|---------------------------------|
//! | build type not compiled/mixed and `always_run_doxygen` off   | skip                            |
//! | `doxyfile` option given                                     | use it; fatal if missing        |
//! | `Doxyfile` in the package root                              | use it                          |
//! | `include/` in the package root                              | synthesize a default Doxyfile   |
//! | otherwise                                                   | skip                            |
//!
//! Whatever the base Doxyfile says, the run always produces XML and a tag file,
//! and links against the tag files of already-documented dependencies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Mapping;
use tracing::{debug, info, instrument, warn};

use pkgdoc_shared::util::{absolute, ensure_dir, relative_path, to_slash};
use pkgdoc_shared::{PkgDocError, Result};
use pkgdoc_xref::{ArtifactKind, LocationRecord, write_sidecar};

use crate::builder::{Builder, BuilderKind};
use crate::context::BuildContext;
use crate::doxyfile::DoxyfileWriter;
use crate::options::{OptionShape, OptionSpec, OptionValues};
use crate::runner::ToolInvocation;

/// Options accepted by the doxygen builder.
pub const DOXYGEN_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("name", OptionShape::String),
    OptionSpec::new("output_dir", OptionShape::String),
    OptionSpec::new("doxyfile", OptionShape::OptionalString),
    OptionSpec::new("extra_doxyfile_statements", OptionShape::StringList),
];

const DEFAULT_OUTPUT_DIR: &str = "generated/doxygen";

/// Folder inside the scratch directory Doxygen writes into.
const OUTPUT_FOLDER: &str = "doxygen_output";

const DEFAULT_DOXYFILE_NAME: &str = "Doxyfile.pkgdoc_default";
const EXTENDED_DOXYFILE_NAME: &str = "Doxyfile.pkgdoc";

/// Where the base Doxyfile comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DoxyfileSource {
    /// Named by the `doxyfile` option.
    Explicit(PathBuf),
    /// `Doxyfile` found in the package root.
    Package(PathBuf),
    /// Generated from package metadata, scanning `include/`.
    Synthesized,
}

pub struct DoxygenBuilder {
    context: Arc<BuildContext>,
    name: String,
    output_dir: String,
    /// `None` when the job has nothing to do.
    source: Option<DoxyfileSource>,
    extra_statements: Vec<String>,
}

impl DoxygenBuilder {
    pub fn new(options: &Mapping, context: Arc<BuildContext>) -> Result<Self> {
        let values =
            OptionValues::validate(&format!("{} builder", BuilderKind::Doxygen), DOXYGEN_OPTIONS, options)?;
        let package = &context.package;

        let name = values
            .string("name")
            .unwrap_or_else(|| format!("{} Public C/C++ API", package.name));
        let output_dir = values
            .relative_dir("output_dir")?
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
        let extra_statements = values.string_list("extra_doxyfile_statements");

        let source = if !context.build_type.has_compiled_sources()
            && !context.settings.always_run_doxygen
        {
            debug!(
                build_type = %context.build_type,
                "build type has no compiled sources, doxygen will not run"
            );
            None
        } else {
            Self::locate_doxyfile(&values, &context)?
        };

        Ok(Self {
            context,
            name,
            output_dir,
            source,
            extra_statements,
        })
    }

    fn locate_doxyfile(
        values: &OptionValues,
        context: &BuildContext,
    ) -> Result<Option<DoxyfileSource>> {
        if let Some(doxyfile) = values.string("doxyfile") {
            let path = context.configuration_directory().join(&doxyfile);
            if !path.is_file() {
                return Err(PkgDocError::missing_input(format!(
                    "Doxyfile '{doxyfile}' does not exist relative to '{}'",
                    context.configuration_file_path.display()
                )));
            }
            info!(doxyfile = %path.display(), "using user specified Doxyfile");
            return Ok(Some(DoxyfileSource::Explicit(path)));
        }

        let package_directory = context.package_directory();
        let package_doxyfile = package_directory.join("Doxyfile");
        if package_doxyfile.is_file() {
            info!(doxyfile = %package_doxyfile.display(), "using Doxyfile found in the package");
            return Ok(Some(DoxyfileSource::Package(package_doxyfile)));
        }
        if package_directory.join("include").is_dir() {
            info!("no Doxyfile found, generating a default one for the include directory");
            return Ok(Some(DoxyfileSource::Synthesized));
        }

        info!(
            package = %context.package.name,
            "no Doxyfile and no include directory found, doxygen will not run"
        );
        Ok(None)
    }

    /// Doxyfile scanning `include/` with the package's metadata substituted.
    fn default_doxyfile(&self) -> String {
        let package = &self.context.package;
        let directory = package.directory().display().to_string();
        let mut writer = DoxyfileWriter::new();
        writer
            .comment(&format!("Generated by pkgdoc for {}.", package.name))
            .blank()
            .set("PROJECT_NAME", &package.name)
            .set("PROJECT_NUMBER", &package.version)
            .set_quoted("PROJECT_BRIEF", &package.description)
            .blank()
            .set("INPUT", &format!("{directory}/include"))
            .set("RECURSIVE", "YES")
            .blank()
            .set("GENERATE_LATEX", "NO")
            .blank()
            .set("MACRO_EXPANSION", "YES")
            .set("EXPAND_ONLY_PREDEF", "YES")
            .set("STRIP_FROM_PATH", &directory);
        writer.finish()
    }

    /// Doxyfile that includes `base` and forces XML and tag file output.
    fn extended_doxyfile(&self, base: &Path, working_directory: &Path, output: &Path) -> Result<String> {
        let package = &self.context.package;
        let tag_file = output.join(format!("{}.tag", package.name));

        let mut writer = DoxyfileWriter::new();
        writer
            .comment("Generated by pkgdoc.")
            .blank()
            .comment("Include the user defined, or default, Doxyfile.")
            .include(&relative_path(base, working_directory).display().to_string())
            .blank()
            .comment("Extra statements from the configuration.");
        for statement in &self.extra_statements {
            writer.statement(statement);
        }
        writer
            .blank()
            .comment("Output location, XML and tag file generation.")
            .set("OUTPUT_DIRECTORY", &output.display().to_string())
            .set("GENERATE_XML", "YES")
            .set("GENERATE_TAGFILE", &tag_file.display().to_string());

        let siblings = self
            .context
            .xref()
            .query(ArtifactKind::TagFile, &package.doc_dependency_names())?;
        for (sibling, entry) in siblings.iter().filter(|(name, _)| **name != package.name) {
            writer.append(
                "TAGFILES",
                &format!(
                    "{}={}/{}/{}",
                    entry.artifact_path.display(),
                    self.context.base_url,
                    sibling,
                    entry.location.relative_root
                ),
            );
        }
        debug!(count = siblings.len(), "linked sibling tag files");

        Ok(writer.finish())
    }
}

impl Builder for DoxygenBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BuilderKind {
        BuilderKind::Doxygen
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    #[instrument(skip_all, fields(builder = %self.name))]
    fn build(
        &self,
        doc_build_folder: &Path,
        _output_staging_directory: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(source) = &self.source else {
            info!("skipping doxygen, nothing to document");
            return Ok(None);
        };

        let package = &self.context.package;
        let doc_build_folder = absolute(doc_build_folder)?;
        let output = doc_build_folder.join(OUTPUT_FOLDER);
        ensure_dir(&output)?;

        let base = match source {
            DoxyfileSource::Explicit(path) | DoxyfileSource::Package(path) => path.clone(),
            DoxyfileSource::Synthesized => {
                let path = doc_build_folder.join(DEFAULT_DOXYFILE_NAME);
                std::fs::write(&path, self.default_doxyfile())
                    .map_err(|e| PkgDocError::io(&path, e))?;
                path
            }
        };
        // Run next to the base Doxyfile so its relative paths keep working.
        let working_directory = base
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| doc_build_folder.clone());

        let extended = doc_build_folder.join(EXTENDED_DOXYFILE_NAME);
        let content = self.extended_doxyfile(&base, &working_directory, &output)?;
        std::fs::write(&extended, content).map_err(|e| PkgDocError::io(&extended, e))?;

        let invocation = ToolInvocation::new(&self.context.tools.doxygen, &working_directory)
            .arg(relative_path(&extended, &working_directory));
        let exit = self.context.run_tool(&invocation)?;
        if exit.success() {
            info!(%exit, "doxygen finished");
        } else {
            warn!(%exit, "doxygen failed, collecting whatever it produced");
            self.context
                .observer()
                .warning(&format!("doxygen exited with {exit} for {}", package.name));
        }

        let tag_file = output.join(format!("{}.tag", package.name));
        if tag_file.is_file() {
            let location = LocationRecord::new(to_slash(&Path::new(&self.output_dir).join("html")));
            self.context
                .xref()
                .record(&package.name, ArtifactKind::TagFile, &tag_file, &location)?;
            write_sidecar(&tag_file, ArtifactKind::TagFile, &location)?;
        } else {
            warn!(tag_file = %tag_file.display(), "doxygen produced no tag file");
        }

        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, TestBed};
    use pkgdoc_xref::{CrossReferenceStore, sidecar_path};

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn scripted_package_is_skipped_without_writes() {
        let bed = TestBed::new("ament_python");
        std::fs::create_dir_all(bed.package_dir().join("include")).unwrap();
        let builder = DoxygenBuilder::new(&Mapping::new(), bed.context()).unwrap();

        let scratch = bed.root.join("build/doxygen");
        let result = builder.build(&scratch, &bed.root.join("staging")).unwrap();
        assert!(result.is_none());
        assert!(!scratch.exists());
        assert!(!bed.xref_root().exists());
        assert!(bed.runner.calls().is_empty());
    }

    #[test]
    fn always_run_doxygen_overrides_build_type() {
        let bed = TestBed::with_settings("ament_python", "{always_run_doxygen: true}");
        std::fs::create_dir_all(bed.package_dir().join("include")).unwrap();
        let builder = DoxygenBuilder::new(&Mapping::new(), bed.context()).unwrap();

        let result = builder
            .build(&bed.root.join("build/doxygen"), &bed.root.join("staging"))
            .unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn synthesized_doxyfile_and_tag_file() {
        let bed = TestBed::new("ament_cmake");
        std::fs::create_dir_all(bed.package_dir().join("include/demo_pkg")).unwrap();
        let builder = DoxygenBuilder::new(&Mapping::new(), bed.context()).unwrap();

        let scratch = bed.root.join("build/doxygen");
        let output = builder
            .build(&scratch, &bed.root.join("staging"))
            .unwrap()
            .expect("doxygen output");

        let default = std::fs::read_to_string(scratch.join(DEFAULT_DOXYFILE_NAME)).unwrap();
        assert!(default.contains("PROJECT_NAME           = demo_pkg"));
        assert!(default.contains("PROJECT_NUMBER         = 1.4.2"));
        assert!(default.contains(&format!("INPUT                  = {}/include", bed.package_dir().display())));

        assert_eq!(output, scratch.join(OUTPUT_FOLDER));
        assert!(output.join("demo_pkg.tag").is_file());
        assert!(sidecar_path(&output.join("demo_pkg.tag")).is_file());

        let extended = std::fs::read_to_string(scratch.join(EXTENDED_DOXYFILE_NAME)).unwrap();
        assert!(extended.contains(&format!("@INCLUDE = {DEFAULT_DOXYFILE_NAME}")));
        assert!(extended.contains("GENERATE_XML           = YES"));

        let recorded = bed
            .xref
            .query(ArtifactKind::TagFile, &["demo_pkg".to_string()].into())
            .unwrap();
        assert_eq!(
            recorded["demo_pkg"].location.relative_root,
            "generated/doxygen/html"
        );

        let calls = bed.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].cwd, scratch);
        assert_eq!(calls[0].path_arg(0), Some(Path::new(EXTENDED_DOXYFILE_NAME)));
    }

    #[test]
    fn sibling_tag_files_become_tagfiles_entries() {
        let bed = TestBed::new("ament_cmake");
        std::fs::create_dir_all(bed.package_dir().join("include")).unwrap();

        // rclcpp is a dependency, unrelated_pkg is not.
        let siblings = bed.root.join("siblings");
        std::fs::create_dir_all(&siblings).unwrap();
        for name in ["rclcpp", "unrelated_pkg"] {
            let tag = siblings.join(format!("{name}.tag"));
            std::fs::write(&tag, "<tagfile/>").unwrap();
            bed.xref
                .record(name, ArtifactKind::TagFile, &tag, &LocationRecord::new("generated/doxygen/html"))
                .unwrap();
        }

        let builder = DoxygenBuilder::new(
            &mapping("{extra_doxyfile_statements: ['EXTRACT_ALL = YES']}"),
            bed.context(),
        )
        .unwrap();
        let scratch = bed.root.join("build/doxygen");
        builder.build(&scratch, &bed.root.join("staging")).unwrap();

        let extended = std::fs::read_to_string(scratch.join(EXTENDED_DOXYFILE_NAME)).unwrap();
        let expected = format!(
            "TAGFILES += \"{}={}/rclcpp/generated/doxygen/html\"",
            bed.xref_root().join("rclcpp/rclcpp.tag").display(),
            crate::testing::BASE_URL
        );
        assert!(extended.contains(&expected), "{extended}");
        assert!(!extended.contains("unrelated_pkg"));
        assert!(extended.contains("\nEXTRACT_ALL = YES\n"));
        let extra = extended.find("EXTRACT_ALL").unwrap();
        let forced = extended.find("GENERATE_XML").unwrap();
        assert!(extra < forced);
    }

    #[test]
    fn explicit_doxyfile_runs_in_its_directory() {
        let bed = TestBed::new("ament_cmake");
        let docs = bed.package_dir().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("Doxyfile"), "INPUT = ../src\n").unwrap();

        let builder =
            DoxygenBuilder::new(&mapping("{doxyfile: docs/Doxyfile}"), bed.context()).unwrap();
        let scratch = bed.root.join("build/doxygen");
        builder.build(&scratch, &bed.root.join("staging")).unwrap();

        let calls = bed.runner.calls();
        assert_eq!(calls[0].cwd, docs);
        let extended = std::fs::read_to_string(scratch.join(EXTENDED_DOXYFILE_NAME)).unwrap();
        assert!(extended.contains("@INCLUDE = Doxyfile\n"));
        assert!(!scratch.join(DEFAULT_DOXYFILE_NAME).exists());
    }

    #[test]
    fn missing_explicit_doxyfile_is_fatal() {
        let bed = TestBed::new("ament_cmake");
        let err = DoxygenBuilder::new(&mapping("{doxyfile: nope/Doxyfile}"), bed.context())
            .err()
            .expect("missing doxyfile must fail");
        assert!(matches!(err, PkgDocError::MissingInput { .. }));
        assert!(err.to_string().contains("nope/Doxyfile"));
    }

    #[test]
    fn no_headers_means_no_output() {
        let bed = TestBed::new("ament_cmake");
        let builder = DoxygenBuilder::new(&Mapping::new(), bed.context()).unwrap();
        let result = builder
            .build(&bed.root.join("build/doxygen"), &bed.root.join("staging"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn failing_doxygen_is_not_fatal() {
        let bed = TestBed::with_runner("ament_cmake", "{}", FakeRunner::new().doxygen_exit(3));
        std::fs::create_dir_all(bed.package_dir().join("include")).unwrap();
        let builder = DoxygenBuilder::new(&Mapping::new(), bed.context()).unwrap();

        let result = builder
            .build(&bed.root.join("build/doxygen"), &bed.root.join("staging"))
            .unwrap();
        assert!(result.is_some());
        assert!(
            bed.observer
                .events()
                .iter()
                .any(|e| e.starts_with("warning: doxygen exited with return code 3"))
        );
    }

    #[test]
    fn unknown_option_is_rejected() {
        let bed = TestBed::new("ament_cmake");
        let err = DoxygenBuilder::new(&mapping("{doxyfile_path: Doxyfile}"), bed.context())
            .err()
            .expect("unknown key must fail");
        assert_eq!(
            err.to_string(),
            "unsupported key 'doxyfile_path' for doxygen builder"
        );
    }
}
