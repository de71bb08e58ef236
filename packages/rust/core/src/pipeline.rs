//! End-to-end package build: manifest → config → builders → staging → output.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use pkgdoc_builders::{BuildObserver, BuildServices, CommandRunner};
use pkgdoc_manifest::read_package;
use pkgdoc_shared::util::{absolute, ensure_dir, millis, remove_dir_if_exists};
use pkgdoc_shared::{BuildOptions, PkgDocError, Result};
use pkgdoc_xref::{ArtifactKind, FsCrossReferenceIndex};

use crate::config::{ConfigSource, ContextSeed, locate_config, parse_config, resolve_config};
use crate::stager::{OutputStager, STAGING_DIR_NAME, StagedJob};

/// Result of [`build_package`].
#[derive(Debug)]
pub struct BuildReport {
    pub package: String,
    /// `<output>/<package>`, now holding the documentation.
    pub output_directory: PathBuf,
    pub config_source: ConfigSource,
    pub jobs: Vec<StagedJob>,
    /// Cross-reference entries this build published.
    pub cross_references: Vec<(String, ArtifactKind)>,
    pub elapsed: Duration,
}

/// Build the documentation of one package.
///
/// 1. Read the manifest and check the given directories
/// 2. Locate, parse and resolve the configuration
/// 3. Prepare the cross-reference, scratch and staging directories
/// 4. Run every builder in order, merging into the staging tree
/// 5. Replace `<output>/<package>` with the staging tree
///
/// Configuration errors surface before anything is written. When a later
/// step fails the destination is left as it was.
#[instrument(skip_all, fields(package_path = %options.package_path.display()))]
pub fn build_package(
    options: &BuildOptions,
    runner: Arc<dyn CommandRunner>,
    observer: Arc<dyn BuildObserver>,
) -> Result<BuildReport> {
    let start = Instant::now();

    // --- Phase 1: Inputs ---
    let package = read_package(&options.package_path)?;
    info!(package = %package.name, version = %package.version, "read package manifest");

    if let Some(build_directory) = &options.build_directory {
        if !build_directory.is_dir() {
            return Err(PkgDocError::missing_input(format!(
                "given build directory '{}' does not exist",
                build_directory.display()
            )));
        }
    }
    if let Some(install_directory) = &options.install_directory {
        if !install_directory.is_dir() {
            return Err(PkgDocError::missing_input(format!(
                "given install directory '{}' does not exist",
                install_directory.display()
            )));
        }
        warn!("the install directory option is deprecated and has no effect");
        observer.warning("the install directory option is deprecated and has no effect");
    }

    // --- Phase 2: Configuration ---
    let located = locate_config(&package)?;
    let document = parse_config(&located.text, &located.path)?;

    let cross_reference_directory = absolute(&options.cross_reference_directory)?;
    let xref = Arc::new(FsCrossReferenceIndex::new(&cross_reference_directory));
    let package_name = package.name.clone();
    let resolved = resolve_config(
        &document,
        ContextSeed {
            package,
            base_url: options.base_url.clone(),
            tools: options.tools.clone(),
            services: BuildServices {
                xref: xref.clone(),
                runner,
                observer: observer.clone(),
            },
        },
    )?;

    // --- Phase 3: Directories ---
    ensure_dir(&xref.package_directory(&package_name))?;
    let package_build_directory = absolute(&options.doc_build_directory)?.join(&package_name);
    ensure_dir(&package_build_directory)?;
    let staging_directory = package_build_directory.join(STAGING_DIR_NAME);
    remove_dir_if_exists(&staging_directory)?;
    ensure_dir(&staging_directory)?;

    // --- Phase 4: Builders ---
    let mut stager = OutputStager::new(&package_build_directory, &staging_directory);
    let jobs = stager.run_all(&resolved.builders, observer.as_ref())?;

    let cross_references = xref.recorded();
    for (package, kind) in &cross_references {
        info!(%package, %kind, "published cross-reference entry");
    }

    // --- Phase 5: Output ---
    let output_directory = absolute(&options.output_directory)?.join(&package_name);
    stager.finalize(&output_directory)?;

    let elapsed = start.elapsed();
    info!(
        package = %package_name,
        output = %output_directory.display(),
        elapsed_ms = millis(elapsed),
        "documentation build complete"
    );

    Ok(BuildReport {
        package: package_name,
        output_directory,
        config_source: located.source,
        jobs,
        cross_references,
        elapsed,
    })
}
