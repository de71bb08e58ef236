//! Merging builder outputs into one staging tree.
//!
//! Each job gets a scratch directory under the package's build directory and
//! its output is moved file by file to `<staging>/<output_dir>/`. A path may
//! be written once per build; a second writer is a collision.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use walkdir::WalkDir;

use pkgdoc_builders::{BuildObserver, Builder, BuilderKind};
use pkgdoc_shared::util::{
    ensure_dir, move_path, remove_dir_if_exists, slugify, to_slash, walk_error,
};
use pkgdoc_shared::{PkgDocError, Result};

/// Name of the staging directory inside the package's build directory.
pub const STAGING_DIR_NAME: &str = "output_staging";

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedJob {
    pub name: String,
    pub kind: BuilderKind,
    pub output_dir: String,
    /// Files merged into the staging tree.
    pub files: usize,
}

/// Owns the staging tree for one package build.
pub struct OutputStager {
    package_build_directory: PathBuf,
    staging_directory: PathBuf,
    scratch_names: BTreeSet<String>,
    /// Staging-relative path -> name of the job that wrote it.
    owners: BTreeMap<PathBuf, String>,
}

impl OutputStager {
    /// `staging_directory` must exist and be empty.
    pub fn new(package_build_directory: impl Into<PathBuf>, staging_directory: impl Into<PathBuf>) -> Self {
        let staging_directory = staging_directory.into();
        let mut scratch_names = BTreeSet::new();
        if let Some(name) = staging_directory.file_name() {
            scratch_names.insert(name.to_string_lossy().into_owned());
        }
        Self {
            package_build_directory: package_build_directory.into(),
            staging_directory,
            scratch_names,
            owners: BTreeMap::new(),
        }
    }

    pub fn staging_directory(&self) -> &Path {
        &self.staging_directory
    }

    /// Run every job in order, stopping at the first failure.
    pub fn run_all(
        &mut self,
        builders: &[Box<dyn Builder>],
        observer: &dyn BuildObserver,
    ) -> Result<Vec<StagedJob>> {
        builders
            .iter()
            .map(|builder| self.run(builder.as_ref(), observer))
            .collect()
    }

    /// Build one job in its scratch directory and merge its output.
    #[instrument(skip_all, fields(builder = %builder.label()))]
    pub fn run(&mut self, builder: &dyn Builder, observer: &dyn BuildObserver) -> Result<StagedJob> {
        observer.builder_started(builder.name(), builder.kind());
        let scratch = self.scratch_directory(builder.name());
        ensure_dir(&scratch)?;

        let mut job = StagedJob {
            name: builder.name().to_string(),
            kind: builder.kind(),
            output_dir: builder.output_dir().to_string(),
            files: 0,
        };

        let Some(output) = builder.build(&scratch, &self.staging_directory)? else {
            info!("builder produced no output");
            observer.builder_finished(builder.name(), builder.kind(), None);
            return Ok(job);
        };
        if !output.is_dir() {
            return Err(PkgDocError::validation(format!(
                "builder '{}' reported output directory '{}' which does not exist",
                builder.name(),
                output.display()
            )));
        }

        let destination = self.staging_directory.join(builder.output_dir());
        job.files = self.merge(builder.name(), &output, &destination)?;
        remove_dir_if_exists(&output)?;

        info!(files = job.files, destination = %destination.display(), "merged builder output");
        observer.builder_finished(builder.name(), builder.kind(), Some(&destination));
        Ok(job)
    }

    /// Replace `destination` with the staging tree.
    pub fn finalize(self, destination: &Path) -> Result<()> {
        remove_dir_if_exists(destination)?;
        if let Some(parent) = destination.parent() {
            ensure_dir(parent)?;
        }
        move_path(&self.staging_directory, destination)?;
        info!(destination = %destination.display(), "documentation moved into place");
        Ok(())
    }

    /// `<package build dir>/<slug>`, suffixed when another job took the name.
    fn scratch_directory(&mut self, name: &str) -> PathBuf {
        let mut base = slugify(name);
        if base.is_empty() {
            base = "builder".to_string();
        }
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.scratch_names.insert(candidate.clone()) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.package_build_directory.join(candidate)
    }

    fn merge(&mut self, job: &str, output: &Path, destination: &Path) -> Result<usize> {
        let mut files = Vec::new();
        for entry in WalkDir::new(output).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(output, e))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(output)
                .map_err(|e| PkgDocError::validation(e.to_string()))?
                .to_path_buf();
            files.push(relative);
        }

        for relative in &files {
            let target = destination.join(relative);
            let staged = target
                .strip_prefix(&self.staging_directory)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| target.clone());
            if target.exists() {
                return Err(PkgDocError::OutputCollision {
                    path: to_slash(relative),
                    first: self
                        .owners
                        .get(&staged)
                        .cloned()
                        .unwrap_or_else(|| "an earlier builder".to_string()),
                    second: job.to_string(),
                });
            }
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            move_path(&output.join(relative), &target)?;
            self.owners.insert(staged, job.to_string());
        }
        Ok(files.len())
    }
}
