//! Package manifest reading and workspace package discovery.
//!
//! Turns a `package.xml` into a [`Package`] and finds every package
//! below a workspace root, honouring the usual ignore marker files.

pub mod parser;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use pkgdoc_shared::util::{has_ignore_marker, walk_error};
use pkgdoc_shared::{Package, PkgDocError, Result};

pub use parser::parse_manifest;
pub use pkgdoc_shared::util::IGNORE_MARKERS;

/// Manifest file name.
pub const MANIFEST_FILE_NAME: &str = "package.xml";

/// Read the package at `path`, which is either a package directory or its manifest.
///
/// The returned package's manifest path is absolute.
pub fn read_package(path: &Path) -> Result<Package> {
    let manifest_path = if path.is_dir() {
        path.join(MANIFEST_FILE_NAME)
    } else {
        path.to_path_buf()
    };
    if !manifest_path.is_file() {
        return Err(PkgDocError::manifest(
            &manifest_path,
            "no package manifest found",
        ));
    }
    let manifest_path = pkgdoc_shared::util::absolute(&manifest_path)?;
    let text =
        std::fs::read_to_string(&manifest_path).map_err(|e| PkgDocError::io(&manifest_path, e))?;
    parser::parse_manifest(&text, &manifest_path)
}

/// Find every package below `root`, sorted by directory.
///
/// Hidden directories and trees carrying an ignore marker are skipped, and
/// discovery does not descend into a package once found. Manifests that fail
/// to parse are logged and skipped.
pub fn find_packages(root: &Path) -> Result<Vec<Package>> {
    let mut packages = Vec::new();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
        if hidden || has_ignore_marker(dir) {
            debug!(dir = %dir.display(), "skipping ignored directory");
            walker.skip_current_dir();
            continue;
        }

        let manifest: PathBuf = dir.join(MANIFEST_FILE_NAME);
        if manifest.is_file() {
            match read_package(&manifest) {
                Ok(package) => packages.push(package),
                Err(e) => warn!(manifest = %manifest.display(), error = %e, "skipping package"),
            }
            walker.skip_current_dir();
        }
    }

    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pkgdoc-manifest-{}", uuid::Uuid::now_v7()))
    }

    fn write_package(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE_NAME),
            format!(
                "<package format=\"3\"><name>{name}</name><version>1.0.0</version>\
                 <description>d</description></package>"
            ),
        )
        .unwrap();
    }

    #[test]
    fn read_package_from_directory() {
        let root = temp_dir();
        write_package(&root.join("alpha"), "alpha");

        let package = read_package(&root.join("alpha")).unwrap();
        assert_eq!(package.name, "alpha");
        assert!(package.manifest_path.is_absolute());
        assert_eq!(package.directory(), root.join("alpha"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let root = temp_dir();
        std::fs::create_dir_all(&root).unwrap();
        let err = read_package(&root).unwrap_err();
        assert!(err.to_string().contains("no package manifest"));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn discovery_honours_ignore_markers() {
        let root = temp_dir();
        write_package(&root.join("src/alpha"), "alpha");
        write_package(&root.join("src/group/beta"), "beta");
        write_package(&root.join("src/ignored/gamma"), "gamma");
        std::fs::write(root.join("src/ignored/COLCON_IGNORE"), "").unwrap();
        write_package(&root.join(".hidden/delta"), "delta");
        // Nested below a package: not a separate package.
        write_package(&root.join("src/alpha/test/fixture"), "fixture");

        let names: Vec<String> = find_packages(&root)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        std::fs::remove_dir_all(&root).ok();
    }
}
