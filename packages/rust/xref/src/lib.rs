//! File-system-backed cross-reference index.
//!
//! Builds of unrelated packages, possibly days apart and in different
//! processes, discover each other's tag files and inventories through a
//! shared directory:
//!
//! ```text
//! <root>/<package>/<package>.tag
//! <root>/<package>/<package>.tag.location.json   {"relative_tag_root": "generated/doxygen/html"}
//! <root>/<package>/objects.inv
//! <root>/<package>/objects.inv.location.json     {"relative_root": ""}
//! ```
//!
//! An artifact without its sidecar is invisible to queries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use pkgdoc_shared::util::{ensure_dir, walk_error};
use pkgdoc_shared::{PkgDocError, Result};

/// Suffix appended to an artifact's file name to form its sidecar.
pub const SIDECAR_SUFFIX: &str = ".location.json";

/// Inventory file name written by the doc-site tool.
pub const INVENTORY_FILE_NAME: &str = "objects.inv";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of cross-reference artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// API-extractor tag file, `<package>.tag`.
    TagFile,
    /// Doc-site inventory, `objects.inv`.
    Inventory,
}

impl ArtifactKind {
    /// File name the artifact is stored under for `package`.
    pub fn file_name(&self, package: &str) -> String {
        match self {
            Self::TagFile => format!("{package}.tag"),
            Self::Inventory => INVENTORY_FILE_NAME.to_string(),
        }
    }

    /// Whether `file_name` is an artifact of this kind.
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Self::TagFile => file_name.len() > ".tag".len() && file_name.ends_with(".tag"),
            Self::Inventory => file_name == INVENTORY_FILE_NAME,
        }
    }

    /// Key used for the location inside the sidecar JSON.
    fn sidecar_key(&self) -> &'static str {
        match self {
            Self::TagFile => "relative_tag_root",
            Self::Inventory => "relative_root",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagFile => f.write_str("tag file"),
            Self::Inventory => f.write_str("inventory"),
        }
    }
}

/// Where, relative to the owning package's documentation root, an artifact's
/// content is browsable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(alias = "relative_tag_root")]
    pub relative_root: String,
}

impl LocationRecord {
    pub fn new(relative_root: impl Into<String>) -> Self {
        Self {
            relative_root: relative_root.into(),
        }
    }

    /// Serialize for `kind`, using that kind's sidecar key.
    pub fn to_sidecar_json(&self, kind: ArtifactKind) -> Result<String> {
        let mut map = serde_json::Map::new();
        map.insert(
            kind.sidecar_key().to_string(),
            serde_json::Value::String(self.relative_root.clone()),
        );
        serde_json::to_string(&map)
            .map_err(|e| PkgDocError::CrossReference(format!("failed to encode sidecar: {e}")))
    }
}

/// A readable index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    /// Absolute path of the artifact inside the index.
    pub artifact_path: PathBuf,
    pub location: LocationRecord,
}

/// Path of the sidecar belonging to `artifact`.
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Write the sidecar for `artifact`, replacing any previous one atomically.
pub fn write_sidecar(artifact: &Path, kind: ArtifactKind, location: &LocationRecord) -> Result<()> {
    let sidecar = sidecar_path(artifact);
    let mut staging = sidecar.clone().into_os_string();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    std::fs::write(&staging, location.to_sidecar_json(kind)?)
        .map_err(|e| PkgDocError::io(&staging, e))?;
    std::fs::rename(&staging, &sidecar).map_err(|e| PkgDocError::io(&sidecar, e))
}

/// Read the sidecar of `artifact`, or `None` when it does not exist.
pub fn read_sidecar(artifact: &Path) -> Result<Option<LocationRecord>> {
    let sidecar = sidecar_path(artifact);
    if !sidecar.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&sidecar).map_err(|e| PkgDocError::io(&sidecar, e))?;
    let record = serde_json::from_str(&text).map_err(|e| {
        PkgDocError::CrossReference(format!("invalid sidecar {}: {e}", sidecar.display()))
    })?;
    Ok(Some(record))
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Narrow interface over the cross-reference index.
pub trait CrossReferenceStore: Send + Sync {
    /// Root directory the index lives in.
    fn root(&self) -> &Path;

    /// Store `artifact_path` as `package`'s entry of `kind`, with its location.
    /// Returns the path of the stored artifact.
    fn record(
        &self,
        package: &str,
        kind: ArtifactKind,
        artifact_path: &Path,
        location: &LocationRecord,
    ) -> Result<PathBuf>;

    /// Every readable entry of `kind` whose owner is in `allowed_names`, by package name.
    fn query(
        &self,
        kind: ArtifactKind,
        allowed_names: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, CrossReference>>;
}

// ---------------------------------------------------------------------------
// File-system implementation
// ---------------------------------------------------------------------------

/// Cross-reference index stored as a directory tree.
///
/// Each handle remembers what it recorded, so a second `record` of the same
/// kind for the same package through one handle is rejected. Writes for
/// different packages touch disjoint subdirectories.
pub struct FsCrossReferenceIndex {
    root: PathBuf,
    recorded: Mutex<BTreeSet<(String, ArtifactKind)>>,
}

impl FsCrossReferenceIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recorded: Mutex::new(BTreeSet::new()),
        }
    }

    /// Directory holding `package`'s entries.
    pub fn package_directory(&self, package: &str) -> PathBuf {
        self.root.join(package)
    }

    /// Entries recorded through this handle, in order of package then kind.
    pub fn recorded(&self) -> Vec<(String, ArtifactKind)> {
        let recorded = self.recorded.lock().unwrap_or_else(|e| e.into_inner());
        recorded.iter().cloned().collect()
    }
}

impl CrossReferenceStore for FsCrossReferenceIndex {
    fn root(&self) -> &Path {
        &self.root
    }

    fn record(
        &self,
        package: &str,
        kind: ArtifactKind,
        artifact_path: &Path,
        location: &LocationRecord,
    ) -> Result<PathBuf> {
        // Held until the entry is published, so a failed write is not remembered.
        let mut recorded = self.recorded.lock().unwrap_or_else(|e| e.into_inner());
        let key = (package.to_string(), kind);
        if recorded.contains(&key) {
            return Err(PkgDocError::DuplicateEntry {
                package: package.to_string(),
                kind: kind.to_string(),
            });
        }

        let directory = self.package_directory(package);
        ensure_dir(&directory)?;
        let destination = directory.join(kind.file_name(package));

        if destination.exists() {
            debug!(
                package,
                %kind,
                path = %destination.display(),
                "replacing entry left by an earlier build"
            );
        }
        if artifact_path != destination {
            std::fs::copy(artifact_path, &destination)
                .map_err(|e| PkgDocError::io(artifact_path, e))?;
        }
        // Sidecar last: readers ignore artifacts that do not have one yet.
        write_sidecar(&destination, kind, location)?;
        recorded.insert(key);

        info!(
            package,
            %kind,
            path = %destination.display(),
            relative_root = %location.relative_root,
            "recorded cross-reference entry"
        );
        Ok(destination)
    }

    fn query(
        &self,
        kind: ArtifactKind,
        allowed_names: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, CrossReference>> {
        let mut entries = BTreeMap::new();
        if !self.root.is_dir() {
            return Ok(entries);
        }

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(&self.root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !kind.matches(&file_name) {
                continue;
            }
            let artifact = entry.path();
            let Some(owner) = artifact
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };

            let Some(location) = read_sidecar(artifact)? else {
                warn!(
                    path = %artifact.display(),
                    "ignoring {kind} because it lacks a {SIDECAR_SUFFIX} sidecar"
                );
                continue;
            };
            if !allowed_names.contains(&owner) {
                continue;
            }
            if entries.contains_key(&owner) {
                return Err(PkgDocError::DuplicateEntry {
                    package: owner,
                    kind: kind.to_string(),
                });
            }
            entries.insert(
                owner,
                CrossReference {
                    artifact_path: artifact.to_path_buf(),
                    location,
                },
            );
        }

        debug!(%kind, count = entries.len(), "queried cross-reference index");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pkgdoc-xref-{}", uuid::Uuid::now_v7()))
    }

    fn artifact(dir: &Path, name: &str, content: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn record_then_query_round_trip() {
        let base = temp_dir();
        let index = FsCrossReferenceIndex::new(base.join("xref"));
        let tag = artifact(&base.join("out"), "geometry.tag", "<tagfile/>");
        let location = LocationRecord::new("generated/doxygen/html");

        let stored = index
            .record("geometry", ArtifactKind::TagFile, &tag, &location)
            .unwrap();
        assert_eq!(stored, base.join("xref/geometry/geometry.tag"));
        assert_eq!(
            std::fs::read_to_string(sidecar_path(&stored)).unwrap(),
            r#"{"relative_tag_root":"generated/doxygen/html"}"#
        );

        let found = index
            .query(ArtifactKind::TagFile, &names(&["geometry", "other"]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["geometry"].artifact_path, stored);
        assert_eq!(found["geometry"].location, location);

        let excluded = index
            .query(ArtifactKind::TagFile, &names(&["other"]))
            .unwrap();
        assert!(excluded.is_empty());

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn inventory_sidecar_uses_relative_root() {
        let base = temp_dir();
        let index = FsCrossReferenceIndex::new(base.join("xref"));
        let inv = artifact(&base.join("out"), INVENTORY_FILE_NAME, "inv");

        index
            .record("nav", ArtifactKind::Inventory, &inv, &LocationRecord::new(""))
            .unwrap();
        let found = index
            .query(ArtifactKind::Inventory, &names(&["nav"]))
            .unwrap();
        assert_eq!(found["nav"].location.relative_root, "");
        assert!(
            index
                .query(ArtifactKind::TagFile, &names(&["nav"]))
                .unwrap()
                .is_empty()
        );

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn artifact_without_sidecar_is_skipped() {
        let base = temp_dir();
        let root = base.join("xref");
        artifact(&root.join("orphan"), "orphan.tag", "<tagfile/>");
        let index = FsCrossReferenceIndex::new(&root);

        let found = index
            .query(ArtifactKind::TagFile, &names(&["orphan"]))
            .unwrap();
        assert!(found.is_empty());

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn second_record_of_same_kind_is_rejected() {
        let base = temp_dir();
        let index = FsCrossReferenceIndex::new(base.join("xref"));
        let first = artifact(&base.join("a"), "pkg.tag", "one");
        let second = artifact(&base.join("b"), "pkg.tag", "two");
        let location = LocationRecord::new("html");

        index
            .record("pkg", ArtifactKind::TagFile, &first, &location)
            .unwrap();
        let err = index
            .record("pkg", ArtifactKind::TagFile, &second, &location)
            .unwrap_err();
        assert!(matches!(err, PkgDocError::DuplicateEntry { .. }));
        // A different kind for the same package is fine.
        let inv = artifact(&base.join("c"), INVENTORY_FILE_NAME, "inv");
        index
            .record("pkg", ArtifactKind::Inventory, &inv, &location)
            .unwrap();
        assert_eq!(index.recorded().len(), 2);

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn failed_record_is_not_remembered() {
        let base = temp_dir();
        let index = FsCrossReferenceIndex::new(base.join("xref"));
        let location = LocationRecord::new("html");

        let err = index
            .record("pkg", ArtifactKind::TagFile, &base.join("out/missing.tag"), &location)
            .unwrap_err();
        assert!(matches!(err, PkgDocError::Io { .. }));
        assert!(index.recorded().is_empty());

        let tag = artifact(&base.join("out"), "pkg.tag", "<tagfile/>");
        index
            .record("pkg", ArtifactKind::TagFile, &tag, &location)
            .unwrap();
        assert_eq!(
            index.recorded(),
            vec![("pkg".to_string(), ArtifactKind::TagFile)]
        );

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn later_invocation_replaces_earlier_entry() {
        let base = temp_dir();
        let root = base.join("xref");
        let earlier = artifact(&base.join("a"), "pkg.tag", "<tagfile>old</tagfile>");
        FsCrossReferenceIndex::new(&root)
            .record("pkg", ArtifactKind::TagFile, &earlier, &LocationRecord::new("api/html"))
            .unwrap();

        let index = FsCrossReferenceIndex::new(&root);
        let later = artifact(&base.join("b"), "pkg.tag", "<tagfile>new</tagfile>");
        let location = LocationRecord::new("generated/doxygen/html");
        let stored = index
            .record("pkg", ArtifactKind::TagFile, &later, &location)
            .unwrap();

        let found = index
            .query(ArtifactKind::TagFile, &names(&["pkg"]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["pkg"].artifact_path, stored);
        assert_eq!(found["pkg"].location, location);
        assert_eq!(
            std::fs::read_to_string(&stored).unwrap(),
            "<tagfile>new</tagfile>"
        );

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn duplicate_artifacts_on_disk_are_fatal() {
        let base = temp_dir();
        let root = base.join("xref");
        let location = LocationRecord::new("html");
        for file in ["dup.tag", "stray.tag"] {
            let path = artifact(&root.join("dup"), file, "x");
            write_sidecar(&path, ArtifactKind::TagFile, &location).unwrap();
        }
        let index = FsCrossReferenceIndex::new(&root);

        let err = index
            .query(ArtifactKind::TagFile, &names(&["dup"]))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate tag file entry for package 'dup'"));

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn missing_root_yields_nothing() {
        let index = FsCrossReferenceIndex::new(temp_dir());
        assert!(
            index
                .query(ArtifactKind::Inventory, &names(&["anything"]))
                .unwrap()
                .is_empty()
        );
    }
}
