//! Path and naming helpers shared by the builders and the pipeline.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{PkgDocError, Result};

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s]").expect("non-word regex")
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("whitespace regex")
});

/// Turn a display name into a string usable as a directory name.
///
/// Lowercases, drops punctuation and collapses whitespace runs into `-`.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lowered, "");
    WHITESPACE_RE.replace_all(&stripped, "-").into_owned()
}

/// Path of `path` relative to `base`, inserting `..` where the two diverge.
///
/// Both paths should be absolute (or both relative to the same directory).
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<Component<'_>> = path.components().collect();
    let base: Vec<Component<'_>> = base.components().collect();
    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &path[common..] {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// Make `path` absolute against the current directory without touching the filesystem.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| PkgDocError::io(path, e))
}

/// Render a relative path with forward slashes, as used in generated documents.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Create `dir` and its parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| PkgDocError::io(dir, e))
}

/// Remove `dir` recursively if it exists.
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| PkgDocError::io(dir, e))?;
    }
    Ok(())
}

/// Copy the contents of `source` into `destination`, merging with what is there.
/// Returns the number of files copied.
pub fn copy_dir_all(source: &Path, destination: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(source, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| PkgDocError::validation(e.to_string()))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| PkgDocError::io(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Move a file or directory, falling back to copy-and-delete across filesystems.
pub fn move_path(source: &Path, destination: &Path) -> Result<()> {
    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    if source.is_dir() {
        copy_dir_all(source, destination)?;
        std::fs::remove_dir_all(source).map_err(|e| PkgDocError::io(source, e))
    } else {
        std::fs::copy(source, destination).map_err(|e| PkgDocError::io(source, e))?;
        std::fs::remove_file(source).map_err(|e| PkgDocError::io(source, e))
    }
}

/// Marker files that exclude a directory tree from package discovery and
/// interface scanning.
pub const IGNORE_MARKERS: &[&str] = &["COLCON_IGNORE", "AMENT_IGNORE", "CATKIN_IGNORE"];

/// Whether `dir` contains one of the [`IGNORE_MARKERS`].
pub fn has_ignore_marker(dir: &Path) -> bool {
    IGNORE_MARKERS.iter().any(|marker| dir.join(marker).exists())
}

/// Convert a `walkdir` failure into an I/O error that names the offending path.
pub fn walk_error(root: &Path, error: walkdir::Error) -> PkgDocError {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    PkgDocError::io(path, source)
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
pub fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
