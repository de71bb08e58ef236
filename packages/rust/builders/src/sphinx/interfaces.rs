//! Reference pages for message, service and action definitions.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use pkgdoc_shared::util::{ensure_dir, has_ignore_marker, relative_path, to_slash, walk_error};
use pkgdoc_shared::{PkgDocError, Result};

/// Interface file extensions and the title word used for each.
const INTERFACE_TYPES: &[(&str, &str)] = &[("msg", "message"), ("srv", "service"), ("action", "action")];

/// Number of interface pages written per type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounts {
    pub messages: usize,
    pub services: usize,
    pub actions: usize,
}

impl InterfaceCounts {
    pub fn total(&self) -> usize {
        self.messages + self.services + self.actions
    }

    fn set(&mut self, extension: &str, count: usize) {
        match extension {
            "msg" => self.messages = count,
            "srv" => self.services = count,
            _ => self.actions = count,
        }
    }
}

/// Write `<output>/<ext>/<Name>.rst` for every interface file under
/// `package_directory`, plus `<output>/<type>_definitions.rst` per type found.
///
/// Directories carrying an ignore marker are not searched.
pub fn generate_interface_docs(package_directory: &Path, output: &Path) -> Result<InterfaceCounts> {
    let files = interface_files(package_directory)?;
    let mut counts = InterfaceCounts::default();

    for (extension, type_name) in INTERFACE_TYPES {
        let type_dir = output.join(extension);
        let mut count = 0;
        for file in files
            .iter()
            .filter(|f| f.extension().is_some_and(|e| e == *extension))
        {
            let Some(name) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            ensure_dir(&type_dir)?;
            let page = format!(
                "{name}\n{underline}\n\nThis is a ROS {type_name} definition.\n\n**Source**\n\n.. literalinclude:: {source}\n\n",
                underline = "=".repeat(name.chars().count()),
                source = to_slash(&relative_path(file, &type_dir)),
            );
            let path = type_dir.join(format!("{name}.rst"));
            std::fs::write(&path, page).map_err(|e| PkgDocError::io(&path, e))?;
            count += 1;
        }

        if count > 0 {
            let title = format!("{}{} Definitions", type_name[..1].to_uppercase(), &type_name[1..]);
            let toc = format!(
                "{title}\n{underline}\n\n.. toctree::\n   :maxdepth: 1\n   :glob:\n\n   {extension}/*\n\n",
                underline = "=".repeat(title.len()),
            );
            let path = output.join(format!("{type_name}_definitions.rst"));
            std::fs::write(&path, toc).map_err(|e| PkgDocError::io(&path, e))?;
        }
        counts.set(extension, count);
    }

    Ok(counts)
}

fn interface_files(package_directory: &Path) -> Result<Vec<PathBuf>> {
    let searched = |entry: &DirEntry| !(entry.file_type().is_dir() && has_ignore_marker(entry.path()));
    let mut files = Vec::new();
    for entry in WalkDir::new(package_directory)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(searched)
    {
        let entry = entry.map_err(|e| walk_error(package_directory, e))?;
        let is_interface = entry.path().extension().is_some_and(|ext| {
            INTERFACE_TYPES.iter().any(|(known, _)| ext == *known)
        });
        if entry.file_type().is_file() && is_interface {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
