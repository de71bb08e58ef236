//! Generated reStructuredText pages: standard package documents, user
//! documentation, links and dependencies.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use pkgdoc_shared::util::{copy_dir_all, ensure_dir, to_slash, walk_error};
use pkgdoc_shared::{Package, PkgDocError, Result, slugify};

/// Standard document keys, in the order they are listed.
pub const STANDARD_DOCUMENTS: &[&str] = &[
    "readme",
    "license",
    "contributing",
    "changelog",
    "quality_declaration",
    "package",
];

/// Directory inside the wrapped project user documentation is copied to.
pub const USER_DOCS_DIR: &str = "user_docs";

const DOC_EXTENSIONS: &[&str] = &["rst", "md", "markdown"];

/// How a standard document is pulled into the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    Rst,
    Xml,
    Other,
}

impl DocumentFormat {
    fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "rst" => Self::Rst,
            "xml" => Self::Xml,
            _ => Self::Other,
        }
    }

    /// Directive embedding `file_name`.
    fn directive(&self, file_name: &str) -> String {
        match self {
            Self::Rst => format!(".. include:: {file_name}\n"),
            Self::Markdown => {
                format!(".. include:: {file_name}\n   :parser: myst_parser.sphinx_\n")
            }
            Self::Xml => format!(".. literalinclude:: {file_name}\n   :language: xml\n"),
            Self::Other => format!(".. literalinclude:: {file_name}\n   :language: none\n"),
        }
    }
}

/// A standard document found in the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardDocument {
    pub key: &'static str,
    pub path: PathBuf,
    pub file_name: String,
    pub format: DocumentFormat,
}

// ---------------------------------------------------------------------------
// Standard documents
// ---------------------------------------------------------------------------

/// Find the standard documents in `package_directory`, matched case-insensitively
/// on the file stem. Only `package.xml` itself counts for `package`.
pub fn locate_standard_documents(package_directory: &Path) -> Result<Vec<StandardDocument>> {
    let mut files = Vec::new();
    let entries =
        std::fs::read_dir(package_directory).map_err(|e| PkgDocError::io(package_directory, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PkgDocError::io(package_directory, e))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.path());
        }
    }
    files.sort();

    let mut found = Vec::new();
    for key in STANDARD_DOCUMENTS {
        let matched = files.iter().find_map(|path| {
            let file_name = path.file_name()?.to_string_lossy().into_owned();
            let stem = path.file_stem()?.to_string_lossy().to_lowercase();
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            let format = DocumentFormat::from_extension(&extension);
            let eligible = stem == *key
                && match (*key, format) {
                    ("package", _) => file_name == "package.xml",
                    (_, DocumentFormat::Xml) => false,
                    _ => true,
                };
            eligible.then(|| StandardDocument {
                key: *key,
                path: path.clone(),
                file_name,
                format,
            })
        });
        found.extend(matched);
    }
    Ok(found)
}

/// Copy each document into `wrapped` and write its `__<KEY>.rst` wrapper,
/// `__readme_include.rst` for the readme and the `__standards.rst` index.
pub fn generate_standard_documents(documents: &[StandardDocument], wrapped: &Path) -> Result<()> {
    if documents.is_empty() {
        return Ok(());
    }

    let mut toc = String::new();
    for document in documents {
        let copy = wrapped.join(&document.file_name);
        std::fs::copy(&document.path, &copy).map_err(|e| PkgDocError::io(&document.path, e))?;

        let title = document.key.to_uppercase();
        let page = format!(
            "{title}\n{underline}\n\n{directive}",
            underline = ")".repeat(document.key.len()),
            directive = document.format.directive(&document.file_name),
        );
        write(&wrapped.join(format!("__{title}.rst")), &page)?;
        toc.push_str(&format!("   __{title}\n"));

        if document.key == "readme" {
            let format = match document.format {
                DocumentFormat::Xml => DocumentFormat::Other,
                other => other,
            };
            let page = format!("README\n======\n\n\n{}", format.directive(&document.file_name));
            write(&wrapped.join("__readme_include.rst"), &page)?;
        }
    }

    let standards = format!(
        "Standard Documents\n==================\n\n.. toctree::\n   :maxdepth: 1\n\n{toc}"
    );
    write(&wrapped.join("__standards.rst"), &standards)
}

// ---------------------------------------------------------------------------
// User documentation
// ---------------------------------------------------------------------------

/// Copy `source` into `<wrapped>/user_docs` and write `user_docs.rst` plus a
/// `user_docs_<slug>.rst` per subdirectory holding documents.
///
/// Returns the directories (relative to `source`, `.` for its root) that
/// hold documents.
pub fn include_user_docs(source: &Path, wrapped: &Path) -> Result<Vec<String>> {
    let mut directories = BTreeSet::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(source, e))?;
        let is_document = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| DOC_EXTENSIONS.iter().any(|known| ext == *known));
        if !is_document {
            continue;
        }
        let relative = entry
            .path()
            .parent()
            .and_then(|parent| parent.strip_prefix(source).ok())
            .map(to_slash)
            .filter(|relative| !relative.is_empty())
            .unwrap_or_else(|| ".".to_string());
        directories.insert(relative);
    }

    let destination = wrapped.join(USER_DOCS_DIR);
    ensure_dir(&destination)?;
    copy_dir_all(source, &destination)?;

    if directories.is_empty() {
        return Ok(Vec::new());
    }

    let mut toc = format!(
        "Documentation\n=============\n\n.. toctree::\n   :maxdepth: 1\n   :glob:\n\n   {USER_DOCS_DIR}/*\n"
    );
    for directory in directories.iter().filter(|d| *d != ".") {
        let name = format!("{USER_DOCS_DIR}_{}", slugify(directory));
        let page = format!(
            "DOCUMENTATION DIRECTORY /{directory}/\n{underline}\n\n.. toctree::\n   :maxdepth: 2\n   :glob:\n\n   {USER_DOCS_DIR}/{directory}/*\n",
            underline = "=".repeat("DOCUMENTATION DIRECTORY //".len() + directory.len()),
        );
        write(&wrapped.join(format!("{name}.rst")), &page)?;
        toc.push_str(&format!("   {directory} <{name}>\n"));
    }
    write(&wrapped.join(format!("{USER_DOCS_DIR}.rst")), &toc)?;

    Ok(directories.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Links and dependencies
// ---------------------------------------------------------------------------

/// Write `__links.rst` from the package's urls.
pub fn write_links(package: &Package, wrapped: &Path) -> Result<()> {
    let mut page = format!(
        "Links\n=====\n\n.. toctree::\n\n   Rosindex <https://index.ros.org/p/{}>\n",
        package.name
    );
    for url in &package.urls {
        let mut kind = url.kind.chars();
        let label = match kind.next() {
            Some(first) => first.to_uppercase().chain(kind.flat_map(char::to_lowercase)).collect(),
            None => "Link".to_string(),
        };
        page.push_str(&format!("   {label} <{}>\n", url.url));
    }
    write(&wrapped.join("__links.rst"), &page)
}

/// Write `__package_dependencies.rst` linking each runtime and documentation
/// dependency under `base_url`. Returns whether the page was written.
pub fn write_package_dependencies(package: &Package, base_url: &str, wrapped: &Path) -> Result<bool> {
    let dependencies = package.exec_and_doc_dependency_names();
    if dependencies.is_empty() {
        return Ok(false);
    }
    let mut page = String::from(
        "Package Dependencies\n====================\n\n.. toctree::\n   :maxdepth: 2\n\n",
    );
    for dependency in dependencies {
        page.push_str(&format!("   {dependency} <{base_url}/{dependency}/>\n"));
    }
    write(&wrapped.join("__package_dependencies.rst"), &page)?;
    Ok(true)
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| PkgDocError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgdoc_shared::PackageUrl;

    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("pkgdoc-documents-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn standard_documents_in_fixed_order() {
        let root = temp_root();
        let package = root.join("pkg");
        let wrapped = root.join("wrapped");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::create_dir_all(&wrapped).unwrap();
        for name in ["CHANGELOG.rst", "LICENSE", "README.md", "package.xml", "license.xml"] {
            std::fs::write(package.join(name), "text").unwrap();
        }

        let documents = locate_standard_documents(&package).unwrap();
        let keys: Vec<_> = documents.iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["readme", "license", "changelog", "package"]);
        assert_eq!(documents[1].file_name, "LICENSE");
        assert_eq!(documents[1].format, DocumentFormat::Other);

        generate_standard_documents(&documents, &wrapped).unwrap();
        assert!(wrapped.join("README.md").is_file());
        assert_eq!(
            std::fs::read_to_string(wrapped.join("__README.rst")).unwrap(),
            "README\n))))))\n\n.. include:: README.md\n   :parser: myst_parser.sphinx_\n"
        );
        assert_eq!(
            std::fs::read_to_string(wrapped.join("__PACKAGE.rst")).unwrap(),
            "PACKAGE\n)))))))\n\n.. literalinclude:: package.xml\n   :language: xml\n"
        );
        let include = std::fs::read_to_string(wrapped.join("__readme_include.rst")).unwrap();
        assert!(include.starts_with("README\n======\n"));
        let standards = std::fs::read_to_string(wrapped.join("__standards.rst")).unwrap();
        assert!(standards.ends_with("   __README\n   __LICENSE\n   __CHANGELOG\n   __PACKAGE\n"));

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn user_docs_tables_of_contents() {
        let root = temp_root();
        let source = root.join("doc");
        let wrapped = root.join("wrapped");
        std::fs::create_dir_all(source.join("guides/advanced")).unwrap();
        std::fs::create_dir_all(source.join("images")).unwrap();
        std::fs::create_dir_all(&wrapped).unwrap();
        std::fs::write(source.join("intro.rst"), "Intro").unwrap();
        std::fs::write(source.join("guides/setup.md"), "# Setup").unwrap();
        std::fs::write(source.join("guides/advanced/tuning.markdown"), "# Tuning").unwrap();
        std::fs::write(source.join("images/logo.png"), "png").unwrap();

        let directories = include_user_docs(&source, &wrapped).unwrap();
        assert_eq!(directories, vec![".", "guides", "guides/advanced"]);
        assert!(wrapped.join("user_docs/images/logo.png").is_file());
        assert!(wrapped.join("user_docs/guides/advanced/tuning.markdown").is_file());

        let toc = std::fs::read_to_string(wrapped.join("user_docs.rst")).unwrap();
        assert!(toc.contains("   guides <user_docs_guides>\n"));
        assert!(toc.contains("   guides/advanced <user_docs_guidesadvanced>\n"));
        let page = std::fs::read_to_string(wrapped.join("user_docs_guidesadvanced.rst")).unwrap();
        assert!(page.starts_with(
            "DOCUMENTATION DIRECTORY /guides/advanced/\n=========================================\n"
        ));
        assert!(page.contains("   user_docs/guides/advanced/*\n"));

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn user_docs_without_documents_write_no_index() {
        let root = temp_root();
        let source = root.join("doc");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("notes.txt"), "plain").unwrap();

        let directories = include_user_docs(&source, &root).unwrap();
        assert!(directories.is_empty());
        assert!(!root.join("user_docs.rst").exists());

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn links_and_dependencies() {
        let root = temp_root();
        let package = Package {
            name: "demo_pkg".into(),
            version: "0.1.0".into(),
            description: String::new(),
            authors: Vec::new(),
            maintainers: Vec::new(),
            licenses: Vec::new(),
            urls: vec![PackageUrl {
                url: "https://github.com/example/demo".into(),
                kind: "repository".into(),
            }],
            dependencies: vec![pkgdoc_shared::Dependency {
                name: "rclpy".into(),
                kind: pkgdoc_shared::DependencyKind::Exec,
            }],
            declared_build_type: "ament_python".into(),
            metapackage: false,
            pkgdoc_config: None,
            manifest_path: root.join("package.xml"),
        };

        write_links(&package, &root).unwrap();
        let links = std::fs::read_to_string(root.join("__links.rst")).unwrap();
        assert!(links.contains("   Rosindex <https://index.ros.org/p/demo_pkg>\n"));
        assert!(links.contains("   Repository <https://github.com/example/demo>\n"));

        assert!(write_package_dependencies(&package, "http://docs.example.org/p", &root).unwrap());
        let deps = std::fs::read_to_string(root.join("__package_dependencies.rst")).unwrap();
        assert!(deps.contains("   rclpy <http://docs.example.org/p/rclpy/>\n"));

        std::fs::remove_dir_all(root).ok();
    }
}
