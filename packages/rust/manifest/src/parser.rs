//! `package.xml` parsing.
//!
//! Handles manifest formats 1 through 3. Unknown elements are ignored;
//! a missing `<name>` or `<version>` is an error.

use std::path::Path;

use roxmltree::{Document, Node};

use pkgdoc_shared::{Dependency, DependencyKind, Package, PackageUrl, Person, PkgDocError, Result};

/// Build type assumed when `<export>` does not declare one.
const DEFAULT_BUILD_TYPE: &str = "catkin";

/// Parse manifest `text`; `manifest_path` is recorded on the package and used in errors.
pub fn parse_manifest(text: &str, manifest_path: &Path) -> Result<Package> {
    let document = Document::parse(text)
        .map_err(|e| PkgDocError::manifest(manifest_path, format!("invalid XML: {e}")))?;

    let root = document.root_element();
    if root.tag_name().name() != "package" {
        return Err(PkgDocError::manifest(
            manifest_path,
            format!("expected root element <package>, found <{}>", root.tag_name().name()),
        ));
    }

    let mut name = None;
    let mut version = None;
    let mut description = String::new();
    let mut authors = Vec::new();
    let mut maintainers = Vec::new();
    let mut licenses = Vec::new();
    let mut urls = Vec::new();
    let mut dependencies = Vec::new();
    let mut declared_build_type = None;
    let mut metapackage = false;
    let mut pkgdoc_config = None;

    for child in root.children().filter(Node::is_element) {
        let tag = child.tag_name().name();
        match tag {
            "name" => name = Some(element_text(child)),
            "version" => version = Some(element_text(child)),
            "description" => description = element_text(child),
            "author" => authors.push(person(child)),
            "maintainer" => maintainers.push(person(child)),
            "license" => licenses.push(element_text(child)),
            "url" => urls.push(PackageUrl {
                url: element_text(child),
                kind: child.attribute("type").unwrap_or("website").to_string(),
            }),
            "export" => {
                for export in child.children().filter(Node::is_element) {
                    match export.tag_name().name() {
                        "build_type" => declared_build_type = Some(element_text(export)),
                        "metapackage" => metapackage = true,
                        "pkgdoc" => pkgdoc_config = Some(element_text(export).into()),
                        _ => {}
                    }
                }
            }
            other => {
                if let Some(kind) = DependencyKind::from_element(other) {
                    dependencies.push(Dependency {
                        name: element_text(child),
                        kind,
                    });
                }
            }
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| PkgDocError::manifest(manifest_path, "missing <name>"))?;
    let version = version
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PkgDocError::manifest(manifest_path, "missing <version>"))?;

    Ok(Package {
        name,
        version,
        description,
        authors,
        maintainers,
        licenses,
        urls,
        dependencies,
        declared_build_type: declared_build_type.unwrap_or_else(|| DEFAULT_BUILD_TYPE.into()),
        metapackage,
        pkgdoc_config,
        manifest_path: manifest_path.to_path_buf(),
    })
}

/// All text below `node`, with whitespace runs collapsed.
fn element_text(node: Node<'_, '_>) -> String {
    let raw: Vec<&str> = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    raw.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn person(node: Node<'_, '_>) -> Person {
    Person {
        name: element_text(node),
        email: node.attribute("email").map(str::to_string),
    }
}
