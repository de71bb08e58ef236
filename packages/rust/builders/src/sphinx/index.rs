//! Default `index.rst` for packages without their own.

use pkgdoc_shared::Package;

use super::interfaces::InterfaceCounts;

/// Which generated pages exist, deciding the table of contents.
#[derive(Debug, Clone, Default)]
pub struct IndexContents {
    pub has_cpp: bool,
    pub has_python: bool,
    pub has_documentation: bool,
    pub has_readme: bool,
    pub has_standard_docs: bool,
    pub has_dependencies: bool,
    pub interfaces: InterfaceCounts,
}

/// Render the landing page: title, description, the readme when present and
/// a table of contents of the generated pages that exist.
pub fn index_rst(package: &Package, contents: &IndexContents) -> String {
    let mut entries = Vec::new();
    if contents.has_cpp {
        entries.push("C++ API <generated/index>");
    }
    if contents.has_python {
        entries.push("Python Modules <modules>");
    }
    if contents.has_documentation {
        entries.push("Documentation <user_docs>");
    }
    if contents.interfaces.messages > 0 {
        entries.push("Message Definitions <interfaces/message_definitions>");
    }
    if contents.interfaces.services > 0 {
        entries.push("Service Definitions <interfaces/service_definitions>");
    }
    if contents.interfaces.actions > 0 {
        entries.push("Action Definitions <interfaces/action_definitions>");
    }
    if contents.has_standard_docs {
        entries.push("Standard Documents <__standards>");
    }
    if contents.has_dependencies {
        entries.push("Package Dependencies <__package_dependencies>");
    }
    entries.push("Links <__links>");

    let title = &package.name;
    let mut page = format!(
        "{title}\n{underline}\n\n{description}\n\n",
        underline = "=".repeat(title.chars().count()),
        description = package.description,
    );
    if contents.has_readme {
        page.push_str(".. include:: __readme_include.rst\n\n");
    }
    page.push_str(".. toctree::\n   :maxdepth: 2\n   :caption: Contents\n\n");
    for entry in entries {
        page.push_str("   ");
        page.push_str(entry);
        page.push('\n');
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn package() -> Package {
        Package {
            name: "demo_pkg".into(),
            version: "1.4.2".into(),
            description: "A demo package".into(),
            authors: Vec::new(),
            maintainers: Vec::new(),
            licenses: Vec::new(),
            urls: Vec::new(),
            dependencies: Vec::new(),
            declared_build_type: "ament_cmake".into(),
            metapackage: false,
            pkgdoc_config: None,
            manifest_path: PathBuf::from("/ws/demo_pkg/package.xml"),
        }
    }

    #[test]
    fn minimal_index() {
        assert_eq!(
            index_rst(&package(), &IndexContents::default()),
            "demo_pkg\n========\n\nA demo package\n\n\
             .. toctree::\n   :maxdepth: 2\n   :caption: Contents\n\n   Links <__links>\n"
        );
    }

    #[test]
    fn entries_follow_available_pages() {
        let contents = IndexContents {
            has_cpp: true,
            has_readme: true,
            interfaces: InterfaceCounts {
                messages: 0,
                services: 2,
                actions: 0,
            },
            ..Default::default()
        };
        let page = index_rst(&package(), &contents);
        assert!(page.contains(".. include:: __readme_include.rst\n"));
        let cpp = page.find("C++ API <generated/index>").unwrap();
        let services = page.find("Service Definitions").unwrap();
        assert!(cpp < services);
        assert!(!page.contains("Message Definitions"));
        assert!(!page.contains("Python Modules"));
    }
}
