//! The configuration used when a package has none, and the text written by
//! `pkgdoc default-config`.

use pkgdoc_shared::Package;

/// Render the default two-document configuration for `package`.
///
/// Every setting is listed commented out at its default value, so the file
/// doubles as a reference for what can be configured.
pub fn default_config_text(package: &Package) -> String {
    let name = yaml_quote(&package.name);
    let api_name = yaml_quote(&format!("{} Public C/C++ API", package.name));
    format!(
        r#"## Default configuration generated by pkgdoc for {package_name}.
## Commit this file next to package.xml and reference it from the manifest:
##   <export><pkgdoc>pkgdoc.yaml</pkgdoc></export>
type: 'pkgdoc config'
version: 1

---

settings: {{
    ## Run the API extractor even when the build type has no compiled sources.
    # always_run_doxygen: false,

    ## Generate Python module pages even when the build type has no Python.
    # always_run_sphinx_apidoc: false,

    ## Never generate Python module pages. Wins over always_run_sphinx_apidoc.
    # never_run_sphinx_apidoc: false,

    ## Python source directory relative to the package, instead of detection.
    # python_source: null,

    ## Build type replacing the one declared in the manifest.
    # override_build_type: null,
  }}

builders:
    ## API extraction from C/C++ headers. Skipped for packages without
    ## compiled sources unless always_run_doxygen is set.
    - doxygen: {{
        name: {api_name},
        output_dir: 'generated/doxygen',
        ## Doxyfile supplied by the package, relative to this file.
        doxyfile: null,
        ## Extra statements appended to the generated Doxyfile.
        extra_doxyfile_statements: [],
      }}
    ## The documentation site, merged at the root of the output.
    - sphinx: {{
        name: {name},
        output_dir: '',
        ## Directory holding index.rst and conf.py, relative to this file.
        sphinx_sourcedir: null,
        ## Directory of extra documents. Defaults to doc/; null disables it.
        # user_doc_dir: 'doc',
        ## Where the API extractor's XML output is found.
        doxygen_xml_directory: 'generated/doxygen/xml',
      }}
"#,
        package_name = package.name,
    )
}

/// Single-quoted YAML scalar.
fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextSeed, parse_config, resolve_config};
    use crate::testing::{demo_package, services, temp_root};
    use pkgdoc_builders::BuilderKind;
    use pkgdoc_shared::ToolCommands;

    #[test]
    fn default_config_resolves_to_both_builders() {
        let root = temp_root("defaults");
        let package = demo_package(&root, "ament_cmake");
        let text = default_config_text(&package);
        let path = package.directory().join("pkgdoc.yaml");

        let document = parse_config(&text, &path).unwrap();
        assert!(document.settings.is_empty());
        assert_eq!(document.builders.len(), 2);

        let resolved = resolve_config(
            &document,
            ContextSeed {
                package,
                base_url: "http://docs.example.org/p".into(),
                tools: ToolCommands::default(),
                services: services(&root),
            },
        )
        .unwrap();
        let jobs: Vec<_> = resolved
            .builders
            .iter()
            .map(|b| (b.label(), b.output_dir().to_string()))
            .collect();
        assert_eq!(
            jobs,
            vec![
                (
                    format!("demo_pkg Public C/C++ API ({})", BuilderKind::Doxygen),
                    "generated/doxygen".to_string()
                ),
                ("demo_pkg (sphinx)".to_string(), String::new()),
            ]
        );
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(yaml_quote("it's"), "'it''s'");
    }
}
