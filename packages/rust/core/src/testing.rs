//! Test fixtures: packages on disk and a fake tool runner.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pkgdoc_builders::{BuildServices, CommandRunner, SilentObserver, ToolExit, ToolInvocation};
use pkgdoc_shared::{Package, Result};
use pkgdoc_xref::FsCrossReferenceIndex;

/// A fresh directory under the system temp dir.
pub(crate) fn temp_root(label: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("pkgdoc-core-{label}-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

pub(crate) fn manifest(name: &str, build_type: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<package format="3">
  <name>{name}</name>
  <version>1.4.2</version>
  <description>A demo package</description>
  <maintainer email="ada@example.com">Ada</maintainer>
  <license>Apache-2.0</license>
  <depend>rclcpp</depend>
  <export>
    <build_type>{build_type}</build_type>
  </export>
</package>
"#
    )
}

/// Write `demo_pkg` under `root` and read it back.
pub(crate) fn demo_package(root: &Path, build_type: &str) -> Package {
    let directory = root.join("demo_pkg");
    std::fs::create_dir_all(&directory).unwrap();
    std::fs::write(directory.join("package.xml"), manifest("demo_pkg", build_type)).unwrap();
    pkgdoc_manifest::read_package(&directory).unwrap()
}

/// Services whose runner must never be reached.
pub(crate) fn services(root: &Path) -> BuildServices {
    BuildServices {
        xref: Arc::new(FsCrossReferenceIndex::new(root.join("cross_reference"))),
        runner: Arc::new(FakeRunner::new()),
        observer: Arc::new(SilentObserver),
    }
}

/// Imitates the output layout of doxygen and sphinx-build.
pub(crate) struct FakeRunner {
    calls: Mutex<Vec<String>>,
    sphinx_exit: i32,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            sphinx_exit: 0,
        }
    }

    pub fn sphinx_exit(mut self, code: i32) -> Self {
        self.sphinx_exit = code;
        self
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolExit> {
        self.calls.lock().unwrap().push(invocation.program.clone());
        match invocation.program.as_str() {
            "doxygen" => {
                let doxyfile = invocation.cwd.join(invocation.path_arg(0).unwrap());
                let text = std::fs::read_to_string(doxyfile).unwrap();
                let value = |key: &str| {
                    text.lines()
                        .filter(|line| line.starts_with(key))
                        .filter_map(|line| line.split_once('='))
                        .map(|(_, v)| v.trim().trim_matches('"').to_string())
                        .last()
                        .unwrap()
                };
                let output = PathBuf::from(value("OUTPUT_DIRECTORY"));
                std::fs::create_dir_all(output.join("html")).unwrap();
                std::fs::create_dir_all(output.join("xml")).unwrap();
                std::fs::write(output.join("html/index.html"), "<html>api</html>").unwrap();
                std::fs::write(output.join("xml/index.xml"), "<doxygenindex/>").unwrap();
                std::fs::write(value("GENERATE_TAGFILE"), "<tagfile/>").unwrap();
                Ok(ToolExit::from_code(0))
            }
            "sphinx-build" if self.sphinx_exit != 0 => Ok(ToolExit::from_code(self.sphinx_exit)),
            "sphinx-build" => {
                let source = invocation.path_arg(0).unwrap();
                let output = invocation.path_arg(1).unwrap();
                let index = std::fs::read_to_string(source.join("index.rst")).unwrap_or_default();
                std::fs::create_dir_all(output).unwrap();
                std::fs::write(output.join("index.html"), format!("<pre>{index}</pre>")).unwrap();
                std::fs::write(output.join("objects.inv"), "# Sphinx inventory version 2").unwrap();
                Ok(ToolExit::from_code(0))
            }
            _ => Ok(ToolExit::from_code(0)),
        }
    }
}
