//! Test fixtures: a package on disk, a fake tool runner and a recording observer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_yaml::Mapping;

use pkgdoc_shared::{Dependency, DependencyKind, Package, Person, Result, ToolCommands};
use pkgdoc_xref::FsCrossReferenceIndex;

use crate::builder::BuilderKind;
use crate::context::{BuildContext, BuildServices, ToolSettings};
use crate::observer::BuildObserver;
use crate::runner::{CommandRunner, ToolExit, ToolInvocation};

pub(crate) const BASE_URL: &str = "http://docs.example.org/p";

const MANIFEST: &str = r#"<?xml version="1.0"?>
<package format="3">
  <name>demo_pkg</name>
  <version>1.4.2</version>
  <description>A demo package</description>
  <maintainer email="ada@example.com">Ada</maintainer>
  <license>Apache-2.0</license>
  <depend>rclcpp</depend>
  <exec_depend>numpy</exec_depend>
  <test_depend>gtest</test_depend>
</package>
"#;

// ---------------------------------------------------------------------------
// FakeRunner
// ---------------------------------------------------------------------------

/// Records invocations and imitates the output layout of the real tools.
pub(crate) struct FakeRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    doxygen_exit: i32,
    sphinx_exit: i32,
    apidoc_exit: i32,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            doxygen_exit: 0,
            sphinx_exit: 0,
            apidoc_exit: 0,
        }
    }

    pub fn doxygen_exit(mut self, code: i32) -> Self {
        self.doxygen_exit = code;
        self
    }

    pub fn sphinx_exit(mut self, code: i32) -> Self {
        self.sphinx_exit = code;
        self
    }

    pub fn apidoc_exit(mut self, code: i32) -> Self {
        self.apidoc_exit = code;
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    fn fake_doxygen(invocation: &ToolInvocation) {
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
    }

    fn fake_sphinx_build(invocation: &ToolInvocation) {
        let source = invocation.path_arg(0).unwrap();
        let output = invocation.path_arg(1).unwrap();
        let index = std::fs::read_to_string(source.join("index.rst")).unwrap_or_default();
        std::fs::create_dir_all(output.join(".doctrees")).unwrap();
        std::fs::write(output.join(".doctrees/index.doctree"), "pickle").unwrap();
        std::fs::write(output.join("index.html"), format!("<pre>{index}</pre>")).unwrap();
        std::fs::write(output.join("objects.inv"), "# Sphinx inventory version 2").unwrap();
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolExit> {
        self.calls.lock().unwrap().push(invocation.clone());
        let code = match invocation.program.as_str() {
            "doxygen" => {
                if self.doxygen_exit == 0 {
                    Self::fake_doxygen(invocation);
                }
                self.doxygen_exit
            }
            "sphinx-build" => {
                if self.sphinx_exit == 0 {
                    Self::fake_sphinx_build(invocation);
                }
                self.sphinx_exit
            }
            "sphinx-apidoc" => self.apidoc_exit,
            _ => 127,
        };
        Ok(ToolExit::from_code(code))
    }
}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl BuildObserver for RecordingObserver {
    fn builder_started(&self, name: &str, kind: BuilderKind) {
        self.push(format!("start: {name} ({kind})"));
    }

    fn tool_started(&self, invocation: &ToolInvocation) {
        self.push(format!("tool: {}", invocation.program));
    }

    fn tool_finished(&self, invocation: &ToolInvocation, exit: ToolExit) {
        self.push(format!("exit: {} {exit}", invocation.program));
    }

    fn builder_finished(&self, name: &str, kind: BuilderKind, output: Option<&Path>) {
        self.push(format!("done: {name} ({kind}) {}", output.is_some()));
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning: {message}"));
    }
}

// ---------------------------------------------------------------------------
// TestBed
// ---------------------------------------------------------------------------

/// A `demo_pkg` package in a fresh temporary directory, removed on drop.
pub(crate) struct TestBed {
    pub root: PathBuf,
    pub package: Package,
    pub settings: ToolSettings,
    pub xref: Arc<FsCrossReferenceIndex>,
    pub runner: Arc<FakeRunner>,
    pub observer: Arc<RecordingObserver>,
}

impl TestBed {
    pub fn new(build_type: &str) -> Self {
        Self::with_settings(build_type, "{}")
    }

    pub fn with_settings(build_type: &str, settings: &str) -> Self {
        Self::with_runner(build_type, settings, FakeRunner::new())
    }

    pub fn with_runner(build_type: &str, settings: &str, runner: FakeRunner) -> Self {
        let root = std::env::temp_dir().join(format!("pkgdoc-builders-{}", uuid::Uuid::now_v7()));
        let package_dir = root.join("demo_pkg");
        std::fs::create_dir_all(&package_dir).unwrap();
        std::fs::write(package_dir.join("package.xml"), MANIFEST).unwrap();

        let settings: Mapping = serde_yaml::from_str(settings).unwrap();
        Self {
            xref: Arc::new(FsCrossReferenceIndex::new(root.join("cross_reference"))),
            package: demo_package(build_type, package_dir.join("package.xml")),
            settings: ToolSettings::from_mapping(&settings).unwrap(),
            runner: Arc::new(runner),
            observer: Arc::new(RecordingObserver::default()),
            root,
        }
    }

    pub fn package_dir(&self) -> PathBuf {
        self.root.join("demo_pkg")
    }

    pub fn xref_root(&self) -> PathBuf {
        self.root.join("cross_reference")
    }

    /// Write `content` to `relative` inside the package, creating parents.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.package_dir().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Replace the index handle, as a separate invocation would see it.
    pub fn reopen_xref(&mut self) {
        self.xref = Arc::new(FsCrossReferenceIndex::new(self.xref_root()));
    }

    pub fn context(&self) -> Arc<BuildContext> {
        Arc::new(BuildContext::new(
            self.package.clone(),
            self.package_dir().join("pkgdoc.yaml"),
            self.settings.clone(),
            BASE_URL,
            ToolCommands::default(),
            BuildServices {
                xref: self.xref.clone(),
                runner: self.runner.clone(),
                observer: self.observer.clone(),
            },
        ))
    }
}

impl Drop for TestBed {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

/// The package described by `MANIFEST`.
fn demo_package(build_type: &str, manifest_path: PathBuf) -> Package {
    let dependency = |name: &str, kind| Dependency {
        name: name.into(),
        kind,
    };
    Package {
        name: "demo_pkg".into(),
        version: "1.4.2".into(),
        description: "A demo package".into(),
        authors: Vec::new(),
        maintainers: vec![Person {
            name: "Ada".into(),
            email: Some("ada@example.com".into()),
        }],
        licenses: vec!["Apache-2.0".into()],
        urls: Vec::new(),
        dependencies: vec![
            dependency("rclcpp", DependencyKind::Depend),
            dependency("numpy", DependencyKind::Exec),
            dependency("gtest", DependencyKind::Test),
        ],
        declared_build_type: build_type.into(),
        metapackage: false,
        pkgdoc_config: None,
        manifest_path,
    }
}
