//! Sphinx `conf.py` generation.
//!
//! Every value derived from the package or the filesystem goes through
//! [`PyValue`], which renders a Python literal. The wrapping `conf.py` is a
//! block of such assignments followed by fixed logic that only reads them,
//! so no package metadata is ever spliced into Python source text.

use std::fmt::Write as _;

/// A Python literal.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<PyValue>),
    Tuple(Vec<PyValue>),
    /// Dict with string keys, in insertion order.
    Dict(Vec<(String, PyValue)>),
}

impl PyValue {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn str_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    /// `Str` when `Some`, `None` otherwise.
    pub fn optional_str(value: Option<impl Into<String>>) -> Self {
        value.map_or(Self::None, |v| Self::Str(v.into()))
    }

    pub fn render(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(value) => value.to_string(),
            Self::Str(value) => quote(value),
            Self::List(items) => format!("[{}]", render_items(items)),
            Self::Tuple(items) if items.len() == 1 => format!("({},)", items[0].render()),
            Self::Tuple(items) => format!("({})", render_items(items)),
            Self::Dict(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", quote(key), value.render()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

fn render_items(items: &[PyValue]) -> String {
    items
        .iter()
        .map(PyValue::render)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Single-quoted Python string literal.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(quoted, "\\x{:02x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Ordered `conf.py` statements.
#[derive(Debug, Default, Clone)]
pub struct PyConfWriter {
    lines: Vec<String>,
}

impl PyConfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `## text`
    pub fn comment(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            self.lines.push(format!("## {line}"));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    /// `name = <literal>`
    pub fn assign(&mut self, name: &str, value: &PyValue) -> &mut Self {
        self.lines.push(format!("{name} = {}", value.render()));
        self
    }

    /// Fixed source text, emitted as is.
    pub fn source(&mut self, text: &str) -> &mut Self {
        self.lines.extend(text.lines().map(str::to_string));
        self
    }

    pub fn finish(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

// ---------------------------------------------------------------------------
// Default project configuration
// ---------------------------------------------------------------------------

/// Values substituted into the default `__conf.py`.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub name: String,
    pub licenses: Vec<String>,
    pub authors: Vec<String>,
    pub release: String,
    pub version: String,
}

const DEFAULT_CONF_SETTINGS: &str = r#"
# -- Options for pkgdoc ------------------------------------------------------

## These settings are read by pkgdoc and ignored when Sphinx runs on its own.
## The commented values are the defaults.
pkgdoc_settings = {
    ## Add breathe and point it at the Doxygen XML output.
    # 'enable_breathe': True,

    ## Add exhale to generate class and namespace pages from Doxygen output.
    # 'enable_exhale': True,

    ## Options for breathe directives emitted by exhale. An empty dict keeps
    ## the breathe defaults.
    # 'exhale_specs_mapping': {},

    # 'enable_autodoc': True,
    # 'enable_intersphinx': True,

    ## Force the theme shared by every generated site.
    # 'override_theme': True,

    ## Add inventories of already documented dependencies to
    ## intersphinx_mapping. When disabled they are still available as
    ## `found_intersphinx_mappings`.
    # 'automatically_extend_intersphinx_mapping': True,

    # 'support_markdown': True,
}"#;

/// Default `__conf.py` for packages that do not ship one.
pub fn default_conf_py(project: &ProjectInfo) -> String {
    let mut writer = PyConfWriter::new();
    writer
        .comment("Generated by pkgdoc.")
        .blank()
        .source("# Configuration file for the Sphinx documentation builder.")
        .source("# https://www.sphinx-doc.org/en/master/usage/configuration.html")
        .blank()
        .source("# -- Project information -----------------------------------------------------")
        .blank()
        .assign("project", &PyValue::str(&project.name))
        .assign(
            "copyright",
            &PyValue::str(format!(
                "The <{}> Contributors. License: {}",
                project.name,
                project.licenses.join(", ")
            )),
        )
        .assign("author", &PyValue::str(project.authors.join(", ")))
        .assign("release", &PyValue::str(&project.release))
        .assign("version", &PyValue::str(&project.version))
        .blank()
        .source("# -- General configuration ---------------------------------------------------")
        .blank()
        .assign("extensions", &PyValue::str_list(["sphinx_rtd_theme"]))
        .assign("templates_path", &PyValue::str_list(["_templates"]))
        .assign("exclude_patterns", &PyValue::List(Vec::new()))
        .assign("master_doc", &PyValue::str("index"))
        .assign(
            "source_suffix",
            &PyValue::Dict(vec![
                (".rst".into(), PyValue::str("restructuredtext")),
                (".md".into(), PyValue::str("markdown")),
                (".markdown".into(), PyValue::str("markdown")),
            ]),
        )
        .blank()
        .source("# -- Options for HTML output -------------------------------------------------")
        .blank()
        .assign("html_theme", &PyValue::str("sphinx_rtd_theme"))
        .assign(
            "html_theme_options",
            &PyValue::Dict(vec![
                ("collapse_navigation".into(), PyValue::Bool(false)),
                ("sticky_navigation".into(), PyValue::Bool(true)),
                ("navigation_depth".into(), PyValue::Int(4)),
                ("includehidden".into(), PyValue::Bool(true)),
                ("titles_only".into(), PyValue::Bool(false)),
            ]),
        )
        .source(DEFAULT_CONF_SETTINGS);
    writer.finish()
}

// ---------------------------------------------------------------------------
// Wrapping configuration
// ---------------------------------------------------------------------------

/// Values the wrapping `conf.py` hands to its fixed logic.
#[derive(Debug, Clone)]
pub struct WrappingConf {
    pub project: ProjectInfo,
    /// Absolute path of the `__conf.py` to exec.
    pub user_conf_py: String,
    pub python_src_directory: Option<String>,
    /// Runtime and documentation dependencies, candidates for mock imports.
    pub exec_depends: Vec<String>,
    pub build_type: String,
    pub always_run_doxygen: bool,
    pub wrapped_sphinx_directory: String,
    /// `(project name, doxygen xml directory)`; present when doxygen ran.
    pub breathe_project: Option<(String, String)>,
    /// `(package, url, inventory path)` for each sibling inventory.
    pub intersphinx: Vec<(String, String, String)>,
}

/// Extensions a user `conf.py` may enable.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "sphinx.ext.autodoc",
    "sphinx.ext.autosectionlabel",
    "sphinx.ext.autosummary",
    "sphinx.ext.coverage",
    "sphinx.ext.doctest",
    "sphinx.ext.duration",
    "sphinx.ext.extlinks",
    "sphinx.ext.githubpages",
    "sphinx.ext.graphviz",
    "sphinx.ext.ifconfig",
    "sphinx.ext.imgconverter",
    "sphinx.ext.inheritance_diagram",
    "sphinx.ext.intersphinx",
    "sphinx.ext.linkcode",
    "sphinx.ext.napoleon",
    "sphinx.ext.todo",
    "sphinx.ext.viewcode",
    "sphinx.ext.imgmath",
    "sphinx.ext.mathjax",
    "breathe",
    "exhale",
    "myst_parser",
    "sphinx_rtd_theme",
];

const WRAPPING_LOGIC: &str = r#"
import os
import sys

if pkgdoc_python_src_directory is not None:
    sys.path.insert(0, os.path.abspath(os.path.join(pkgdoc_python_src_directory, '..')))

## Bring the user's settings into this file.
exec(open(pkgdoc_user_conf_py).read())

def ensure_global(name, default):
    if name not in globals():
        globals()[name] = default

ensure_global('pkgdoc_settings', {})
ensure_global('extensions', [])
ensure_global('project', pkgdoc_project)
ensure_global('author', pkgdoc_author)
ensure_global('release', pkgdoc_release)
ensure_global('version', pkgdoc_version)

for extension in extensions[:]:
    if extension not in pkgdoc_allowed_extensions:
        print(f'[pkgdoc] *** Warning *** removing extension "{extension}", not supported')
        extensions.remove(extension)
if extensions:
    print(f'[pkgdoc] user conf.py specified allowed extensions: {extensions}')

if pkgdoc_settings.get('enable_autodoc', True):
    print('[pkgdoc] enabling autodoc', file=sys.stderr)
    extensions.append('sphinx.ext.autodoc')

    import importlib
    pkgs_to_mock = []
    for exec_depend in pkgdoc_exec_depends:
        exec_depend = exec_depend.split('python3-')[-1]
        try:
            importlib.import_module(exec_depend)
        except ImportError:
            pkgs_to_mock.append(exec_depend)
    ensure_global('autodoc_mock_imports', [])
    autodoc_mock_imports = list(autodoc_mock_imports) + [
        p for p in pkgs_to_mock if p not in autodoc_mock_imports]

if pkgdoc_settings.get('enable_intersphinx', True):
    print('[pkgdoc] enabling intersphinx', file=sys.stderr)
    extensions.append('sphinx.ext.intersphinx')

if pkgdoc_settings.get('enable_breathe', pkgdoc_did_run_doxygen):
    print('[pkgdoc] enabling breathe', file=sys.stderr)
    if not pkgdoc_did_run_doxygen:
        raise RuntimeError(
            "Cannot enable the 'breathe' extension if doxygen did not run. "
            "Enable 'always_run_doxygen' for packages without compiled sources.")
    ensure_global('breathe_projects', {})
    breathe_projects.update(pkgdoc_breathe_projects)
    if breathe_projects:
        extensions.append('breathe')
        breathe_default_project = next(iter(breathe_projects.keys()))

if pkgdoc_settings.get('enable_exhale', pkgdoc_did_run_doxygen):
    print('[pkgdoc] enabling exhale', file=sys.stderr)
    if not pkgdoc_did_run_doxygen:
        raise RuntimeError(
            "Cannot enable the 'exhale' extension if doxygen did not run. "
            "Enable 'always_run_doxygen' for packages without compiled sources.")
    extensions.append('exhale')
    ensure_global('exhale_args', {})

    default_exhale_specs_mapping = {
        'page': [':content-only:'],
        **dict.fromkeys(
            ['class', 'struct'],
            [':members:', ':protected-members:', ':undoc-members:']),
    }
    exhale_specs_mapping = pkgdoc_settings.get(
        'exhale_specs_mapping', default_exhale_specs_mapping)

    from exhale import utils
    exhale_args.update({
        'containmentFolder': os.path.join(pkgdoc_wrapped_sphinx_directory, 'generated'),
        'rootFileName': 'index.rst',
        'rootFileTitle': 'C++ API',
        'doxygenStripFromPath': '..',
        'createTreeView': True,
        'fullToctreeMaxDepth': 1,
        'unabridgedOrphanKinds': [],
        'fullApiSubSectionTitle': 'Full C++ API',
        'exhaleExecutesDoxygen': False,
        'lexerMapping': {r'.*\.(md|markdown)$': 'md'},
        'customSpecificationsMapping': utils.makeCustomSpecificationsMapping(
            lambda kind: exhale_specs_mapping.get(kind, [])),
    })

if pkgdoc_settings.get('override_theme', True):
    extensions.append('sphinx_rtd_theme')
    html_theme = 'sphinx_rtd_theme'
    print(f"[pkgdoc] overriding theme to be '{html_theme}'", file=sys.stderr)

found_intersphinx_mappings = pkgdoc_intersphinx_mapping
if pkgdoc_settings.get('automatically_extend_intersphinx_mapping', True):
    print('[pkgdoc] extending intersphinx mapping', file=sys.stderr)
    if 'sphinx.ext.intersphinx' not in extensions:
        raise RuntimeError(
            "Cannot extend intersphinx mapping if 'sphinx.ext.intersphinx' "
            "has not been added to the extensions")
    ensure_global('intersphinx_mapping', {})
    for name, target in found_intersphinx_mappings.items():
        intersphinx_mapping.setdefault(name, target)

if pkgdoc_settings.get('support_markdown', True):
    print('[pkgdoc] adding markdown parser', file=sys.stderr)
    extensions.append('myst_parser')"#;

/// The `conf.py` Sphinx is run with: execs the user's `__conf.py`, then
/// extends it.
pub fn wrapping_conf_py(conf: &WrappingConf) -> String {
    let breathe = match &conf.breathe_project {
        Some((name, directory)) => PyValue::Dict(vec![(name.clone(), PyValue::str(directory))]),
        None => PyValue::Dict(Vec::new()),
    };
    let intersphinx = PyValue::Dict(
        conf.intersphinx
            .iter()
            .map(|(package, url, inventory)| {
                (
                    package.clone(),
                    PyValue::Tuple(vec![PyValue::str(url), PyValue::str(inventory)]),
                )
            })
            .collect(),
    );

    let mut writer = PyConfWriter::new();
    writer
        .comment(
            "Generated by pkgdoc.\n\
             Runs the user defined (or default) conf.py, then extends its settings\n\
             for breathe, exhale and intersphinx, among other things.",
        )
        .blank()
        .assign("pkgdoc_project", &PyValue::str(&conf.project.name))
        .assign("pkgdoc_author", &PyValue::str(conf.project.authors.join(", ")))
        .assign("pkgdoc_release", &PyValue::str(&conf.project.release))
        .assign("pkgdoc_version", &PyValue::str(&conf.project.version))
        .assign("pkgdoc_user_conf_py", &PyValue::str(&conf.user_conf_py))
        .assign(
            "pkgdoc_python_src_directory",
            &PyValue::optional_str(conf.python_src_directory.clone()),
        )
        .assign("pkgdoc_exec_depends", &PyValue::str_list(conf.exec_depends.clone()))
        .assign("pkgdoc_build_type", &PyValue::str(&conf.build_type))
        .assign("pkgdoc_always_run_doxygen", &PyValue::Bool(conf.always_run_doxygen))
        .assign("pkgdoc_did_run_doxygen", &PyValue::Bool(conf.breathe_project.is_some()))
        .assign(
            "pkgdoc_wrapped_sphinx_directory",
            &PyValue::str(&conf.wrapped_sphinx_directory),
        )
        .assign("pkgdoc_breathe_projects", &breathe)
        .assign("pkgdoc_intersphinx_mapping", &intersphinx)
        .assign(
            "pkgdoc_allowed_extensions",
            &PyValue::str_list(ALLOWED_EXTENSIONS.iter().copied()),
        )
        .source(WRAPPING_LOGIC);
    writer.finish()
}
