//! External tool invocation.
//!
//! Builders never spawn processes directly; they describe a [`ToolInvocation`]
//! and hand it to a [`CommandRunner`]. [`SystemRunner`] runs it for real,
//! blocking until the tool exits.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use pkgdoc_shared::{PkgDocError, Result};

/// A single external tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Working directory for the tool.
    pub cwd: PathBuf,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Positional argument `index` as a path.
    pub fn path_arg(&self, index: usize) -> Option<&Path> {
        self.args.get(index).map(Path::new)
    }

    /// Command line for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a tool exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExit {
    /// Exit code, or `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ToolExit {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ToolExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "return code {code}"),
            None => f.write_str("termination by signal"),
        }
    }
}

/// Runs external tools. Replaced by fakes in tests.
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion. Failing to start the tool is an error;
    /// a non-zero exit is reported through [`ToolExit`].
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolExit>;
}

/// Runs tools as child processes sharing this process's stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolExit> {
        debug!(
            command = %invocation.command_line(),
            cwd = %invocation.cwd.display(),
            "spawning tool"
        );
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .status()
            .map_err(|e| PkgDocError::ToolSpawn {
                tool: invocation.program.clone(),
                source: e,
            })?;
        Ok(ToolExit {
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_rendering() {
        let invocation = ToolInvocation::new("sphinx-build", "/tmp")
            .arg("/tmp/src")
            .arg(Path::new("/tmp/out"));
        assert_eq!(invocation.command_line(), "sphinx-build /tmp/src /tmp/out");
        assert_eq!(invocation.path_arg(1), Some(Path::new("/tmp/out")));
        assert_eq!(invocation.path_arg(2), None);
    }

    #[test]
    fn exit_display() {
        assert_eq!(ToolExit::from_code(2).to_string(), "return code 2");
        assert!(!ToolExit { code: None }.success());
        assert!(ToolExit::from_code(0).success());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_codes() {
        let cwd = std::env::temp_dir();
        let ok = SystemRunner.run(&ToolInvocation::new("true", &cwd)).unwrap();
        assert!(ok.success());
        let failed = SystemRunner.run(&ToolInvocation::new("false", &cwd)).unwrap();
        assert_eq!(failed.code, Some(1));
    }

    #[test]
    fn missing_tool_is_a_spawn_error() {
        let err = SystemRunner
            .run(&ToolInvocation::new(
                "pkgdoc-definitely-not-installed",
                std::env::temp_dir(),
            ))
            .unwrap_err();
        assert!(matches!(err, PkgDocError::ToolSpawn { .. }));
    }
}
