//! Build progress observation.
//!
//! The pipeline and builders report progress through an explicit
//! [`BuildObserver`] instead of process-wide state, so front-ends can render
//! it and tests can capture it.

use std::path::Path;

use crate::builder::BuilderKind;
use crate::runner::{ToolExit, ToolInvocation};

/// Progress callback for a package build.
pub trait BuildObserver: Send + Sync {
    /// A builder is about to run.
    fn builder_started(&self, name: &str, kind: BuilderKind);
    /// An external tool is about to run.
    fn tool_started(&self, invocation: &ToolInvocation);
    /// An external tool exited.
    fn tool_finished(&self, invocation: &ToolInvocation, exit: ToolExit);
    /// A builder finished; `output` is `None` when it produced nothing.
    fn builder_finished(&self, name: &str, kind: BuilderKind, output: Option<&Path>);
    /// A non-fatal problem worth surfacing to the user.
    fn warning(&self, message: &str);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl BuildObserver for SilentObserver {
    fn builder_started(&self, _name: &str, _kind: BuilderKind) {}
    fn tool_started(&self, _invocation: &ToolInvocation) {}
    fn tool_finished(&self, _invocation: &ToolInvocation, _exit: ToolExit) {}
    fn builder_finished(&self, _name: &str, _kind: BuilderKind, _output: Option<&Path>) {}
    fn warning(&self, _message: &str) {}
}
