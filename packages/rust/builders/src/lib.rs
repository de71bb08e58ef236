//! Builder jobs for pkgdoc.
//!
//! A package's documentation is produced by an ordered list of builders, each
//! created from one configuration entry:
//!
//! - [`DoxygenBuilder`] extracts the C/C++ API and publishes a tag file
//! - [`SphinxBuilder`] assembles and builds the documentation site and
//!   publishes an inventory
//!
//! Builders share a read-only [`BuildContext`] and reach the outside world only
//! through its services: the cross-reference store, a [`CommandRunner`] and a
//! [`BuildObserver`].

pub mod builder;
pub mod context;
pub mod doxyfile;
pub mod doxygen;
pub mod observer;
pub mod options;
pub mod runner;
pub mod sphinx;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{Builder, BuilderKind, SUPPORTED_BUILDERS, create_builder};
pub use context::{BuildContext, BuildServices, SETTINGS_SPEC, ToolSettings};
pub use doxyfile::DoxyfileWriter;
pub use doxygen::{DOXYGEN_OPTIONS, DoxygenBuilder};
pub use observer::{BuildObserver, SilentObserver};
pub use options::{OptionShape, OptionSpec, OptionValues};
pub use runner::{CommandRunner, SystemRunner, ToolExit, ToolInvocation};
pub use sphinx::{SPHINX_OPTIONS, SphinxBuilder};
