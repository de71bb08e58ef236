//! Error types for pkgdoc.
//!
//! Library crates use [`PkgDocError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pkgdoc operations.
#[derive(Debug, thiserror::Error)]
pub enum PkgDocError {
    /// Application configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed per-package documentation configuration.
    #[error("invalid configuration in {path:?}: {message}")]
    ConfigFormat { path: PathBuf, message: String },

    /// A builder entry named a kind that is not registered.
    #[error("unknown builder '{kind}', supported builders: [{supported}]")]
    UnknownBuilder { kind: String, supported: String },

    /// An options mapping contained a key the schema does not allow.
    #[error("unsupported key '{key}' for {kind}")]
    UnknownOption { kind: String, key: String },

    /// An option value had the wrong shape.
    #[error("invalid value for '{key}' for {kind}: expected {expected}")]
    InvalidOption {
        kind: String,
        key: String,
        expected: String,
    },

    /// An input the user named explicitly does not exist.
    #[error("missing input: {message}")]
    MissingInput { message: String },

    /// The package manifest could not be read or understood.
    #[error("manifest error at {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// An external tool could not be started.
    #[error("failed to run {tool}: {source}")]
    ToolSpawn {
        tool: String,
        source: std::io::Error,
    },

    /// An external tool exited unsuccessfully where that is fatal.
    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: String },

    /// Two builders wrote the same path into the staging tree.
    #[error(
        "file collision integrating output from builder '{second}': '{path}' was already written by builder '{first}'"
    )]
    OutputCollision {
        path: String,
        first: String,
        second: String,
    },

    /// The cross-reference index holds more than one entry of a kind for a package.
    #[error("duplicate {kind} entry for package '{package}' in the cross-reference index")]
    DuplicateEntry { package: String, kind: String },

    /// Any other cross-reference index failure.
    #[error("cross-reference error: {0}")]
    CrossReference(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PkgDocError>;

impl PkgDocError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a configuration format error for the file at `path`.
    pub fn config_format(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ConfigFormat {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a missing-input error from any displayable message.
    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput {
            message: msg.into(),
        }
    }

    /// Create a manifest error for the file at `path`.
    pub fn manifest(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was raised while reading configuration, before any
    /// output state was touched.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::ConfigFormat { .. }
                | Self::UnknownBuilder { .. }
                | Self::UnknownOption { .. }
                | Self::InvalidOption { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PkgDocError::UnknownBuilder {
            kind: "latex".into(),
            supported: "doxygen, sphinx".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown builder 'latex', supported builders: [doxygen, sphinx]"
        );

        let err = PkgDocError::OutputCollision {
            path: "a/b.html".into(),
            first: "one (sphinx)".into(),
            second: "two (sphinx)".into(),
        };
        let message = err.to_string();
        assert!(message.contains("a/b.html"));
        assert!(message.contains("one (sphinx)"));
        assert!(message.contains("two (sphinx)"));
    }

    #[test]
    fn configuration_errors_are_classified() {
        let err = PkgDocError::UnknownOption {
            kind: "doxygen".into(),
            key: "colour".into(),
        };
        assert!(err.is_configuration_error());
        assert!(!PkgDocError::missing_input("doc/").is_configuration_error());
    }
}
