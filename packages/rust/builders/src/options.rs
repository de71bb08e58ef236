//! Declarative option schemas.
//!
//! Each builder kind (and the tool-wide `settings` block) describes the keys
//! it accepts as a static [`OptionSpec`] table. [`OptionValues::validate`]
//! checks a raw mapping against such a table once, at construction, so adding
//! an option is a table change rather than new control flow.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde_yaml::{Mapping, Value};

use pkgdoc_shared::{PkgDocError, Result};

/// Shape a value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionShape {
    Bool,
    String,
    /// A string, or `null`.
    OptionalString,
    /// A sequence of strings.
    StringList,
}

impl OptionShape {
    fn describe(&self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::String => "a string",
            Self::OptionalString => "a string or null",
            Self::StringList => "a list of strings",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_bool(),
            Self::String => value.is_string(),
            Self::OptionalString => value.is_string() || value.is_null(),
            Self::StringList => value
                .as_sequence()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// One accepted key.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub key: &'static str,
    pub shape: OptionShape,
}

impl OptionSpec {
    pub const fn new(key: &'static str, shape: OptionShape) -> Self {
        Self { key, shape }
    }
}

/// Options that passed schema validation.
#[derive(Debug, Clone, Default)]
pub struct OptionValues {
    kind: String,
    values: BTreeMap<&'static str, Value>,
}

impl OptionValues {
    /// Validate `options` against `specs`; `kind` names the owner in errors.
    ///
    /// Unknown keys and mis-shaped values are configuration errors.
    pub fn validate(kind: &str, specs: &[OptionSpec], options: &Mapping) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (key, value) in options {
            let Some(key) = key.as_str() else {
                return Err(PkgDocError::UnknownOption {
                    kind: kind.to_string(),
                    key: format!("{key:?}"),
                });
            };
            let spec = specs
                .iter()
                .find(|spec| spec.key == key)
                .ok_or_else(|| PkgDocError::UnknownOption {
                    kind: kind.to_string(),
                    key: key.to_string(),
                })?;
            if !spec.shape.accepts(value) {
                return Err(PkgDocError::InvalidOption {
                    kind: kind.to_string(),
                    key: key.to_string(),
                    expected: spec.shape.describe().to_string(),
                });
            }
            values.insert(spec.key, value.clone());
        }
        Ok(Self {
            kind: kind.to_string(),
            values,
        })
    }

    /// Whether `key` was given at all, including as `null`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether `key` was given explicitly as `null`.
    pub fn is_null(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(Value::is_null)
    }

    /// String value of `key`, if present and not `null`.
    pub fn string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// String value of `key` as a directory below the output tree.
    ///
    /// Absolute paths and `..` components are configuration errors.
    pub fn relative_dir(&self, key: &str) -> Result<Option<String>> {
        let Some(value) = self.string(key) else {
            return Ok(None);
        };
        let contained = Path::new(&value)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(PkgDocError::InvalidOption {
                kind: self.kind.clone(),
                key: key.to_string(),
                expected: "a relative path inside the documentation tree".to_string(),
            });
        }
        Ok(Some(value))
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// String list value of `key`; empty when absent.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_sequence)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[OptionSpec] = &[
        OptionSpec::new("name", OptionShape::String),
        OptionSpec::new("source", OptionShape::OptionalString),
        OptionSpec::new("statements", OptionShape::StringList),
        OptionSpec::new("force", OptionShape::Bool),
    ];

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn accepts_known_keys() {
        let values = OptionValues::validate(
            "demo",
            SPECS,
            &mapping("{name: docs, source: null, statements: [A = 1, B = 2], force: true}"),
        )
        .unwrap();
        assert_eq!(values.string("name").as_deref(), Some("docs"));
        assert!(values.is_null("source"));
        assert!(values.contains("source"));
        assert_eq!(values.string("source"), None);
        assert_eq!(values.string_list("statements"), vec!["A = 1", "B = 2"]);
        assert_eq!(values.bool("force"), Some(true));
        assert!(!values.contains("missing"));
    }

    #[test]
    fn unknown_key_names_key_and_kind() {
        let err = OptionValues::validate("demo", SPECS, &mapping("{colour: blue}")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported key 'colour' for demo");
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let err =
            OptionValues::validate("demo", SPECS, &mapping("{statements: [1, 2]}")).unwrap_err();
        assert!(matches!(err, PkgDocError::InvalidOption { .. }));
        assert!(err.to_string().contains("a list of strings"));

        let err = OptionValues::validate("demo", SPECS, &mapping("{name: null}")).unwrap_err();
        assert!(err.to_string().contains("expected a string"));
    }

    #[test]
    fn relative_dir_stays_inside_the_tree() {
        let values = OptionValues::validate(
            "demo",
            SPECS,
            &mapping("{name: api/./html}"),
        )
        .unwrap();
        assert_eq!(values.relative_dir("name").unwrap().as_deref(), Some("api/./html"));
        assert_eq!(values.relative_dir("source").unwrap(), None);

        for escaping in ["/tmp/escaped", "../sibling", "api/../../up"] {
            let values = OptionValues::validate(
                "demo",
                SPECS,
                &mapping(&format!("{{name: '{escaping}'}}")),
            )
            .unwrap();
            let err = values.relative_dir("name").unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid value for 'name' for demo: expected a relative path inside the documentation tree"
            );
        }
    }
}
