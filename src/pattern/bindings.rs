//! Typed values extracted from matched step text.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use super::PlaceholderKind;

/// A converted placeholder value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Text value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

impl ParamValue {
    /// The placeholder kind that produced this value.
    #[must_use]
    pub const fn kind(&self) -> PlaceholderKind {
        match self {
            Self::Str(_) => PlaceholderKind::Str,
            Self::Int(_) => PlaceholderKind::Int,
            Self::Float(_) => PlaceholderKind::Float,
        }
    }
}

/// Lookup failures on [`Bindings`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The template has no placeholder with this name.
    #[error("step has no placeholder named '{name}'")]
    Missing {
        /// Requested name.
        name: String,
    },
    /// The placeholder holds a different kind of value.
    #[error("placeholder '{name}' is {found}, not {expected}")]
    WrongKind {
        /// Requested name.
        name: String,
        /// Kind the caller asked for.
        expected: PlaceholderKind,
        /// Kind the template declares.
        found: PlaceholderKind,
    },
}

/// Ordered, named placeholder values of one bound step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bindings(IndexMap<String, ParamValue>);

impl Bindings {
    pub(crate) fn insert(&mut self, name: &str, value: ParamValue) {
        self.0.insert(name.to_owned(), value);
    }

    /// Value bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Values in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of bound placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the template had no placeholders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when the name is unknown or not a string.
    pub fn str(&self, name: &str) -> Result<&str, BindingError> {
        match self.lookup(name)? {
            ParamValue::Str(text) => Ok(text),
            other => Err(wrong_kind(name, PlaceholderKind::Str, other)),
        }
    }

    /// Integer bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when the name is unknown or not an integer.
    pub fn int(&self, name: &str) -> Result<i64, BindingError> {
        match self.lookup(name)? {
            ParamValue::Int(value) => Ok(*value),
            other => Err(wrong_kind(name, PlaceholderKind::Int, other)),
        }
    }

    /// Float bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when the name is unknown or not a float.
    pub fn float(&self, name: &str) -> Result<f64, BindingError> {
        match self.lookup(name)? {
            ParamValue::Float(value) => Ok(*value),
            other => Err(wrong_kind(name, PlaceholderKind::Float, other)),
        }
    }

    fn lookup(&self, name: &str) -> Result<&ParamValue, BindingError> {
        self.0.get(name).ok_or_else(|| BindingError::Missing {
            name: name.to_owned(),
        })
    }
}

fn wrong_kind(name: &str, expected: PlaceholderKind, found: &ParamValue) -> BindingError {
    BindingError::WrongKind {
        name: name.to_owned(),
        expected,
        found: found.kind(),
    }
}
