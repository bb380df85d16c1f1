//! Per-scenario key/value state.
//!
//! Steps agree on keys by convention; the store only guarantees lifetime and
//! isolation. Values are tagged with [`ContextValue`] so reads are checked
//! rather than cast.

mod value;

pub use value::ContextValue;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of one scenario execution within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScenarioId(u64);

impl ScenarioId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Context lookup failures.
#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    /// No value is stored under the key.
    #[error("context has no value for '{key}'")]
    #[diagnostic(code(scenarist::context::missing_key))]
    MissingKey {
        /// Requested key.
        key: String,
    },
    /// The stored value has a different tag.
    #[error("context value '{key}' is {found}, not {expected}")]
    #[diagnostic(code(scenarist::context::type_mismatch))]
    TypeMismatch {
        /// Requested key.
        key: String,
        /// Tag the caller asked for.
        expected: &'static str,
        /// Tag actually stored.
        found: &'static str,
    },
    /// A record could not be decoded into the requested type.
    #[error("context record '{key}' does not decode: {source}")]
    #[diagnostic(code(scenarist::context::record_decode))]
    RecordDecode {
        /// Requested key.
        key: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A value could not be encoded as a record.
    #[error("value for '{key}' does not encode as a record: {source}")]
    #[diagnostic(code(scenarist::context::record_encode))]
    RecordEncode {
        /// Target key.
        key: String,
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },
    /// No context exists for the scenario.
    #[error("no active context for scenario {scenario}")]
    #[diagnostic(code(scenarist::context::no_active_scenario))]
    NoActiveScenario {
        /// Requested scenario.
        scenario: ScenarioId,
    },
}

/// Mutable state shared by the steps of one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    values: IndexMap<String, ContextValue>,
}

impl Context {
    /// Store `value` under `key`, returning any previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Serialise `value` and store it as a [`ContextValue::Record`].
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::RecordEncode`] when serialisation fails.
    pub fn insert_record<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), ContextError> {
        let key = key.into();
        let record = serde_json::to_value(value).map_err(|source| ContextError::RecordEncode {
            key: key.clone(),
            source,
        })?;
        self.values.insert(key, ContextValue::Record(record));
        Ok(())
    }

    /// Raw value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Whether `key` holds a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.shift_remove(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing or not text.
    pub fn text(&self, key: &str) -> Result<&str, ContextError> {
        match self.require(key)? {
            ContextValue::Text(text) => Ok(text),
            other => Err(mismatch(key, "text", other)),
        }
    }

    /// Integer stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing or not an integer.
    pub fn int(&self, key: &str) -> Result<i64, ContextError> {
        match self.require(key)? {
            ContextValue::Int(value) => Ok(*value),
            other => Err(mismatch(key, "int", other)),
        }
    }

    /// Integer stored under `key`, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] when the key holds another tag.
    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, ContextError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(ContextValue::Int(value)) => Ok(*value),
            Some(other) => Err(mismatch(key, "int", other)),
        }
    }

    /// Float stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing or not a float.
    pub fn float(&self, key: &str) -> Result<f64, ContextError> {
        match self.require(key)? {
            ContextValue::Float(value) => Ok(*value),
            other => Err(mismatch(key, "float", other)),
        }
    }

    /// Flag stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing or not a flag.
    pub fn flag(&self, key: &str) -> Result<bool, ContextError> {
        match self.require(key)? {
            ContextValue::Flag(value) => Ok(*value),
            other => Err(mismatch(key, "flag", other)),
        }
    }

    /// List stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing or not a list.
    pub fn list(&self, key: &str) -> Result<&[ContextValue], ContextError> {
        match self.require(key)? {
            ContextValue::List(items) => Ok(items),
            other => Err(mismatch(key, "list", other)),
        }
    }

    /// List of text values stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing, not a list, or holds
    /// a non-text element.
    pub fn text_list(&self, key: &str) -> Result<Vec<&str>, ContextError> {
        self.list(key)?
            .iter()
            .map(|item| match item {
                ContextValue::Text(text) => Ok(text.as_str()),
                other => Err(mismatch(key, "text list", other)),
            })
            .collect()
    }

    /// Structured record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing or not a record.
    pub fn record(&self, key: &str) -> Result<&serde_json::Value, ContextError> {
        match self.require(key)? {
            ContextValue::Record(value) => Ok(value),
            other => Err(mismatch(key, "record", other)),
        }
    }

    /// Decode the record stored under `key` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the key is missing, not a record, or the
    /// record does not decode.
    pub fn record_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
        let record = self.record(key)?;
        T::deserialize(record).map_err(|source| ContextError::RecordDecode {
            key: key.to_owned(),
            source,
        })
    }

    fn require(&self, key: &str) -> Result<&ContextValue, ContextError> {
        self.values.get(key).ok_or_else(|| ContextError::MissingKey {
            key: key.to_owned(),
        })
    }
}

fn mismatch(key: &str, expected: &'static str, found: &ContextValue) -> ContextError {
    ContextError::TypeMismatch {
        key: key.to_owned(),
        expected,
        found: found.tag(),
    }
}

/// Owner of every live scenario context.
#[derive(Debug, Default)]
pub struct ContextStore {
    active: HashMap<ScenarioId, Context>,
}

impl ContextStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty context for `scenario`, replacing any stale one.
    pub fn create(&mut self, scenario: ScenarioId) -> &mut Context {
        if self.active.contains_key(&scenario) {
            tracing::warn!(%scenario, "replacing context that was never destroyed");
        }
        self.active.insert(scenario, Context::default());
        self.active.entry(scenario).or_default()
    }

    /// Context of `scenario`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NoActiveScenario`] when none was created.
    pub fn get(&self, scenario: ScenarioId) -> Result<&Context, ContextError> {
        self.active
            .get(&scenario)
            .ok_or(ContextError::NoActiveScenario { scenario })
    }

    /// Mutable context of `scenario`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NoActiveScenario`] when none was created.
    pub fn get_mut(&mut self, scenario: ScenarioId) -> Result<&mut Context, ContextError> {
        self.active
            .get_mut(&scenario)
            .ok_or(ContextError::NoActiveScenario { scenario })
    }

    /// Discard the context of `scenario`, returning it if it existed.
    pub fn destroy(&mut self, scenario: ScenarioId) -> Option<Context> {
        self.active.remove(&scenario)
    }

    /// Number of live contexts.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
