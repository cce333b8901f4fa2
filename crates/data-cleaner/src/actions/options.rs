//! Typed access to `action_options`.
//!
//! Every accessor names the action and the option in its error, so a
//! malformed description fails with a message the caller can act on.

use crate::error::{CleanerError, Result};
use crate::types::ActionDescription;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Read-only view over an action's options.
#[derive(Debug, Clone, Copy)]
pub struct ActionOptions<'a> {
    action: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> ActionOptions<'a> {
    pub fn new(action: &'a str, map: &'a Map<String, Value>) -> Self {
        Self { action, map }
    }

    /// Options of an action description.
    pub fn of(description: &'a ActionDescription) -> Self {
        Self::new(description.action_type.as_str(), &description.action_options)
    }

    /// Re-label the view, e.g. with a UDF name.
    pub fn for_action(self, action: &'a str) -> Self {
        Self { action, ..self }
    }

    pub fn action(&self) -> &'a str {
        self.action
    }

    pub fn map(&self) -> &'a Map<String, Value> {
        self.map
    }

    /// Raw value; JSON `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn missing(&self, key: &str) -> CleanerError {
        CleanerError::missing_option(self.action, key)
    }

    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> CleanerError {
        CleanerError::invalid_option(self.action, key, reason)
    }

    pub fn str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {}", other))),
        }
    }

    pub fn required_str(&self, key: &str) -> Result<&'a str> {
        self.str(key)?.ok_or_else(|| self.missing(key))
    }

    /// A number, or a string holding one.
    pub fn f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(key, format!("'{}' is not a number", s))),
            Some(other) => Err(self.invalid(key, format!("expected a number, got {}", other))),
        }
    }

    pub fn i64(&self, key: &str) -> Result<Option<i64>> {
        match self.f64(key)? {
            None => Ok(None),
            Some(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
            Some(v) => Err(self.invalid(key, format!("{} is not an integer", v))),
        }
    }

    pub fn usize(&self, key: &str) -> Result<Option<usize>> {
        match self.i64(key)? {
            None => Ok(None),
            Some(v) => usize::try_from(v)
                .map(Some)
                .map_err(|_| self.invalid(key, format!("{} is negative", v))),
        }
    }

    /// A boolean, or one of the strings `true`/`false`.
    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(self.invalid(key, format!("expected a boolean, got {}", other))),
        }
    }

    /// A list of strings; a single string is a one-element list.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.invalid(key, format!("expected strings, got {}", other))),
                })
                .collect(),
            Some(other) => Err(self.invalid(key, format!("expected a list, got {}", other))),
        }
    }

    /// A list of booleans; a single boolean is a one-element list.
    pub fn bool_list(&self, key: &str) -> Result<Vec<bool>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Bool(b)) => Ok(vec![*b]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_bool()
                        .ok_or_else(|| self.invalid(key, format!("expected booleans, got {}", item)))
                })
                .collect(),
            Some(other) => Err(self.invalid(key, format!("expected a list, got {}", other))),
        }
    }

    /// Deserialize the whole option map into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.map.clone()))
            .map_err(|e| self.invalid("action_options", e.to_string()))
    }
}
