//! Upload result objects passed between the engine and the coordinator.

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Returns whether a JSON value counts as "set" the way loosely typed
/// upload servers use it.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Result object of an upload attempt.
///
/// Starts as whatever the storage layer reported and accumulates the fields of
/// the confirmation response.
#[derive(Debug, Clone, Default, PartialEq, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadResult(Map<String, Value>);

impl UploadResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result carrying only a `success` flag.
    pub fn with_success(success: bool) -> Self {
        let mut result = Self::new();
        result.set("success", success);
        result
    }

    /// Returns whether `success` is truthy.
    pub fn is_success(&self) -> bool {
        self.0.get("success").is_some_and(is_truthy)
    }

    /// Returns whether the server demanded a full re-upload.
    pub fn is_reset(&self) -> bool {
        self.0.get("reset").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Returns the `error` message, if one is set.
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Returns a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Copies every field of `other` into this result, overwriting on conflict.
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
