//! Wire form of one decided action

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{action, details}` as produced by the decision service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ActionStep {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            details: Map::new(),
        }
    }

    /// Add a detail field
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// A detail field as a string, if present and a string
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// Parse a decision value into a step
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}
