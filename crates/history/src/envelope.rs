//! Uniform success/error result of every action
//!
//! On the wire an envelope is a flat JSON object keyed by `status`:
//! `{"status":"error","message":"..."}` or
//! `{"status":"success","stdout":"..."}`. The error variant always carries
//! a message; a success may carry one as an ordinary field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub enum ResultEnvelope {
    Success {
        fields: Map<String, Value>,
    },
    Error {
        message: String,
        fields: Map<String, Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Success,
    Error,
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<RawEnvelope> for ResultEnvelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, String> {
        let RawEnvelope {
            status,
            message,
            mut fields,
        } = raw;
        match status {
            Status::Success => {
                if let Some(message) = message {
                    fields.insert("message".to_string(), Value::String(message));
                }
                Ok(ResultEnvelope::Success { fields })
            }
            Status::Error => {
                let message = message.ok_or("error envelope without a message")?;
                Ok(ResultEnvelope::Error { message, fields })
            }
        }
    }
}

impl From<ResultEnvelope> for RawEnvelope {
    fn from(envelope: ResultEnvelope) -> Self {
        match envelope {
            ResultEnvelope::Success { mut fields } => {
                let message = match fields.remove("message") {
                    Some(Value::String(message)) => Some(message),
                    Some(other) => {
                        fields.insert("message".to_string(), other);
                        None
                    }
                    None => None,
                };
                RawEnvelope {
                    status: Status::Success,
                    message,
                    fields,
                }
            }
            ResultEnvelope::Error { message, fields } => RawEnvelope {
                status: Status::Error,
                message: Some(message),
                fields,
            },
        }
    }
}

impl ResultEnvelope {
    pub fn success() -> Self {
        ResultEnvelope::Success { fields: Map::new() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResultEnvelope::Error {
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Attach a field. `status` is reserved and ignored, as is `message`
    /// on the error variant.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == "status" {
            return self;
        }
        match &mut self {
            ResultEnvelope::Success { fields } => {
                fields.insert(key, value.into());
            }
            ResultEnvelope::Error { fields, .. } => {
                if key != "message" {
                    fields.insert(key, value.into());
                }
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultEnvelope::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            ResultEnvelope::Success { .. } => "success",
            ResultEnvelope::Error { .. } => "error",
        }
    }

    /// The error message, or a success's `message` field
    pub fn message(&self) -> Option<&str> {
        match self {
            ResultEnvelope::Success { fields } => fields.get("message").and_then(Value::as_str),
            ResultEnvelope::Error { message, .. } => Some(message),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields().get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        match self {
            ResultEnvelope::Success { fields } | ResultEnvelope::Error { fields, .. } => fields,
        }
    }

    /// Flat JSON form
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
