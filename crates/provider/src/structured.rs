//! Structured decision adapter
//!
//! Sends one instruction + context + schema to a chat provider in JSON mode
//! and returns the parsed, schema-conformant answer. No retries happen here;
//! retry policy belongs to the caller.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{schema, ChatParams, Message, Provider, ProviderError, ResponseFormat, Result};

/// One structured generation request
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub instruction: String,
    pub context: String,
    pub schema: Value,
}

impl StructuredRequest {
    pub fn new(instruction: impl Into<String>, context: impl Into<String>, schema: Value) -> Self {
        Self {
            instruction: instruction.into(),
            context: context.into(),
            schema,
        }
    }
}

/// External reasoning service returning schema-conformant JSON
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn generate(&self, request: StructuredRequest) -> Result<Value>;
}

/// [`DecisionService`] backed by a chat completions provider
pub struct StructuredClient<P: Provider> {
    provider: P,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl<P: Provider> StructuredClient<P> {
    pub fn new(provider: P) -> Self {
        let model = provider.default_model();
        Self {
            provider,
            model,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Build the single system message carrying query, context, schema and rules
pub fn build_system_message(request: &StructuredRequest) -> String {
    let schema =
        serde_json::to_string_pretty(&request.schema).unwrap_or_else(|_| request.schema.to_string());
    let context = if request.context.is_empty() {
        String::new()
    } else {
        format!("Context: {}\n", request.context)
    };

    format!(
        "You are an AI assistant that must answer ONLY with valid JSON.\n\n\
         Query: {}\n\
         {}\
         Required Response Schema:\n\
         {}\n\n\
         Rules:\n\
         1. Output MUST be valid JSON.\n\
         2. MUST follow the schema exactly (all required fields, correct types).\n\
         3. Do NOT include explanations, comments, or extra keys.\n",
        request.instruction, context, schema
    )
}

/// Parse raw model text and check it against the schema
pub fn parse_structured(content: &str, schema: &Value) -> Result<Value> {
    let body = strip_code_fence(content);
    if body.is_empty() {
        return Err(ProviderError::ModelOutput(
            "model returned no content".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        ProviderError::ModelOutput(format!("model did not return valid JSON: {}\n{}", e, body))
    })?;

    schema::check(&value, schema).map_err(|violations| {
        ProviderError::ModelOutput(format!(
            "response does not match schema: {}",
            violations.join("; ")
        ))
    })?;

    Ok(value)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[async_trait]
impl<P: Provider> DecisionService for StructuredClient<P> {
    async fn generate(&self, request: StructuredRequest) -> Result<Value> {
        if request.instruction.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "instruction is required".to_string(),
            ));
        }
        if request.schema.is_null() {
            return Err(ProviderError::InvalidRequest(
                "schema is required".to_string(),
            ));
        }

        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![Message::system(build_system_message(&request))],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat::JsonObject,
        };

        let response = self.provider.chat(params).await?;
        debug!(
            "◆ structured response ({} tokens)",
            response.usage.total_tokens
        );

        let content = response.content.unwrap_or_default();
        parse_structured(&content, &request.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": { "action": { "type": "string" } },
            "required": ["action"]
        })
    }

    #[test]
    fn test_system_message_contains_parts() {
        let request = StructuredRequest::new("pick one", "{\"goal\":\"g\"}", schema());
        let message = build_system_message(&request);
        assert!(message.contains("Query: pick one"));
        assert!(message.contains("Context: {\"goal\":\"g\"}"));
        assert!(message.contains("\"required\""));
        assert!(message.contains("Output MUST be valid JSON"));
    }

    #[test]
    fn test_system_message_omits_empty_context() {
        let request = StructuredRequest::new("q", "", schema());
        assert!(!build_system_message(&request).contains("Context:"));
    }

    #[test]
    fn test_parse_structured_ok() {
        let value = parse_structured("{\"action\":\"finish\"}", &schema()).unwrap();
        assert_eq!(value["action"], "finish");
    }

    #[test]
    fn test_parse_structured_code_fence() {
        let value = parse_structured("```json\n{\"action\":\"finish\"}\n```", &schema()).unwrap();
        assert_eq!(value["action"], "finish");
    }

    #[test]
    fn test_parse_structured_empty() {
        let err = parse_structured("   ", &schema()).unwrap_err();
        assert!(matches!(err, ProviderError::ModelOutput(msg) if msg.contains("no content")));
    }

    #[test]
    fn test_parse_structured_invalid_json() {
        let err = parse_structured("not json", &schema()).unwrap_err();
        assert!(matches!(err, ProviderError::ModelOutput(msg) if msg.contains("valid JSON")));
    }

    #[test]
    fn test_parse_structured_leaves_enum_to_caller() {
        let schema = json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["finish"] },
                "details": {
                    "type": "object",
                    "properties": { "summary": { "type": "string" } }
                }
            },
            "required": ["action", "details"]
        });

        let value =
            parse_structured("{\"action\":\"reboot\",\"details\":{\"summary\":null}}", &schema)
                .unwrap();
        assert_eq!(value["action"], "reboot");

        let err = parse_structured("{\"action\":\"finish\",\"details\":[]}", &schema).unwrap_err();
        assert!(matches!(err, ProviderError::ModelOutput(msg) if msg.contains("does not match schema")));
    }

    #[test]
    fn test_parse_structured_missing_field() {
        let err = parse_structured("{\"details\":{}}", &schema()).unwrap_err();
        assert!(
            matches!(err, ProviderError::ModelOutput(msg) if msg.contains("\"action\" is a required property"))
        );
    }
}
