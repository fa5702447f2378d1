use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ServiceError;

/// Placeholder used when the caller sends no `prompt`.
pub const DEFAULT_PROMPT: &str = "No prompt provided";

/// Body fields of `POST /v1/completions` that the server looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub lora: Option<String>,
    pub model: Option<String>,
}

impl CompletionRequest {
    /// Validates a raw request body. Anything other than a JSON object is
    /// rejected; unknown or non-string fields are ignored.
    pub fn from_body(body: &[u8]) -> Result<Self, ServiceError> {
        let value: Value = serde_json::from_slice(body)?;
        let Value::Object(fields) = value else {
            return Err(ServiceError::NotAnObject);
        };

        Ok(Self {
            prompt: string_field(&fields, "prompt").unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            lora: string_field(&fields, "lora"),
            model: string_field(&fields, "model"),
        })
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: u32,
    pub logprobs: Option<Value>,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl CompletionResponse {
    pub fn new(model: &str, text: &str, created: i64) -> Self {
        Self {
            id: "fake-123".to_string(),
            object: "text_completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![CompletionChoice {
                text: text.to_string(),
                index: 0,
                logprobs: None,
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 10,
                total_tokens: 20,
            },
        }
    }
}
