//! Chat-completions wrapper. Never returns an error: failures come back as
//! `{"error": "..."}` payloads.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
enum LlmError {
    #[error("GROQ_API_KEY is not configured")]
    MissingApiKey,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("response has no message content")]
    NoContent,
    #[error("content is not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_is_json")]
    pub is_json: bool,
}

fn default_is_json() -> bool {
    true
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: model.to_owned(),
        }
    }

    pub async fn get_response(&self, messages: &[ChatMessage], is_json: bool) -> Value {
        tracing::debug!(count = messages.len(), "sending chat completion");

        match self.complete(messages, is_json).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(%err, "LLM request failed");
                json!({ "error": format!("Error in LLM Client: {err}") })
            }
        }
    }

    async fn complete(&self, messages: &[ChatMessage], is_json: bool) -> Result<Value, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 1,
            "max_completion_tokens": 500,
            "top_p": 1,
            "stream": false,
            "stop": null,
        });
        if is_json {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())?;

        let payload: Value = response.json().await?;
        extract_content(&payload, is_json)
    }
}

fn extract_content(payload: &Value, is_json: bool) -> Result<Value, LlmError> {
    let content = payload["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::NoContent)?;

    if is_json {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(Value::String(content.to_owned()))
    }
}
