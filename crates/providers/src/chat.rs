//! Minimal client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Both supported providers speak this protocol; they differ only in base
//! URL, model and sampling settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderFailure;

/// Default HTTP timeout for a single completion request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One message of a chat conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Sampling settings for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            top_p: None,
            response_format: None,
        }
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Ask the model to answer with a single JSON object.
    pub fn with_json_object(mut self) -> Self {
        self.response_format = Some(serde_json::json!({ "type": "json_object" }));
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// HTTP client for one chat-completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    /// Create a client with its own connection pool.
    ///
    /// * `base_url` - API root without trailing slash, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client, base_url, api_key)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request` and return the first choice's message content.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderFailure> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderFailure::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_completion_body(&body)
    }
}

/// Decode a successful completion response and return its message content.
///
/// A 2xx body that is not JSON is a malformed response, not a transport error.
pub fn parse_completion_body(body: &str) -> Result<String, ProviderFailure> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderFailure::Malformed(format!("response body is not JSON: {e}")))?;
    extract_content(value)
}

/// Pull `choices[0].message.content` out of a completion response body.
pub fn extract_content(body: serde_json::Value) -> Result<String, ProviderFailure> {
    let parsed: ChatResponse = serde_json::from_value(body)
        .map_err(|e| ProviderFailure::Malformed(format!("unexpected response shape: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderFailure::Malformed("response has no message content".into()))
}

/// Parse model output that must be a JSON object.
///
/// A surrounding Markdown code fence (```json ... ```) is tolerated.
pub fn parse_json_object(content: &str) -> Result<serde_json::Value, ProviderFailure> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ProviderFailure::Malformed(format!("content is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(ProviderFailure::Malformed(
            "content is not a JSON object".into(),
        ));
    }
    Ok(value)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
