//! OpenAI-Compatible Backend
//!
//! Adapter for endpoints that speak the OpenAI REST dialect: Azure OpenAI
//! deployments, vLLM and most self-hosted gateways. Covers completions and
//! embeddings. Content safety and document extraction are separate services
//! on every provider and are reported as unsupported here.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::{BackendError, CloudBackend, CompletionRequest, CompletionResponse};

/// Default request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for OpenAI-compatible APIs
pub struct OpenAiBackend {
    name: String,
    base_url: String,
    api_key: String,
    /// Used when a request leaves `model` empty
    default_model: Option<String>,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create an adapter for `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ConnectionFailed`] if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: None,
            client,
        })
    }

    /// Model or deployment used for requests that do not name one
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    fn model<'a>(&'a self, requested: &'a str) -> &'a str {
        match self.default_model.as_deref() {
            Some(model) if requested.is_empty() => model,
            _ => requested,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(retry_after_millis);
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), retry_after_ms, &body));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

/// Milliseconds from a delay-seconds `Retry-After` value, saturating on overflow
fn retry_after_millis(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

/// Translate a non-success HTTP status into a backend error
fn error_for_status(status: u16, retry_after_ms: Option<u64>, body: &str) -> BackendError {
    match status {
        401 | 403 => BackendError::AuthenticationFailed,
        408 | 504 => BackendError::Timeout,
        429 => BackendError::RateLimited { retry_after_ms },
        _ => BackendError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

/// Build the chat-completions request body
fn completion_body(request: &CompletionRequest, model: &str) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
    });
    if request.max_tokens > 0 {
        body["max_tokens"] = json!(request.max_tokens);
    }
    body
}

/// Pull the first choice out of a chat-completions response
fn parse_completion(data: &Value, requested_model: &str) -> Result<CompletionResponse, BackendError> {
    let content = data
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::InvalidResponse("missing choices[0].message.content".into()))?;

    let model = data
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(requested_model)
        .to_string();

    let tokens_used = data
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .and_then(|t| u32::try_from(t).ok());

    Ok(CompletionResponse {
        content: content.to_string(),
        model,
        tokens_used,
    })
}

/// Pull the first vector out of an embeddings response
fn parse_embedding(data: &Value) -> Result<Vec<f32>, BackendError> {
    let values = data
        .pointer("/data/0/embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::InvalidResponse("missing data[0].embedding".into()))?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| BackendError::InvalidResponse("non-numeric embedding value".into()))
        })
        .collect()
}

#[async_trait]
impl CloudBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        let model = self.model(&request.model);
        tracing::debug!(
            backend = %self.name,
            request_id = %request.request_id,
            model = %model,
            "Sending completion request"
        );
        let data = self
            .post("chat/completions", &completion_body(request, model))
            .await?;
        parse_completion(&data, model)
    }

    async fn create_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>, BackendError> {
        let body = json!({ "model": self.model(model), "input": [text] });
        let data = self.post("embeddings", &body).await?;
        parse_embedding(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = OpenAiBackend::new("azure-eastus", "https://eastus.example.com/", "k").unwrap();
        assert_eq!(
            backend.url("chat/completions"),
            "https://eastus.example.com/v1/chat/completions"
        );
        assert_eq!(backend.name(), "azure-eastus");
    }

    #[test]
    fn test_completion_body() {
        let request = CompletionRequest::new("hi", "gpt-4o")
            .with_system("be terse")
            .with_max_tokens(32);
        let body = completion_body(&request, &request.model);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 32);
    }

    #[test]
    fn test_completion_body_omits_zero_max_tokens() {
        let request = CompletionRequest::new("hi", "gpt-4o");
        let body = completion_body(&request, &request.model);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_default_model_fills_empty_request_model() {
        let backend = OpenAiBackend::new("azure-eastus", "https://eastus.example.com", "k")
            .unwrap()
            .with_default_model("gpt-4o-deployment");
        assert_eq!(backend.model(""), "gpt-4o-deployment");
        assert_eq!(backend.model("gpt-35"), "gpt-35");
    }

    #[test]
    fn test_parse_completion() {
        let data = json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{ "message": { "role": "assistant", "content": "Hello!" } }],
            "usage": { "total_tokens": 12 }
        });
        let response = parse_completion(&data, "gpt-4o").unwrap();
        assert_eq!(
            response,
            CompletionResponse {
                content: "Hello!".into(),
                model: "gpt-4o-2024-08-06".into(),
                tokens_used: Some(12),
            }
        );
    }

    #[test]
    fn test_parse_completion_missing_content() {
        let data = json!({ "choices": [] });
        assert!(matches!(
            parse_completion(&data, "gpt-4o"),
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_embedding() {
        let data = json!({ "data": [{ "embedding": [0.5, -0.25, 1.0] }] });
        assert_eq!(parse_embedding(&data).unwrap(), vec![0.5, -0.25, 1.0]);

        let bad = json!({ "data": [{ "embedding": ["x"] }] });
        assert!(parse_embedding(&bad).is_err());
    }

    #[test]
    fn test_error_for_status() {
        assert!(matches!(
            error_for_status(401, None, ""),
            BackendError::AuthenticationFailed
        ));
        assert!(matches!(
            error_for_status(429, Some(2000), ""),
            BackendError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));
        assert!(matches!(error_for_status(504, None, ""), BackendError::Timeout));
        assert!(matches!(
            error_for_status(500, None, "boom"),
            BackendError::RequestFailed(msg) if msg.contains("boom")
        ));
    }

    #[test]
    fn test_retry_after_millis() {
        assert_eq!(retry_after_millis("2"), Some(2000));
        assert_eq!(retry_after_millis(" 30 "), Some(30_000));
        assert_eq!(retry_after_millis(&u64::MAX.to_string()), Some(u64::MAX));
        assert_eq!(retry_after_millis("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn test_safety_check_unsupported() {
        let backend = OpenAiBackend::new("azure", "http://localhost:1", "k").unwrap();
        assert!(matches!(
            backend.check_safety("text").await,
            Err(BackendError::Unsupported {
                operation: "check_safety",
                ..
            })
        ));
    }
}
