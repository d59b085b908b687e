//! Cloud Backend Traits
//!
//! The capability interface the routers call once an endpoint has been
//! selected. Implementations wrap one provider deployment (an Azure OpenAI
//! resource, a Bedrock region, an in-process echo double) and own every
//! provider-specific concern: credentials, wire format, error translation.
//!
//! The routers never look inside a backend. They pick an endpoint, call one
//! of the methods below and hand the result back to the caller unchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Requests and Responses
// ============================================================================

/// A chat-style completion request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Unique request ID (for log correlation)
    pub request_id: String,
    /// Deployment or model identifier understood by the backend
    pub model: String,
    /// The user prompt
    pub prompt: String,
    /// Optional system prompt
    pub system: Option<String>,
    /// Maximum tokens in the response (0 = backend default)
    pub max_tokens: u32,
    /// Sampling temperature (0.0-1.0)
    pub temperature: f32,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            model: String::new(),
            prompt: String::new(),
            system: None,
            max_tokens: 0,
            temperature: 0.5,
        }
    }
}

impl CompletionRequest {
    /// Create a new request with prompt and model
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Response from a completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text
    pub content: String,
    /// Model that produced the response
    pub model: String,
    /// Tokens used (if reported)
    pub tokens_used: Option<u32>,
}

/// Outcome of a content-safety check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Whether the text passed the check
    pub is_safe: bool,
    /// Categories that were flagged (empty when safe)
    pub flagged_categories: Vec<String>,
}

impl SafetyVerdict {
    /// A verdict with nothing flagged
    #[must_use]
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            flagged_categories: Vec::new(),
        }
    }

    /// A verdict flagging the given categories
    #[must_use]
    pub fn flagged(categories: Vec<String>) -> Self {
        Self {
            is_safe: false,
            flagged_categories: categories,
        }
    }
}

/// Text extracted from a document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Document the text came from
    pub source: PathBuf,
    /// Extracted plain text
    pub content: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a backend call
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not reach the endpoint
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint rejected or failed the request
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Credentials were missing or rejected
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The endpoint is throttling us
    #[error("Rate limited{}", retry_hint(.retry_after_ms))]
    RateLimited {
        /// Server-suggested wait, if any
        retry_after_ms: Option<u64>,
    },

    /// The call timed out
    #[error("Request timed out")]
    Timeout,

    /// The backend does not implement this capability
    #[error("{backend} does not support {operation}")]
    Unsupported {
        /// Backend name
        backend: String,
        /// Capability that was requested
        operation: &'static str,
    },

    /// The response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Reading a local document failed
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Document path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

fn retry_hint(retry_after_ms: &Option<u64>) -> String {
    retry_after_ms
        .map(|ms| format!(", retry after {ms}ms"))
        .unwrap_or_default()
}

// ============================================================================
// Capability Interface
// ============================================================================

/// One backend deployment that the routers can dispatch to
///
/// Only `create_completion` is mandatory. Providers that lack a capability
/// keep the default implementation, which reports [`BackendError::Unsupported`].
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Backend name (for logs and errors)
    fn name(&self) -> &str;

    /// Generate a completion
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError>;

    /// Embed `text` with the given embedding model
    async fn create_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>, BackendError> {
        let _ = (text, model);
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "create_embedding",
        })
    }

    /// Run a content-safety check on `text`
    async fn check_safety(&self, text: &str) -> Result<SafetyVerdict, BackendError> {
        let _ = text;
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "check_safety",
        })
    }

    /// Extract plain text from the document at `path`
    async fn extract_document(&self, path: &Path) -> Result<ExtractedText, BackendError> {
        let _ = path;
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "extract_document",
        })
    }
}
