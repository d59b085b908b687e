//! Echo Backend
//!
//! In-process backend that answers every capability deterministically without
//! leaving the process. Used for dry runs of a routing configuration and as
//! the test double throughout the crate.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use super::traits::{
    BackendError, CloudBackend, CompletionRequest, CompletionResponse, ExtractedText,
    SafetyVerdict,
};

/// Number of dimensions in an echo embedding
pub const ECHO_EMBEDDING_DIMS: usize = 8;

/// Deterministic backend labelled with the endpoint it stands in for
#[derive(Debug)]
pub struct EchoBackend {
    label: String,
    blocked_terms: Vec<String>,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl EchoBackend {
    /// Create an echo backend with the given label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            blocked_terms: Vec::new(),
            failing: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Flag any text containing one of `terms` during safety checks
    #[must_use]
    pub fn with_blocked_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_terms = terms
            .into_iter()
            .map(|t| Into::<String>::into(t).to_lowercase())
            .collect();
        self
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Number of calls received so far, failed ones included
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn begin_call(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Acquire) {
            return Err(BackendError::RequestFailed(format!(
                "{} is configured to fail",
                self.label
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudBackend for EchoBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        self.begin_call()?;
        let tokens = request.prompt.split_whitespace().count();
        Ok(CompletionResponse {
            content: format!("[{}] {}", self.label, request.prompt),
            model: request.model.clone(),
            tokens_used: u32::try_from(tokens).ok(),
        })
    }

    async fn create_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>, BackendError> {
        self.begin_call()?;
        let _ = model;
        let mut vector = vec![0.0_f32; ECHO_EMBEDDING_DIMS];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % ECHO_EMBEDDING_DIMS] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }

    async fn check_safety(&self, text: &str) -> Result<SafetyVerdict, BackendError> {
        self.begin_call()?;
        let lowered = text.to_lowercase();
        let flagged: Vec<String> = self
            .blocked_terms
            .iter()
            .filter(|term| lowered.contains(term.as_str()))
            .cloned()
            .collect();

        if flagged.is_empty() {
            Ok(SafetyVerdict::safe())
        } else {
            Ok(SafetyVerdict::flagged(flagged))
        }
    }

    async fn extract_document(&self, path: &Path) -> Result<ExtractedText, BackendError> {
        self.begin_call()?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| BackendError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(ExtractedText {
            source: path.to_path_buf(),
            content,
        })
    }
}
