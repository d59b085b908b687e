//! Typed Capability Calls
//!
//! A [`Capability`] names one backend operation together with its arguments.
//! Routers select an endpoint first and then hand the chosen backend to
//! [`Capability::invoke`], which switches on the variant and calls the
//! matching [`CloudBackend`] method.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::component::Component;
use crate::backend::{
    BackendError, CloudBackend, CompletionRequest, CompletionResponse, ExtractedText,
    SafetyVerdict,
};

/// One backend operation and its arguments
#[derive(Clone, Copy, Debug)]
pub enum Capability<'a> {
    /// Generate a completion
    Completion(&'a CompletionRequest),

    /// Embed `text` with `model`
    Embedding {
        /// Text to embed
        text: &'a str,
        /// Embedding model or deployment
        model: &'a str,
    },

    /// Classify `text` for content safety
    SafetyCheck {
        /// Text to classify
        text: &'a str,
    },

    /// Extract the text of a document
    Extraction {
        /// Document location
        path: &'a Path,
    },
}

impl Capability<'_> {
    /// Operation name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completion(_) => "completion",
            Self::Embedding { .. } => "embedding",
            Self::SafetyCheck { .. } => "safety-check",
            Self::Extraction { .. } => "extraction",
        }
    }

    /// Component pool that serves this capability
    ///
    /// Embeddings come from the same deployments as completions.
    #[must_use]
    pub fn component(&self) -> Component {
        match self {
            Self::Completion(_) | Self::Embedding { .. } => Component::Completion,
            Self::SafetyCheck { .. } => Component::SafetyCheck,
            Self::Extraction { .. } => Component::Extraction,
        }
    }

    /// Run the operation on `backend`
    ///
    /// # Errors
    ///
    /// Returns whatever the backend reports, unchanged.
    pub async fn invoke(
        &self,
        backend: &dyn CloudBackend,
    ) -> Result<CapabilityOutput, BackendError> {
        match *self {
            Self::Completion(request) => backend
                .create_completion(request)
                .await
                .map(CapabilityOutput::Completion),
            Self::Embedding { text, model } => backend
                .create_embedding(text, model)
                .await
                .map(CapabilityOutput::Embedding),
            Self::SafetyCheck { text } => backend
                .check_safety(text)
                .await
                .map(CapabilityOutput::SafetyVerdict),
            Self::Extraction { path } => backend
                .extract_document(path)
                .await
                .map(CapabilityOutput::Extraction),
        }
    }
}

impl fmt::Display for Capability<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a [`Capability`] call
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum CapabilityOutput {
    /// Generated completion
    Completion(CompletionResponse),
    /// Embedding vector
    Embedding(Vec<f32>),
    /// Safety classification
    SafetyVerdict(SafetyVerdict),
    /// Extracted document text
    Extraction(ExtractedText),
}

/// A result together with where it was served
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Routed<T> {
    /// Group selected by a hierarchical router
    pub group: Option<String>,
    /// Endpoint that served the call
    pub endpoint: String,
    /// Backend result
    pub output: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EchoBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_component_mapping() {
        let request = CompletionRequest::new("hi", "gpt-4o");
        assert_eq!(Capability::Completion(&request).component(), Component::Completion);
        assert_eq!(
            Capability::Embedding {
                text: "hi",
                model: "ada"
            }
            .component(),
            Component::Completion
        );
        assert_eq!(
            Capability::SafetyCheck { text: "hi" }.component(),
            Component::SafetyCheck
        );
        assert_eq!(
            Capability::Extraction {
                path: Path::new("doc.txt")
            }
            .to_string(),
            "extraction"
        );
    }

    #[tokio::test]
    async fn test_invoke_switches_on_variant() {
        let backend = EchoBackend::new("azure-eastus").with_blocked_terms(["attack"]);

        let request = CompletionRequest::new("hello there", "gpt-4o");
        let output = Capability::Completion(&request).invoke(&backend).await.unwrap();
        assert_eq!(
            output,
            CapabilityOutput::Completion(CompletionResponse {
                content: "[azure-eastus] hello there".into(),
                model: "gpt-4o".into(),
                tokens_used: Some(2),
            })
        );

        let output = Capability::SafetyCheck {
            text: "plan an attack",
        }
        .invoke(&backend)
        .await
        .unwrap();
        assert_eq!(
            output,
            CapabilityOutput::SafetyVerdict(SafetyVerdict::flagged(vec!["attack".into()]))
        );

        assert_eq!(backend.call_count(), 2);
    }
}
