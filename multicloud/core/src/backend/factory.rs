//! Backend Construction
//!
//! Turns one `[[endpoints]]` definition into a boxed [`CloudBackend`].

use super::echo::EchoBackend;
use super::openai::OpenAiBackend;
use super::traits::{BackendError, CloudBackend};
use crate::config::{BackendKind, EndpointToml};

/// Build the backend described by `endpoint`
///
/// OpenAI endpoints read their API key from the variable named by
/// `api_key_env`; without one the key is left empty, which local
/// OpenAI-compatible servers accept.
///
/// # Errors
///
/// - [`BackendError::ConnectionFailed`] if an openai endpoint has no
///   `base_url` or its HTTP client cannot be built.
/// - [`BackendError::AuthenticationFailed`] if `api_key_env` names an unset
///   variable.
pub fn create_backend(endpoint: &EndpointToml) -> Result<Box<dyn CloudBackend>, BackendError> {
    match endpoint.kind {
        BackendKind::Echo => {
            let backend = EchoBackend::new(endpoint.name.clone());
            backend.set_failing(endpoint.fail);
            Ok(Box::new(backend))
        }
        BackendKind::OpenAi => {
            let base_url = endpoint.base_url.as_deref().ok_or_else(|| {
                BackendError::ConnectionFailed(format!("endpoint '{}' has no base_url", endpoint.name))
            })?;

            let api_key = match endpoint.api_key_env.as_deref() {
                Some(var) => std::env::var(var).map_err(|_| {
                    tracing::warn!(endpoint = %endpoint.name, env = %var, "API key variable not set");
                    BackendError::AuthenticationFailed
                })?,
                None => String::new(),
            };

            let mut backend = OpenAiBackend::new(endpoint.name.clone(), base_url, api_key)?;
            if let Some(ref model) = endpoint.model {
                backend = backend.with_default_model(model.clone());
            }
            Ok(Box::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CompletionRequest;

    #[tokio::test]
    async fn test_echo_endpoint() {
        let backend = create_backend(&EndpointToml::echo("gcp-us-central1", "gcp")).unwrap();
        assert_eq!(backend.name(), "gcp-us-central1");

        let response = backend
            .create_completion(&CompletionRequest::new("hi", "gemini"))
            .await
            .unwrap();
        assert_eq!(response.content, "[gcp-us-central1] hi");
    }

    #[tokio::test]
    async fn test_failing_echo_endpoint() {
        let mut endpoint = EndpointToml::echo("broken", "aws");
        endpoint.fail = true;
        let backend = create_backend(&endpoint).unwrap();
        assert!(backend
            .create_completion(&CompletionRequest::new("hi", "m"))
            .await
            .is_err());
    }

    #[test]
    fn test_openai_endpoint() {
        let mut endpoint = EndpointToml::echo("azure-eastus", "azure");
        endpoint.kind = BackendKind::OpenAi;
        endpoint.base_url = Some("https://eastus.example.com".into());
        let backend = create_backend(&endpoint).unwrap();
        assert_eq!(backend.name(), "azure-eastus");
    }

    #[test]
    fn test_openai_requires_base_url() {
        let mut endpoint = EndpointToml::echo("azure-eastus", "azure");
        endpoint.kind = BackendKind::OpenAi;
        assert!(matches!(
            create_backend(&endpoint),
            Err(BackendError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn test_openai_missing_key_variable() {
        let mut endpoint = EndpointToml::echo("azure-eastus", "azure");
        endpoint.kind = BackendKind::OpenAi;
        endpoint.base_url = Some("https://eastus.example.com".into());
        endpoint.api_key_env = Some("MULTICLOUD_TEST_KEY_THAT_IS_NEVER_SET".into());
        assert!(matches!(
            create_backend(&endpoint),
            Err(BackendError::AuthenticationFailed)
        ));
    }
}
