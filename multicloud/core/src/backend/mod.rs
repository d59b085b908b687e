//! Cloud Backends
//!
//! The capability interface the routers call into, plus the concrete
//! adapters:
//!
//! - [`EchoBackend`] - in-process, deterministic; dry runs and tests
//! - [`OpenAiBackend`] - OpenAI-compatible HTTP APIs (Azure OpenAI, gateways)

pub mod echo;
pub mod factory;
pub mod openai;
pub mod traits;

pub use echo::{EchoBackend, ECHO_EMBEDDING_DIMS};
pub use factory::create_backend;
pub use openai::OpenAiBackend;
pub use traits::{
    BackendError, CloudBackend, CompletionRequest, CompletionResponse, ExtractedText,
    SafetyVerdict,
};
