//! Chat backends for the LLM strategy
//!
//! Everything the engine asks a model goes through one call shape: a system
//! message and a user message in, free text out. `AIClient` wraps the
//! concrete backends so the engine can hold one by value and clone it into
//! concurrent batch tasks.
//!
//! `AIClient::from_env` picks the backend from `AI_BACKEND` (`ollama`, the
//! default; `openai_compatible`; or `mock`) and returns None when the chosen
//! backend's host variable is unset, which leaves the engine on patterns and
//! rules only.

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::{MockBackend, MockMode};
#[cfg(any(test, feature = "test-utils"))]
pub(crate) use mock::heuristic_response;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait AIBackend: Send + Sync {
    /// One system + user exchange; returns the model's raw text
    async fn chat(&self, request: &ChatRequest) -> Result<String>;

    async fn health_check(&self) -> bool;

    fn model(&self) -> &str;

    fn host(&self) -> &str;
}

#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, hosted APIs, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Heuristic mock, healthy and instant
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }

    /// Apply a per-request timeout (None keeps the HTTP client default)
    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_timeout(timeout)),
            AIClient::OpenAICompatible(b) => {
                AIClient::OpenAICompatible(b.with_timeout(timeout))
            }
            AIClient::Mock(b) => AIClient::Mock(b.clone()),
        }
    }

    /// Backend kind, host and model for display
    pub fn info(&self) -> BackendInfo {
        let kind = match self {
            AIClient::Ollama(_) => "ollama",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        };
        BackendInfo {
            kind,
            host: self.host().to_string(),
            model: self.model().to_string(),
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        match self {
            AIClient::Ollama(b) => b.chat(request).await,
            AIClient::OpenAICompatible(b) => b.chat(request).await,
            AIClient::Mock(b) => b.chat(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
        assert_eq!(client.info().kind, "mock");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }

    #[test]
    fn test_with_model_and_timeout() {
        let client = AIClient::ollama("http://localhost:11434/", "llama3.2");
        let other = client
            .with_model("gemma3")
            .with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(other.model(), "gemma3");
        assert_eq!(other.host(), "http://localhost:11434");
        assert_eq!(other.info().kind, "ollama");
    }
}
