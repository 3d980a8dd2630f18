//! Backend for servers speaking the OpenAI `/v1/chat/completions` API
//!
//! Covers vLLM, LocalAI, llama.cpp's `llama-server` and hosted endpoints.
//! Selected with `AI_BACKEND=openai_compatible`; reads
//! `OPENAI_COMPATIBLE_HOST`, `OPENAI_COMPATIBLE_MODEL` and the optional
//! `OPENAI_COMPATIBLE_API_KEY`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::ChatRequest;
use super::AIBackend;

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            timeout: None,
        }
    }

    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// None unless `OPENAI_COMPATIBLE_HOST` is set
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Some(Self {
            api_key: std::env::var("OPENAI_COMPATIBLE_API_KEY").ok(),
            ..Self::new(&host, &model)
        })
    }

    /// Bearer auth and the configured timeout
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        };
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: Some(0.1),
            stream: false,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .authorize(self.http_client.post(&url).json(&body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("Completion had no message content".into()))?;
        debug!(model = %self.model, chars = content.len(), "Chat completion received");

        Ok(content)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        self.authorize(self.http_client.get(url))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::with_api_key("http://localhost:8000/", "m", "k");
        assert_eq!(backend.host(), "http://localhost:8000");
        assert_eq!(backend.model(), "m");
        assert_eq!(backend.api_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        // Port 9 (discard) on localhost is almost never listening
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:9", "m")
            .with_timeout(Some(Duration::from_millis(500)));
        assert!(!backend.health_check().await);
        assert!(backend
            .chat(&ChatRequest::new("system", "user"))
            .await
            .is_err());
    }
}
