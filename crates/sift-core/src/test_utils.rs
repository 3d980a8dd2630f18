//! Test utilities for sift-core
//!
//! A mock Ollama server speaking `/api/chat` and `/api/tags`, so the real
//! HTTP backend can be exercised end to end without a model.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::ai::heuristic_response;

#[derive(Clone)]
struct ServerState {
    fail: bool,
    requests: Arc<AtomicUsize>,
}

/// Mock Ollama server for integration tests
pub struct MockLlmServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start a server that answers like a cooperative model
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// Start a server whose chat endpoint always returns HTTP 500
    pub async fn start_failing() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(fail: bool) -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            fail,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/chat", post(handle_chat))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("mock server");
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for an `OllamaBackend`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Chat requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            size: 2_000_000_000,
        }],
    })
}

async fn handle_chat(State(state): State<ServerState>, Json(request): Json<ChatRequest>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if state.fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }

    let prompt = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    Json(ChatResponse {
        model: request.model,
        message: Message {
            role: "assistant".to_string(),
            content: heuristic_response(prompt),
        },
        done: true,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    model: String,
    message: Message,
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, AIClient, ChatRequest as AiChatRequest};

    #[tokio::test]
    async fn test_ollama_backend_against_mock_server() {
        let server = MockLlmServer::start().await;
        let client = AIClient::ollama(&server.url(), "llama3.2");
        assert!(client.health_check().await);

        let request = AiChatRequest::new(
            "system",
            "Description: \"NETFLIX.COM\"\n\nAvailable categories:\n- Entertainment\n- Other\n",
        );
        let text = client.chat(&request).await.unwrap();
        assert!(text.contains("Entertainment"));
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_server_returns_error() {
        let server = MockLlmServer::start_failing().await;
        let client = AIClient::ollama(&server.url(), "llama3.2");
        assert!(client.chat(&AiChatRequest::new("s", "u")).await.is_err());
    }
}
