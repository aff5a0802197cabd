//! Scripted Test Backend
//!
//! Mock infrastructure for exercising the workflow without real LLM calls.
//! [`MockBackend`] replays a queue of scripted replies in order and records
//! every request it receives so tests can assert on prompts and schemas.
//!
//! # Usage
//!
//! ```ignore
//! use mealagent_core::backend::test_utils::MockBackend;
//!
//! let backend = Arc::new(MockBackend::new());
//! backend.push_json(serde_json::json!({ "image_name": "Eggs" }));
//! backend.push_status(429, "quota exceeded");
//!
//! // ... run the workflow ...
//! assert_eq!(backend.request_count(), 2);
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{BackendError, ChatBackend, ChatRequest, ChatResponse, ModelInfo};

/// One scripted reply
#[derive(Clone, Debug)]
enum Scripted {
    /// Reply text
    Content(String),
    /// Provider status error
    Status(u16, String),
}

/// Mock backend replaying scripted replies
#[derive(Debug, Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
    unhealthy: Mutex<bool>,
}

impl MockBackend {
    /// Create an empty mock
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON reply
    pub fn push_json(&self, value: serde_json::Value) {
        self.push_text(value.to_string());
    }

    /// Queue a raw text reply
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies.lock().push_back(Scripted::Content(text.into()));
    }

    /// Queue a provider error
    pub fn push_status(&self, status: u16, body: impl Into<String>) {
        self.replies
            .lock()
            .push_back(Scripted::Status(status, body.into()));
    }

    /// Mark the backend unreachable for health checks
    pub fn set_unhealthy(&self, unhealthy: bool) {
        *self.unhealthy.lock() = unhealthy;
    }

    /// All requests received, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Replies still queued
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn health_check(&self) -> bool {
        !*self.unhealthy.lock()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        self.requests.lock().push(request.clone());

        let next = self.replies.lock().pop_front();
        match next {
            Some(Scripted::Content(content)) => Ok(ChatResponse {
                content,
                model: request.model.clone(),
                tokens_used: None,
                duration_ms: Some(0),
            }),
            Some(Scripted::Status(status, body)) => Err(BackendError::Status {
                backend: "Mock".to_string(),
                status,
                body,
            }),
            None => Err(BackendError::Protocol {
                backend: "Mock".to_string(),
                reason: "no scripted reply left".to_string(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        Ok(vec![ModelInfo {
            name: "mock-vision".to_string(),
            size: None,
            parameters: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ChatMessage;

    #[tokio::test]
    async fn test_replays_in_order_then_errors() {
        let backend = MockBackend::new();
        backend.push_text("first");
        backend.push_status(503, "overloaded");

        let request = ChatRequest::new("m", vec![ChatMessage::human("hi")]);

        assert_eq!(backend.complete(&request).await.unwrap().content, "first");
        assert!(matches!(
            backend.complete(&request).await,
            Err(BackendError::Status { status: 503, .. })
        ));
        assert!(matches!(
            backend.complete(&request).await,
            Err(BackendError::Protocol { .. })
        ));
        assert_eq!(backend.request_count(), 3);
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_health_and_models() {
        let backend = MockBackend::new();
        assert!(backend.health_check().await);
        backend.set_unhealthy(true);
        assert!(!backend.health_check().await);
        assert!(backend.has_model("mock-vision").await.unwrap());
    }
}
