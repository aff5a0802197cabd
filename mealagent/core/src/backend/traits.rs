//! LLM Backend Traits
//!
//! Trait definitions for chat backends. This abstraction lets the workflow
//! talk to different providers (Ollama, OpenAI-compatible servers, test
//! mocks) without changing node logic.
//!
//! Backends are deliberately untyped: they take role-tagged messages plus
//! an optional JSON schema and return the raw reply text. Turning that text
//! into a schema record is the adapter's job.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::messages::ChatMessage;

/// Errors surfaced by backends and the model adapter
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request never completed (connect, timeout, body read)
    #[error("{backend} request failed: {source}")]
    Http {
        /// Backend name
        backend: String,
        /// Underlying HTTP error
        source: reqwest::Error,
    },

    /// Provider answered with a non-success status (quota, auth, ...)
    #[error("{backend} returned {status}: {body}")]
    Status {
        /// Backend name
        backend: String,
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Response envelope was not what the provider documents
    #[error("unexpected {backend} response: {reason}")]
    Protocol {
        /// Backend name
        backend: String,
        /// What was wrong
        reason: String,
    },

    /// Reply text did not match the requested schema
    #[error("response did not match {schema} schema: {reason}")]
    Schema {
        /// Target schema name
        schema: String,
        /// Parser message
        reason: String,
    },

    /// Backend is missing required configuration
    #[error("backend misconfigured: {0}")]
    Config(String),
}

/// A chat completion request
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// Ordered conversation
    pub messages: Vec<ChatMessage>,
    /// JSON schema the reply must satisfy
    pub schema: Option<serde_json::Value>,
    /// Name of the schema (some providers require one)
    pub schema_name: Option<String>,
    /// Temperature (0.0-1.0)
    pub temperature: f32,
    /// Maximum tokens in response (0 = provider default)
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Create a request for a model and conversation
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            schema: None,
            schema_name: None,
            temperature: 0.2,
            max_tokens: 0,
        }
    }

    /// Constrain the reply to a JSON schema
    #[must_use]
    pub fn with_schema(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.schema_name = Some(name.into());
        self.schema = Some(schema);
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

/// Reply to a [`ChatRequest`]
#[derive(Clone, Debug)]
pub struct ChatResponse {
    /// Raw reply text (JSON when a schema was requested)
    pub content: String,
    /// Model that generated the response
    pub model: String,
    /// Tokens used (if available)
    pub tokens_used: Option<u32>,
    /// Response generation time in milliseconds
    pub duration_ms: Option<u64>,
}

/// Information about an available model
#[derive(Clone, Debug, Serialize)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Model size in bytes (if known)
    pub size: Option<u64>,
    /// Parameter count (if known)
    pub parameters: Option<String>,
}

/// Chat backend trait
///
/// Implement this trait to add support for another provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "Ollama", "OpenAI")
    fn name(&self) -> &str;

    /// Check if the backend is healthy and reachable
    async fn health_check(&self) -> bool;

    /// Send a request and wait for the complete reply
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError>;

    /// Check if a specific model is available
    async fn has_model(&self, model: &str) -> Result<bool, BackendError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.name == model))
    }
}

/// Backend connection configuration
#[derive(Clone, Debug, PartialEq)]
pub enum BackendConfig {
    /// Direct Ollama connection
    Ollama {
        /// Ollama host address
        host: String,
        /// Ollama port number
        port: u16,
    },
    /// OpenAI-compatible API
    OpenAI {
        /// API key for authentication
        api_key: String,
        /// Custom base URL (optional)
        base_url: Option<String>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Ollama {
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}

impl BackendConfig {
    /// Create Ollama configuration
    pub fn ollama(host: impl Into<String>, port: u16) -> Self {
        Self::Ollama {
            host: host.into(),
            port,
        }
    }

    /// Provider name as used in the config file
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::OpenAI { .. } => "openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_builder() {
        let request = ChatRequest::new("llava", vec![ChatMessage::human("Hello")])
            .with_schema("Recipe", serde_json::json!({"type": "object"}))
            .with_temperature(1.5)
            .with_max_tokens(100);

        assert_eq!(request.model, "llava");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.schema_name.as_deref(), Some("Recipe"));
        assert!((request.temperature - 1.0).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 100);
    }

    #[test]
    fn test_backend_config_default() {
        let config = BackendConfig::default();
        match config {
            BackendConfig::Ollama { host, port } => {
                assert_eq!(host, "localhost");
                assert_eq!(port, 11434);
            }
            BackendConfig::OpenAI { .. } => panic!("Expected Ollama config"),
        }
        assert_eq!(BackendConfig::default().provider(), "ollama");
    }

    #[test]
    fn test_status_error_message() {
        let err = BackendError::Status {
            backend: "OpenAI".to_string(),
            status: 429,
            body: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "OpenAI returned 429: quota exceeded");
    }
}
