//! Ollama Backend Implementation
//!
//! Chat backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! Ollama provides a REST API for:
//! - `/api/chat` - Chat completions with message history
//! - `/api/tags` - List available models
//!
//! Structured output uses the `format` field, which accepts a JSON schema.
//! Images travel as a per-message `images` array of bare base64 strings, so
//! vision models such as `llava` or `llama3.2-vision` see them inline.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::traits::{BackendConfig, BackendError, ChatBackend, ChatRequest, ChatResponse, ModelInfo};
use super::truncate_body;
use crate::messages::ChatMessage;

const BACKEND_NAME: &str = "Ollama";

/// Ollama backend client
#[derive(Clone)]
pub struct OllamaBackend {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_timeout(host, port, Duration::from_secs(120))
    }

    /// Create a new Ollama backend with a request timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create from `BackendConfig`
    #[must_use]
    pub fn from_config(config: &BackendConfig, timeout: Duration) -> Option<Self> {
        match config {
            BackendConfig::Ollama { host, port } => {
                Some(Self::with_timeout(host.clone(), *port, timeout))
            }
            BackendConfig::OpenAI { .. } => None,
        }
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    /// Build the `/api/chat` request body
    fn build_body(request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(Self::encode_message).collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            },
        });

        if request.max_tokens > 0 {
            body["options"]["num_predict"] = serde_json::json!(request.max_tokens);
        }

        if let Some(ref schema) = request.schema {
            body["format"] = schema.clone();
        }

        body
    }

    fn encode_message(message: &ChatMessage) -> serde_json::Value {
        let mut encoded = serde_json::json!({
            "role": message.role.api_name(),
            "content": message.text(),
        });

        let images: Vec<&str> = message.images().map(|i| i.base64.as_str()).collect();
        if !images.is_empty() {
            encoded["images"] = serde_json::json!(images);
        }

        encoded
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            backend: BACKEND_NAME.to_string(),
            status,
            body: truncate_body(&body),
        })
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new("localhost", 11434)
    }
}

fn http_error(source: reqwest::Error) -> BackendError {
    BackendError::Http {
        backend: BACKEND_NAME.to_string(),
        source,
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let start = Instant::now();
        let body = Self::build_body(request);

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            structured = request.schema.is_some(),
            "Sending Ollama chat request"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;
        let response = Self::check_status(response).await?;

        let data: serde_json::Value = response.json().await.map_err(http_error)?;

        let content = data
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| BackendError::Protocol {
                backend: BACKEND_NAME.to_string(),
                reason: "missing message.content".to_string(),
            })?
            .to_string();

        let tokens_used = data
            .get("eval_count")
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u32::try_from(c).ok());

        Ok(ChatResponse {
            content,
            model: request.model.clone(),
            tokens_used,
            duration_ms: u64::try_from(start.elapsed().as_millis()).ok(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let response = self
            .http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(http_error)?;
        let response = Self::check_status(response).await?;

        let data: serde_json::Value = response.json().await.map_err(http_error)?;

        let models = data
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        let name = m.get("name")?.as_str()?.to_string();
                        let size = m.get("size").and_then(serde_json::Value::as_u64);
                        let parameters = m
                            .get("details")
                            .and_then(|d| d.get("parameter_size"))
                            .and_then(|p| p.as_str())
                            .map(String::from);

                        Some(ModelInfo {
                            name,
                            size,
                            parameters,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageData;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("localhost", 11434);
        assert_eq!(backend.host, "localhost");
        assert_eq!(backend.port, 11434);
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_build_body_with_schema_and_images() {
        let messages = vec![
            ChatMessage::system("Be a chef"),
            ChatMessage::human("What is this?").with_image(ImageData::new("image/jpeg", "QUJD")),
        ];
        let request = ChatRequest::new("llava", messages)
            .with_schema("ImageAnalysis", serde_json::json!({"type": "object"}))
            .with_max_tokens(256);

        let body = OllamaBackend::build_body(&request);

        assert_eq!(body["model"], "llava");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"]["type"], "object");
        assert_eq!(body["options"]["num_predict"], 256);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0].get("images").is_none());
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["images"][0], "QUJD");
    }

    #[test]
    fn test_build_body_without_schema() {
        let request = ChatRequest::new("llama3.2", vec![ChatMessage::human("hi")]);
        let body = OllamaBackend::build_body(&request);
        assert!(body.get("format").is_none());
        assert!(body["options"].get("num_predict").is_none());
    }

    #[test]
    fn test_from_config() {
        let config = BackendConfig::ollama("example.com", 8080);
        let backend = OllamaBackend::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(backend.host, "example.com");
        assert_eq!(backend.port, 8080);

        // Wrong config type returns None
        let config = BackendConfig::OpenAI {
            api_key: "test".to_string(),
            base_url: None,
        };
        assert!(OllamaBackend::from_config(&config, Duration::from_secs(5)).is_none());
    }
}
