//! OpenAI-Compatible Backend
//!
//! Chat backend for any server speaking the OpenAI `/chat/completions`
//! dialect (OpenAI itself, Gemini's OpenAI endpoint, vLLM, LM Studio, ...).
//!
//! Images are sent as `image_url` content parts holding a `data:` URL, and
//! structured output uses `response_format: {"type": "json_schema", ...}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::traits::{BackendConfig, BackendError, ChatBackend, ChatRequest, ChatResponse, ModelInfo};
use super::truncate_body;
use crate::messages::{ChatMessage, ContentPart, MessageRole};

const BACKEND_NAME: &str = "OpenAI";

/// Default API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible backend client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// API key (sent as a bearer token)
    api_key: String,
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a new backend
    pub fn new(api_key: impl Into<String>, base_url: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            api_key: api_key.into(),
            base_url,
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
            BackendConfig::OpenAI { api_key, base_url } => {
                Some(Self::new(api_key.clone(), base_url.clone(), timeout))
            }
            BackendConfig::Ollama { .. } => None,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    /// Build the `/chat/completions` request body
    fn build_body(request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(Self::encode_message).collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        });

        if request.max_tokens > 0 {
            body["max_tokens"] = serde_json::json!(request.max_tokens);
        }

        if let Some(ref schema) = request.schema {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name.as_deref().unwrap_or("response"),
                    "schema": schema,
                    "strict": false,
                },
            });
        }

        body
    }

    fn encode_message(message: &ChatMessage) -> serde_json::Value {
        // System and assistant turns are text-only in this dialect
        if message.role != MessageRole::Human {
            return serde_json::json!({
                "role": message.role.api_name(),
                "content": message.text(),
            });
        }

        let parts: Vec<serde_json::Value> = message
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => serde_json::json!({
                    "type": "text",
                    "text": text,
                }),
                ContentPart::Image { image } => serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": image.data_url() },
                }),
            })
            .collect();

        serde_json::json!({
            "role": message.role.api_name(),
            "content": parts,
        })
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

fn http_error(source: reqwest::Error) -> BackendError {
    BackendError::Http {
        backend: BACKEND_NAME.to_string(),
        source,
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        if self.api_key.is_empty() {
            return Err(BackendError::Config("OpenAI API key is empty".to_string()));
        }

        let start = Instant::now();
        let body = Self::build_body(request);

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            structured = request.schema.is_some(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;
        let response = Self::check_status(response).await?;

        let data: serde_json::Value = response.json().await.map_err(http_error)?;

        let content = data
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| BackendError::Protocol {
                backend: BACKEND_NAME.to_string(),
                reason: "missing choices[0].message.content".to_string(),
            })?
            .to_string();

        let tokens_used = data
            .get("usage")
            .and_then(|u| u.get("completion_tokens"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u32::try_from(c).ok());

        let model = data
            .get("model")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&request.model)
            .to_string();

        Ok(ChatResponse {
            content,
            model,
            tokens_used,
            duration_ms: u64::try_from(start.elapsed().as_millis()).ok(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let response = self
            .http_client
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(http_error)?;
        let response = Self::check_status(response).await?;

        let data: serde_json::Value = response.json().await.map_err(http_error)?;

        let models = data
            .get("data")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        Some(ModelInfo {
                            name: m.get("id")?.as_str()?.to_string(),
                            size: None,
                            parameters: None,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}
