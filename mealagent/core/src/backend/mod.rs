//! LLM Backend Integration
//!
//! This module provides abstracted access to chat backends (Ollama,
//! OpenAI-compatible servers) through a common trait interface, and the
//! [`ModelAdapter`] that turns their replies into schema records.
//!
//! # Available Backends
//!
//! - **Ollama**: Local LLM server (default)
//! - **OpenAI**: Any `/chat/completions`-compatible API
//!
//! # Usage
//!
//! ```ignore
//! use mealagent_core::backend::{build_backend, BackendConfig, ModelAdapter};
//!
//! let backend = build_backend(&BackendConfig::default(), Duration::from_secs(120));
//! let adapter = ModelAdapter::new(backend, "llava");
//! let analysis: ImageAnalysis = adapter.invoke(&messages).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

mod adapter;
mod ollama;
mod openai;
pub mod test_utils;
mod traits;

pub use adapter::ModelAdapter;
pub use ollama::OllamaBackend;
pub use openai::{OpenAiBackend, DEFAULT_OPENAI_BASE_URL};
pub use traits::{
    BackendConfig, BackendError, ChatBackend, ChatRequest, ChatResponse, ModelInfo,
};

/// Longest provider error body kept in a [`BackendError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Create the backend described by `config`
#[must_use]
pub fn build_backend(config: &BackendConfig, timeout: Duration) -> Arc<dyn ChatBackend> {
    match config {
        BackendConfig::Ollama { host, port } => {
            Arc::new(OllamaBackend::with_timeout(host.clone(), *port, timeout))
        }
        BackendConfig::OpenAI { api_key, base_url } => {
            Arc::new(OpenAiBackend::new(api_key.clone(), base_url.clone(), timeout))
        }
    }
}

/// Trim a provider error body to something loggable
pub(crate) fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("  short "), "short");

        let long = "é".repeat(400);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= MAX_ERROR_BODY + 3);
    }

    #[test]
    fn test_build_backend_picks_provider() {
        let ollama = build_backend(&BackendConfig::default(), Duration::from_secs(1));
        assert_eq!(ollama.name(), "Ollama");

        let openai = build_backend(
            &BackendConfig::OpenAI {
                api_key: "k".to_string(),
                base_url: None,
            },
            Duration::from_secs(1),
        );
        assert_eq!(openai.name(), "OpenAI");
    }
}
