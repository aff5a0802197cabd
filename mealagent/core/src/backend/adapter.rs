//! Structured-Output Model Adapter
//!
//! The single boundary between untyped backend replies and the schema
//! layer. Given a conversation and a target type, the adapter sends the
//! type's JSON schema to the backend and parses the reply into that type.
//! Nothing downstream ever sees a `serde_json::Value` from the model.

use std::sync::Arc;

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use super::traits::{BackendError, ChatBackend, ChatRequest};
use crate::messages::ChatMessage;

/// Typed front end over a [`ChatBackend`]
#[derive(Clone)]
pub struct ModelAdapter {
    backend: Arc<dyn ChatBackend>,
    model: String,
    temperature: f32,
}

impl ModelAdapter {
    /// Wrap a backend and the model to request
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: 0.2,
        }
    }

    /// Set sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for a `T`
    ///
    /// # Errors
    ///
    /// Returns the backend's error on transport or provider failure, and
    /// [`BackendError::Schema`] when the reply does not parse as `T`.
    pub async fn invoke<T>(&self, messages: &[ChatMessage]) -> Result<T, BackendError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema_name = T::schema_name();
        let schema = schema_value::<T>().map_err(|e| BackendError::Schema {
            schema: schema_name.clone(),
            reason: e.to_string(),
        })?;

        let request = ChatRequest::new(self.model.clone(), messages.to_vec())
            .with_schema(schema_name.clone(), schema)
            .with_temperature(self.temperature);

        let response = self.backend.complete(&request).await?;

        tracing::info!(
            backend = self.backend.name(),
            model = %response.model,
            schema = %schema_name,
            tokens = response.tokens_used,
            duration_ms = response.duration_ms,
            "Structured response received"
        );

        parse_structured(&schema_name, &response.content)
    }
}

/// JSON schema for `T` with every subschema inlined
///
/// Some providers reject `$ref`, so definitions are expanded in place.
fn schema_value<T: JsonSchema>() -> Result<serde_json::Value, serde_json::Error> {
    let root = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>();
    serde_json::to_value(root)
}

/// Parse reply text into `T`, tolerating a surrounding markdown fence
fn parse_structured<T: DeserializeOwned>(schema: &str, content: &str) -> Result<T, BackendError> {
    let json = strip_code_fence(content);
    serde_json::from_str(json).map_err(|e| BackendError::Schema {
        schema: schema.to_string(),
        reason: e.to_string(),
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
