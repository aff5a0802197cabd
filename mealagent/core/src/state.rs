//! Workflow State
//!
//! [`ConversationState`] is the aggregate passed between graph nodes and
//! persisted in checkpoints. Node failures are recorded here as degraded
//! state (an entry in `errors`) rather than returned as `Err`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::ChatMessage;
use crate::schema::{Clarification, ConversationInput, ImageAnalysis, Recipe};
use crate::workflow::NodeName;

/// Default retry budget carried in state
///
/// No node reads it; model calls are never retried automatically.
pub const DEFAULT_RETRY_BUDGET: u32 = 2;

/// Wall-clock bounds of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTime {
    /// When image analysis first ran
    pub start_time: Option<DateTime<Utc>>,
    /// When the run reached END
    pub end_time: Option<DateTime<Utc>>,
    /// `end_time - start_time` in milliseconds
    pub duration_ms: Option<i64>,
}

/// Aggregate state of one conversation thread
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Role-tagged message log (append-only)
    messages: Vec<ChatMessage>,
    /// Current input
    pub input: ConversationInput,
    /// Latest image analysis (empty until the analysis node succeeds)
    #[serde(default)]
    pub image_analysis: ImageAnalysis,
    /// Latest generated recipe
    pub recipe: Option<Recipe>,
    /// Accumulated node failures, oldest first
    #[serde(default)]
    pub errors: Vec<String>,
    /// Unused retry budget
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// Question currently put to the human
    pub clarification: Option<Clarification>,
    /// Whether the run is waiting on the human
    #[serde(default)]
    pub needs_human: bool,
    /// Names of recipes the human rejected during this run
    #[serde(default)]
    pub rejected_recipes: Vec<String>,
    /// Run timing
    #[serde(default)]
    pub execution_time: ExecutionTime,
    /// Node currently (or most recently) executing
    pub current_node: Option<NodeName>,
}

fn default_retry_budget() -> u32 {
    DEFAULT_RETRY_BUDGET
}

impl ConversationState {
    /// Fresh state for a new run
    #[must_use]
    pub fn new(input: ConversationInput) -> Self {
        Self {
            messages: Vec::new(),
            input,
            image_analysis: ImageAnalysis::default(),
            recipe: None,
            errors: Vec::new(),
            retry_budget: DEFAULT_RETRY_BUDGET,
            clarification: None,
            needs_human: false,
            rejected_recipes: Vec::new(),
            execution_time: ExecutionTime::default(),
            current_node: None,
        }
    }

    /// The message log
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append one message
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append several messages in order
    pub fn extend_messages(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    /// Record a node failure
    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!(error = %error, "Recorded workflow error");
        self.errors.push(error);
    }

    /// Record the start of the run (first call wins)
    pub fn mark_started(&mut self) {
        if self.execution_time.start_time.is_none() {
            self.execution_time.start_time = Some(Utc::now());
        }
    }

    /// Record the end of the run and its duration
    pub fn mark_finished(&mut self) {
        let end = Utc::now();
        self.execution_time.end_time = Some(end);
        self.execution_time.duration_ms = self
            .execution_time
            .start_time
            .map(|start| (end - start).num_milliseconds());
    }

    /// Clear the pending-question flags after the human answered
    pub fn clear_human_request(&mut self) {
        self.needs_human = false;
        self.clarification = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let state = ConversationState::new(ConversationInput::default());
        assert!(state.messages().is_empty());
        assert_eq!(state.image_analysis, ImageAnalysis::default());
        assert!(state.recipe.is_none());
        assert_eq!(state.retry_budget, DEFAULT_RETRY_BUDGET);
        assert!(!state.needs_human);
        assert!(state.current_node.is_none());
    }

    #[test]
    fn test_message_log_appends_in_order() {
        let mut state = ConversationState::new(ConversationInput::default());
        state.push_message(ChatMessage::system("rules"));
        state.extend_messages([ChatMessage::human("a"), ChatMessage::human("b")]);

        let texts: Vec<String> = state.messages().iter().map(ChatMessage::text).collect();
        assert_eq!(texts, vec!["rules", "a", "b"]);
    }

    #[test]
    fn test_timing() {
        let mut state = ConversationState::new(ConversationInput::default());
        state.mark_started();
        let started = state.execution_time.start_time;
        state.mark_started();
        assert_eq!(state.execution_time.start_time, started);

        state.mark_finished();
        assert!(state.execution_time.end_time.is_some());
        assert!(state.execution_time.duration_ms.unwrap_or(-1) >= 0);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let json = serde_json::json!({
            "messages": [],
            "input": { "goal": "Quick Meal", "instructions": null, "images": ["fridge.jpg"] },
            "recipe": null,
            "clarification": null,
            "current_node": null
        });

        let state: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(state.retry_budget, DEFAULT_RETRY_BUDGET);
        assert!(state.errors.is_empty());
        assert_eq!(state.input.images, vec!["fridge.jpg".to_string()]);
    }
}
