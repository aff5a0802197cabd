//! Interrupt Payloads and Resume Values
//!
//! A run suspends at a human node with an [`Interrupt`] describing what the
//! human is asked, and is resumed later with a [`ResumeValue`]. Both are
//! tagged enums so that the shape of an answer is checked once, at the
//! boundary, instead of being sniffed from ad hoc keys.

use serde::{Deserialize, Serialize};

use crate::schema::{Clarification, Recipe};

/// What a suspended run is waiting for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interrupt {
    /// Image analysis was ambiguous
    Clarification {
        /// Text shown above the question
        instruction: String,
        /// Question from the analysis
        question: Option<Clarification>,
    },
    /// A recipe is waiting for approval
    RecipeReview {
        /// Text shown above the recipe
        instruction: String,
        /// The recipe to review (absent if generation failed)
        recipe: Option<Recipe>,
    },
}

impl Interrupt {
    /// Which answer this interrupt accepts
    #[must_use]
    pub fn kind(&self) -> InterruptKind {
        match self {
            Self::Clarification { .. } => InterruptKind::Clarification,
            Self::RecipeReview { .. } => InterruptKind::RecipeReview,
        }
    }

    /// The instruction text
    #[must_use]
    pub fn instruction(&self) -> &str {
        match self {
            Self::Clarification { instruction, .. } | Self::RecipeReview { instruction, .. } => {
                instruction
            }
        }
    }
}

/// Discriminant shared by [`Interrupt`] and [`ResumeValue`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    /// Clarification question
    Clarification,
    /// Recipe approval
    RecipeReview,
}

impl std::fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clarification => write!(f, "clarification"),
            Self::RecipeReview => write!(f, "recipe review"),
        }
    }
}

/// The human's answer to a clarification question
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClarificationAnswer {
    /// A replacement image; becomes the whole image list
    #[serde(rename = "image_url")]
    Image {
        /// Image reference (path, `data:` or `http(s)` URL)
        url: String,
    },
    /// A free-text answer; appended to the log as a human turn
    Text {
        /// The answer
        text: String,
    },
}

/// The human's verdict on a recipe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Keep the recipe and finish
    Approve,
    /// Generate another recipe
    Reject,
}

/// Value supplied when resuming a suspended run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "answer", rename_all = "snake_case")]
pub enum ResumeValue {
    /// Answer to [`Interrupt::Clarification`]
    Clarification(ClarificationAnswer),
    /// Answer to [`Interrupt::RecipeReview`]
    RecipeReview(ReviewDecision),
}

impl ResumeValue {
    /// Text answer to a clarification
    pub fn text(text: impl Into<String>) -> Self {
        Self::Clarification(ClarificationAnswer::Text { text: text.into() })
    }

    /// Replacement image for a clarification
    pub fn image(url: impl Into<String>) -> Self {
        Self::Clarification(ClarificationAnswer::Image { url: url.into() })
    }

    /// Approve the recipe
    #[must_use]
    pub fn approve() -> Self {
        Self::RecipeReview(ReviewDecision::Approve)
    }

    /// Reject the recipe
    #[must_use]
    pub fn reject() -> Self {
        Self::RecipeReview(ReviewDecision::Reject)
    }

    /// Which interrupt this value answers
    #[must_use]
    pub fn kind(&self) -> InterruptKind {
        match self {
            Self::Clarification(_) => InterruptKind::Clarification,
            Self::RecipeReview(_) => InterruptKind::RecipeReview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_line_up() {
        let interrupt = Interrupt::Clarification {
            instruction: "Image clarification needed".to_string(),
            question: None,
        };
        assert_eq!(interrupt.kind(), ResumeValue::text("sweet potatoes").kind());
        assert_ne!(interrupt.kind(), ResumeValue::approve().kind());
        assert_eq!(interrupt.instruction(), "Image clarification needed");
    }

    #[test]
    fn test_clarification_answer_wire_shape() {
        let image: ClarificationAnswer =
            serde_json::from_value(serde_json::json!({"type": "image_url", "url": "shelf.jpg"}))
                .unwrap();
        assert_eq!(
            image,
            ClarificationAnswer::Image {
                url: "shelf.jpg".to_string()
            }
        );

        let text: ClarificationAnswer =
            serde_json::from_value(serde_json::json!({"type": "text", "text": "leeks"})).unwrap();
        assert_eq!(
            text,
            ClarificationAnswer::Text {
                text: "leeks".to_string()
            }
        );

        let unknown = serde_json::from_value::<ClarificationAnswer>(
            serde_json::json!({"type": "audio", "url": "x"}),
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn test_resume_value_wire_shape() {
        let value = serde_json::to_value(ResumeValue::reject()).unwrap();
        assert_eq!(value["kind"], "recipe_review");
        assert_eq!(value["answer"], "reject");
    }
}
