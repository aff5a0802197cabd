//! Schema Layer
//!
//! Typed records exchanged between workflow nodes and with the model. The
//! model-facing records derive [`JsonSchema`] so the adapter can ask the
//! provider for output that matches them; wire names follow the prompt
//! wording (`meal_name`, `cooking_steps`, ...) while the Rust fields use
//! shorter names.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` as the type's default
///
/// Models regularly emit `"cooking_steps": null` instead of omitting the
/// field; every list in the schema goes through this.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What the user asked for at the start of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInput {
    /// Free-text goal, e.g. "Quick Meal"
    pub goal: Option<String>,
    /// Free-text instructions, e.g. "vegetarian"
    pub instructions: Option<String>,
    /// Image references (paths, `data:` URLs or `http(s)` URLs)
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
}

impl ConversationInput {
    /// Input with a goal, instructions and images
    pub fn new(
        goal: impl Into<String>,
        instructions: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            goal: Some(goal.into()),
            instructions: Some(instructions.into()),
            images,
        }
    }
}

/// A question for the human
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Clarification {
    /// Clear, specific question that would resolve the ambiguity
    pub question: Option<String>,
}

impl Clarification {
    /// Wrap a question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
        }
    }
}

/// Structured result of the image-analysis node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageAnalysis {
    /// Name of the meal or ingredient shown, if identifiable
    #[serde(rename = "image_name")]
    pub item_name: Option<String>,
    /// Brief description of what the image contains
    #[serde(rename = "image_description")]
    pub description: Option<String>,
    /// True when the image is unclear, incomplete or ambiguous
    #[serde(rename = "clarification_needed")]
    pub needs_clarification: Option<bool>,
    /// Question to ask the user when clarification is needed
    pub clarification_question: Option<Clarification>,
}

impl ImageAnalysis {
    /// Whether the analysis asks for human help
    #[must_use]
    pub fn wants_clarification(&self) -> bool {
        self.needs_clarification == Some(true)
    }

    /// The question text, if the model supplied one
    #[must_use]
    pub fn question(&self) -> Option<&str> {
        self.clarification_question
            .as_ref()
            .and_then(|c| c.question.as_deref())
    }

    /// `"name: description"` line used as recipe inventory
    #[must_use]
    pub fn inventory_line(&self) -> String {
        format!(
            "{}: {}",
            self.item_name.as_deref().unwrap_or("unidentified item"),
            self.description.as_deref().unwrap_or("no description")
        )
    }
}

/// One ingredient of a recipe
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Ingredient {
    /// Ingredient name, with quantity if known
    #[serde(rename = "ingredient_name")]
    pub name: Option<String>,
}

impl Ingredient {
    /// Named ingredient
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Structured result of the recipe-generation node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recipe {
    /// Name of the meal
    #[serde(rename = "meal_name")]
    pub name: Option<String>,
    /// Short description of the meal
    #[serde(rename = "meal_description")]
    pub description: Option<String>,
    /// Every ingredient the meal uses
    #[serde(
        rename = "ingredients_list",
        default,
        deserialize_with = "null_as_default"
    )]
    #[schemars(with = "Vec<Ingredient>")]
    pub ingredients: Vec<Ingredient>,
    /// Items found in the photos
    #[serde(rename = "what_you_have", default, deserialize_with = "null_as_default")]
    #[schemars(with = "Vec<String>")]
    pub have: Vec<String>,
    /// Missing essentials to buy
    #[serde(
        rename = "what_you_need_to_buy",
        default,
        deserialize_with = "null_as_default"
    )]
    #[schemars(with = "Vec<String>")]
    pub to_buy: Vec<String>,
    /// How long the meal takes, e.g. "25 minutes"
    #[serde(rename = "duration_of_the_meal")]
    pub duration: Option<String>,
    /// Step-by-step instructions on how to prepare the meal
    #[serde(rename = "cooking_steps", default, deserialize_with = "null_as_default")]
    #[schemars(with = "Vec<String>")]
    pub steps: Vec<String>,
    /// Human verdict: unset until reviewed
    #[serde(rename = "approve", default)]
    #[schemars(skip)]
    pub approved: Option<bool>,
}

impl Recipe {
    /// Display name, falling back to a placeholder
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled meal")
    }
}
