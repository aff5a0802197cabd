//! Prompt text for the model-backed nodes.

use crate::schema::{ConversationInput, ImageAnalysis};

/// System instruction for the image-analysis node
pub const IMAGE_ANALYST_SYSTEM: &str = "\
You are a meal-planning assistant with strong visual understanding skills.

You analyze photos related to food and cooking: raw ingredients, the inside \
of a fridge or pantry, prepared meals, or packaged food items.

Identify what each image shows and describe it clearly. Do not guess when an \
image is unclear or ambiguous; flag it so the user can be asked instead.";

/// Human-turn text sent alongside the images
pub const IMAGE_ANALYSIS_REQUEST: &str = "\
Analyze the provided image(s).

Based on what you can see, return:
- image_name: the name of the meal or ingredients shown (if identifiable)
- image_description: a brief description of what the image contains
- clarification_needed: whether you need the user to clarify anything

If an image is unclear, incomplete, or could show several different things, \
set clarification_needed to true and put one clear, specific question in \
clarification_question that would let you identify the food.";

/// System instruction for the recipe-generation node
pub const CHEF_SYSTEM: &str = "\
You are a professional, resourceful chef.
Suggest ONE meal based on the ingredients provided.

You must give clear, non-empty, step-by-step cooking instructions in \
cooking_steps.

Rules:
- Put items that were found in the photos in what_you_have.
- Put missing essentials in what_you_need_to_buy.
- Respect any time budget stated in the user's goal or instructions.";

/// Question used when the model flags ambiguity but asks nothing
pub const DEFAULT_CLARIFICATION_QUESTION: &str =
    "The photo is unclear. Could you tell me what ingredients it shows, or upload a clearer picture?";

/// Instruction shown with a clarification interrupt
pub const CLARIFICATION_INSTRUCTION: &str = "Image clarification needed";

/// Instruction shown with a recipe review interrupt
pub const REVIEW_INSTRUCTION: &str = "Approve or reject meal";

/// Steps substituted when the model returns a recipe without any
pub const FALLBACK_STEPS: [&str; 3] = [
    "Gather and prepare all of the ingredients listed above.",
    "Cook the main ingredients together over medium heat until done, seasoning to taste.",
    "Plate the meal and serve it warm.",
];

/// Human-turn text for the recipe request
#[must_use]
pub fn recipe_request(input: &ConversationInput, inventory: &str, rejected: &[String]) -> String {
    let mut prompt = format!(
        "User goal: {}\nExtra instructions: {}\n\nInventory detected in photos:\n{}\n",
        input.goal.as_deref().unwrap_or("not specified"),
        input.instructions.as_deref().unwrap_or("none"),
        inventory,
    );

    if !rejected.is_empty() {
        prompt.push_str("\nThe user already rejected these meals, suggest something different:\n");
        for name in rejected {
            prompt.push_str("- ");
            prompt.push_str(name);
            prompt.push('\n');
        }
    }

    prompt
}

/// Assistant-turn text recording what the analysis found
#[must_use]
pub fn analysis_summary(analysis: &ImageAnalysis) -> String {
    let mut summary = format!("I see {}", analysis.inventory_line());
    if analysis.wants_clarification() {
        summary.push_str("\nI need clarification: ");
        summary.push_str(analysis.question().unwrap_or(DEFAULT_CLARIFICATION_QUESTION));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_request_embeds_goal_and_inventory() {
        let input = ConversationInput::new("Quick Meal", "vegetarian", vec![]);
        let prompt = recipe_request(&input, "Eggs: a dozen eggs", &[]);

        assert!(prompt.contains("User goal: Quick Meal"));
        assert!(prompt.contains("Extra instructions: vegetarian"));
        assert!(prompt.contains("Eggs: a dozen eggs"));
        assert!(!prompt.contains("rejected"));
    }

    #[test]
    fn test_recipe_request_lists_rejections() {
        let prompt = recipe_request(
            &ConversationInput::default(),
            "x: y",
            &["Omelette".to_string()],
        );
        assert!(prompt.contains("User goal: not specified"));
        assert!(prompt.contains("- Omelette"));
    }

    #[test]
    fn test_analysis_summary_mentions_question() {
        let analysis = ImageAnalysis {
            item_name: Some("Potatoes".to_string()),
            needs_clarification: Some(true),
            ..Default::default()
        };
        let summary = analysis_summary(&analysis);
        assert!(summary.starts_with("I see Potatoes"));
        assert!(summary.contains(DEFAULT_CLARIFICATION_QUESTION));
    }
}
