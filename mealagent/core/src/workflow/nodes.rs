//! Graph Nodes and Decision Functions
//!
//! [`MealPlanner`] owns the model adapter and image loader and implements
//! the per-node state transitions. Model-backed nodes never fail: errors
//! are pushed onto [`ConversationState::errors`] and the prior value of the
//! field they would have written is kept. The decision functions are pure.

use crate::backend::ModelAdapter;
use crate::images::ImageLoader;
use crate::messages::ChatMessage;
use crate::schema::{Clarification, ImageAnalysis, Recipe};
use crate::state::ConversationState;

use super::interrupt::{ClarificationAnswer, Interrupt, ReviewDecision};
use super::prompts;
use super::{NodeName, Route};

/// Error recorded when a run starts without images
pub const NO_IMAGES_ERROR: &str = "No images provided";

/// Human turn appended on approval
pub const APPROVED_MESSAGE: &str = "I have approved this meal";

/// Human turn appended on rejection
pub const REJECTED_MESSAGE: &str = "I have rejected this meal. Please generate another one";

/// Human turn appended when there was nothing to review
pub const NO_RECIPE_MESSAGE: &str = "No meal recipe was available to approve/reject.";

/// Executes the meal workflow's nodes
#[derive(Clone)]
pub struct MealPlanner {
    adapter: ModelAdapter,
    images: ImageLoader,
}

impl MealPlanner {
    /// Create a planner
    #[must_use]
    pub fn new(adapter: ModelAdapter, images: ImageLoader) -> Self {
        Self { adapter, images }
    }

    /// Analyse the input images
    pub async fn process_images(&self, state: &mut ConversationState) {
        state.current_node = Some(NodeName::AnalyzeImages);
        state.mark_started();

        if state.input.images.is_empty() {
            state.record_error(NO_IMAGES_ERROR);
            return;
        }

        let images = match self.images.load_all(&state.input.images).await {
            Ok(images) => images,
            Err(e) => {
                state.record_error(e.to_string());
                return;
            }
        };

        tracing::info!(count = images.len(), "Analyzing images");

        let system = ChatMessage::system(prompts::IMAGE_ANALYST_SYSTEM);
        let human = images
            .into_iter()
            .fold(ChatMessage::human(prompts::IMAGE_ANALYSIS_REQUEST), ChatMessage::with_image);

        let mut outgoing = state.messages().to_vec();
        outgoing.push(system.clone());
        outgoing.push(human.clone());

        match self.adapter.invoke::<ImageAnalysis>(&outgoing).await {
            Ok(analysis) => {
                tracing::info!(
                    item = analysis.item_name.as_deref().unwrap_or("-"),
                    needs_clarification = analysis.wants_clarification(),
                    "Image analysis complete"
                );
                let summary = ChatMessage::assistant(prompts::analysis_summary(&analysis));
                state.extend_messages([system, human, summary]);
                state.image_analysis = analysis;
            }
            Err(e) => state.record_error(e.to_string()),
        }
    }

    /// Suspend for a clarification answer
    pub fn request_clarification(&self, state: &mut ConversationState) -> Interrupt {
        state.current_node = Some(NodeName::Clarify);
        state.needs_human = true;

        let question = state
            .image_analysis
            .question()
            .unwrap_or(prompts::DEFAULT_CLARIFICATION_QUESTION);
        state.clarification = Some(Clarification::new(question));

        Interrupt::Clarification {
            instruction: prompts::CLARIFICATION_INSTRUCTION.to_string(),
            question: state.clarification.clone(),
        }
    }

    /// Fold a clarification answer into the state
    pub fn apply_clarification(&self, state: &mut ConversationState, answer: ClarificationAnswer) {
        match answer {
            ClarificationAnswer::Image { url } => {
                tracing::info!(image = %url, "Replacing images with clarification image");
                state.input.images = vec![url];
            }
            ClarificationAnswer::Text { text } => {
                state.push_message(ChatMessage::human(text));
            }
        }
        state.clear_human_request();
    }

    /// Ask the model for a recipe
    pub async fn generate_meal_recipe(&self, state: &mut ConversationState) {
        state.current_node = Some(NodeName::GenerateRecipe);

        let inventory = state.image_analysis.inventory_line();
        let request = prompts::recipe_request(&state.input, &inventory, &state.rejected_recipes);
        let messages = [
            ChatMessage::system(prompts::CHEF_SYSTEM),
            ChatMessage::human(request),
        ];

        match self.adapter.invoke::<Recipe>(&messages).await {
            Ok(mut recipe) => {
                if recipe.steps.is_empty() {
                    tracing::warn!(meal = recipe.display_name(), "Recipe had no steps, using fallback");
                    recipe.steps = prompts::FALLBACK_STEPS.iter().map(ToString::to_string).collect();
                }
                recipe.approved = None;
                tracing::info!(meal = recipe.display_name(), steps = recipe.steps.len(), "Recipe generated");
                state.recipe = Some(recipe);
            }
            Err(e) => state.record_error(format!("Chef Error: {e}")),
        }
    }

    /// Suspend for approval of the current recipe
    pub fn request_review(&self, state: &mut ConversationState) -> Interrupt {
        state.current_node = Some(NodeName::ReviewRecipe);
        state.needs_human = true;

        Interrupt::RecipeReview {
            instruction: prompts::REVIEW_INSTRUCTION.to_string(),
            recipe: state.recipe.clone(),
        }
    }

    /// Fold a review decision into the state and pick the next step
    pub fn apply_review(&self, state: &mut ConversationState, decision: ReviewDecision) -> Route {
        let route = regenerate_meal(state, decision);

        let reviewed = state.recipe.as_mut().map(|recipe| {
            recipe.approved = Some(decision == ReviewDecision::Approve);
            recipe.display_name().to_string()
        });

        match (reviewed, decision) {
            (Some(_), ReviewDecision::Approve) => {
                state.push_message(ChatMessage::human(APPROVED_MESSAGE));
            }
            (Some(name), ReviewDecision::Reject) => {
                state.push_message(ChatMessage::human(REJECTED_MESSAGE));
                state.rejected_recipes.push(name);
            }
            (None, _) => {
                state.push_message(ChatMessage::human(NO_RECIPE_MESSAGE));
            }
        }
        state.clear_human_request();

        tracing::info!(?decision, next = %route, "Review applied");
        route
    }
}

/// Route after image analysis
#[must_use]
pub fn decision_node(state: &ConversationState) -> NodeName {
    if state.image_analysis.wants_clarification() {
        NodeName::Clarify
    } else {
        NodeName::GenerateRecipe
    }
}

/// Route after a review decision
#[must_use]
pub fn regenerate_meal(state: &ConversationState, decision: ReviewDecision) -> Route {
    match (&state.recipe, decision) {
        (Some(_), ReviewDecision::Approve) => Route::End,
        _ => Route::Node(NodeName::GenerateRecipe),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::backend::test_utils::MockBackend;
    use crate::messages::MessageRole;
    use crate::schema::ConversationInput;

    fn planner(backend: Arc<MockBackend>) -> MealPlanner {
        MealPlanner::new(
            ModelAdapter::new(backend, "llava"),
            ImageLoader::new(Duration::from_secs(1)),
        )
    }

    fn state_with_recipe(name: &str) -> ConversationState {
        let mut state = ConversationState::new(ConversationInput::default());
        state.recipe = Some(Recipe {
            name: Some(name.to_string()),
            steps: vec!["cook".to_string()],
            ..Default::default()
        });
        state
    }

    #[test]
    fn test_decision_node_routes_on_flag() {
        let mut state = ConversationState::new(ConversationInput::default());
        assert_eq!(decision_node(&state), NodeName::GenerateRecipe);

        state.image_analysis.needs_clarification = Some(false);
        assert_eq!(decision_node(&state), NodeName::GenerateRecipe);

        state.image_analysis.needs_clarification = Some(true);
        assert_eq!(decision_node(&state), NodeName::Clarify);
    }

    #[test]
    fn test_regenerate_meal_routes() {
        let state = state_with_recipe("Pasta");
        assert_eq!(regenerate_meal(&state, ReviewDecision::Approve), Route::End);
        assert_eq!(
            regenerate_meal(&state, ReviewDecision::Reject),
            Route::Node(NodeName::GenerateRecipe)
        );

        let empty = ConversationState::new(ConversationInput::default());
        assert_eq!(
            regenerate_meal(&empty, ReviewDecision::Approve),
            Route::Node(NodeName::GenerateRecipe)
        );
    }

    #[tokio::test]
    async fn test_missing_images_skip_model() {
        let backend = Arc::new(MockBackend::new());
        let planner = planner(backend.clone());
        let mut state = ConversationState::new(ConversationInput::default());

        planner.process_images(&mut state).await;

        assert_eq!(state.errors, vec![NO_IMAGES_ERROR.to_string()]);
        assert_eq!(backend.request_count(), 0);
        assert!(state.messages().is_empty());
        assert!(state.execution_time.start_time.is_some());
    }

    #[tokio::test]
    async fn test_unreadable_image_recorded_once() {
        let backend = Arc::new(MockBackend::new());
        let planner = planner(backend.clone());
        let mut state = ConversationState::new(ConversationInput::new(
            "Quick Meal",
            "",
            vec!["/definitely/not/here.jpg".to_string()],
        ));

        planner.process_images(&mut state).await;

        assert_eq!(state.errors.len(), 1);
        assert_eq!(backend.request_count(), 0);
    }

    #[test]
    fn test_text_clarification_appends_one_message() {
        let backend = Arc::new(MockBackend::new());
        let planner = planner(backend);
        let mut state = ConversationState::new(ConversationInput::default());
        state.image_analysis.needs_clarification = Some(true);

        let interrupt = planner.request_clarification(&mut state);
        assert!(state.needs_human);
        assert!(matches!(interrupt, Interrupt::Clarification { question: Some(_), .. }));

        planner.apply_clarification(
            &mut state,
            ClarificationAnswer::Text {
                text: "They are sweet potatoes".to_string(),
            },
        );

        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].role, MessageRole::Human);
        assert_eq!(state.messages()[0].text(), "They are sweet potatoes");
        assert!(!state.needs_human);
        assert!(state.clarification.is_none());
    }

    #[test]
    fn test_image_clarification_replaces_images() {
        let backend = Arc::new(MockBackend::new());
        let planner = planner(backend);
        let mut state = ConversationState::new(ConversationInput::new(
            "",
            "",
            vec!["a.jpg".to_string(), "b.jpg".to_string()],
        ));

        planner.apply_clarification(
            &mut state,
            ClarificationAnswer::Image {
                url: "clearer.jpg".to_string(),
            },
        );

        assert_eq!(state.input.images, vec!["clearer.jpg".to_string()]);
        assert!(state.messages().is_empty());
    }

    #[tokio::test]
    async fn test_chef_error_keeps_prior_recipe() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(429, "quota exceeded");
        let planner = planner(backend);
        let mut state = state_with_recipe("Old Faithful");

        planner.generate_meal_recipe(&mut state).await;

        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].starts_with("Chef Error: "));
        assert!(state.errors[0].contains("429"));
        assert_eq!(
            state.recipe.as_ref().and_then(|r| r.name.as_deref()),
            Some("Old Faithful")
        );
    }

    #[tokio::test]
    async fn test_empty_steps_get_fallback() {
        let backend = Arc::new(MockBackend::new());
        backend.push_json(serde_json::json!({
            "meal_name": "Toast",
            "cooking_steps": []
        }));
        let planner = planner(backend);
        let mut state = ConversationState::new(ConversationInput::default());

        planner.generate_meal_recipe(&mut state).await;

        let recipe = state.recipe.expect("recipe");
        assert_eq!(recipe.steps.len(), 3);
        assert_eq!(recipe.steps[0], prompts::FALLBACK_STEPS[0]);
    }

    #[test]
    fn test_reject_remembers_name() {
        let backend = Arc::new(MockBackend::new());
        let planner = planner(backend);
        let mut state = state_with_recipe("Pasta");
        state.needs_human = true;

        let route = planner.apply_review(&mut state, ReviewDecision::Reject);

        assert_eq!(route, Route::Node(NodeName::GenerateRecipe));
        assert_eq!(state.recipe.as_ref().and_then(|r| r.approved), Some(false));
        assert_eq!(state.rejected_recipes, vec!["Pasta".to_string()]);
        assert_eq!(state.messages()[0].text(), REJECTED_MESSAGE);
        assert!(!state.needs_human);
    }

    #[test]
    fn test_review_without_recipe() {
        let backend = Arc::new(MockBackend::new());
        let planner = planner(backend);
        let mut state = ConversationState::new(ConversationInput::default());

        let route = planner.apply_review(&mut state, ReviewDecision::Approve);

        assert_eq!(route, Route::Node(NodeName::GenerateRecipe));
        assert_eq!(state.messages()[0].text(), NO_RECIPE_MESSAGE);
    }
}
