//! Meal Workflow
//!
//! The workflow is a small state machine over four nodes:
//!
//! ```text
//! START ─► AnalyzeImages ─┬─► Clarify ──(resume)──► AnalyzeImages
//!                         └─► GenerateRecipe ─► ReviewRecipe ─┬─(approve)─► END
//!                                   ▲                         │
//!                                   └────────(reject)─────────┘
//! ```
//!
//! `Clarify` and `ReviewRecipe` are human nodes: entering one suspends the
//! run with an [`Interrupt`] and saves a [`Checkpoint`]. The run continues
//! when [`MealWorkflow::invoke`] is called again with a matching
//! [`ResumeValue`] for the same thread.

mod checkpoint;
mod interrupt;
mod nodes;
pub mod prompts;
mod runner;

use serde::{Deserialize, Serialize};

pub use checkpoint::{
    default_checkpoint_dir, Checkpoint, CheckpointError, Checkpointer, FileCheckpointer,
    InMemoryCheckpointer,
};
pub use interrupt::{ClarificationAnswer, Interrupt, InterruptKind, ResumeValue, ReviewDecision};
pub use nodes::{
    decision_node, regenerate_meal, MealPlanner, APPROVED_MESSAGE, NO_IMAGES_ERROR,
    NO_RECIPE_MESSAGE, REJECTED_MESSAGE,
};
pub use runner::{
    Command, MealWorkflow, RunOutcome, WorkflowConfig, WorkflowError, DEFAULT_MAX_STEPS,
};

/// A node of the workflow graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    /// Vision analysis of the input images
    AnalyzeImages,
    /// Human clarification of an ambiguous analysis
    Clarify,
    /// Recipe generation from the analysis
    GenerateRecipe,
    /// Human approval of the recipe
    ReviewRecipe,
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AnalyzeImages => "process_images",
            Self::Clarify => "image_clarification",
            Self::GenerateRecipe => "generate_meal_recipe",
            Self::ReviewRecipe => "review_meal",
        };
        write!(f, "{name}")
    }
}

/// Where the run goes next
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Execute a node
    Node(NodeName),
    /// Finish the run
    End,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(node) => write!(f, "{node}"),
            Self::End => write!(f, "END"),
        }
    }
}
