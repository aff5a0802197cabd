//! Mealagent Core - From a Photo of Ingredients to an Approved Recipe
//!
//! This crate provides the headless workflow behind mealagent: a vision
//! model looks at photos of ingredients, asks the human when a photo is
//! ambiguous, proposes a recipe, and waits for the human to approve or
//! reject it. Runs survive process restarts through per-thread checkpoints.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      mealagent CLI (clap)                        │
//! │          start / resume / show / models   +  config/env          │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ Command::{Start, Resume}
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          MEALAGENT CORE                          │
//! │  ┌─────────────────────────────────────────────────────────────┐ │
//! │  │                      MealWorkflow                           │ │
//! │  │   AnalyzeImages ─► Clarify? ─► GenerateRecipe ─► Review     │ │
//! │  └──────┬──────────────────┬───────────────────────────┬───────┘ │
//! │         │                  │                           │         │
//! │  ┌──────┴──────┐   ┌───────┴───────┐          ┌────────┴───────┐ │
//! │  │ MealPlanner │   │ ModelAdapter  │          │  Checkpointer  │ │
//! │  │   (nodes)   │   │ (schemas)     │          │ (memory/file)  │ │
//! │  └─────────────┘   └───────┬───────┘          └────────────────┘ │
//! │                            │                                     │
//! │                 ┌──────────┴──────────┐                          │
//! │                 │     ChatBackend     │                          │
//! │                 │  Ollama │ OpenAI    │                          │
//! │                 └─────────────────────┘                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`MealWorkflow`]: Runs a thread until it suspends or completes
//! - [`ConversationState`]: Everything a run knows, persisted per thread
//! - [`Interrupt`] / [`ResumeValue`]: What the human is asked, and answers
//! - [`ModelAdapter`]: Typed structured output over any [`ChatBackend`]
//!
//! # Quick Start
//!
//! ```ignore
//! use mealagent_core::{
//!     backend::{build_backend, ModelAdapter},
//!     images::ImageLoader,
//!     workflow::{Command, InMemoryCheckpointer, MealPlanner, MealWorkflow, ResumeValue},
//!     ConversationInput, ThreadId,
//! };
//!
//! let config = mealagent_core::load_config()?;
//! let backend = build_backend(&config.backend_config()?, config.request_timeout);
//! let planner = MealPlanner::new(
//!     ModelAdapter::new(backend, config.model.clone()),
//!     ImageLoader::default(),
//! );
//! let workflow = MealWorkflow::new(planner, Arc::new(InMemoryCheckpointer::new()));
//!
//! let thread = ThreadId::new();
//! let input = ConversationInput::new("Quick Meal", "vegetarian", vec!["fridge.jpg".into()]);
//! let outcome = workflow.invoke(&thread, Command::Start(input)).await?;
//! // ... show outcome.interrupt() to the human ...
//! let outcome = workflow.invoke(&thread, Command::Resume(ResumeValue::approve())).await?;
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Chat backends (Ollama, OpenAI-compatible) and the model adapter
//! - [`config`]: TOML/env configuration
//! - [`images`]: Loading image references into base64 payloads
//! - [`messages`]: Chat messages and identifiers
//! - [`schema`]: Structured-output records exchanged with the model
//! - [`state`]: The per-thread workflow state
//! - [`workflow`]: Nodes, interrupts, checkpoints and the runner

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod images;
pub mod messages;
pub mod schema;
pub mod state;
pub mod workflow;

pub use backend::{
    build_backend, BackendConfig, BackendError, ChatBackend, ChatRequest, ChatResponse,
    ModelAdapter, OllamaBackend, OpenAiBackend,
};
pub use images::{ImageData, ImageError, ImageLoader};
pub use messages::{ChatMessage, ContentPart, MessageId, MessageRole, ThreadId};
pub use schema::{Clarification, ConversationInput, ImageAnalysis, Ingredient, Recipe};
pub use state::{ConversationState, ExecutionTime};
pub use workflow::{
    Checkpoint, Checkpointer, ClarificationAnswer, Command, FileCheckpointer,
    InMemoryCheckpointer, Interrupt, MealPlanner, MealWorkflow, NodeName, ResumeValue,
    ReviewDecision, Route, RunOutcome, WorkflowConfig, WorkflowError,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, MealAgentConfig, MealAgentToml,
};
