//! Workflow Runner
//!
//! [`MealWorkflow`] drives a thread through the graph until it either
//! suspends at a human node or reaches END, persisting a checkpoint at both
//! points. Every node executes inside a `tracing` span carrying `node` and
//! `thread_id`, so log lines from the adapter and nodes are attributed
//! without any shared logger state.

use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;

use super::checkpoint::{Checkpoint, CheckpointError, Checkpointer};
use super::interrupt::{Interrupt, InterruptKind, ResumeValue};
use super::nodes::{decision_node, MealPlanner};
use super::{NodeName, Route};
use crate::messages::ThreadId;
use crate::schema::ConversationInput;
use crate::state::ConversationState;

/// Default node executions allowed per invocation
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Runner limits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Node executions allowed per invocation
    pub max_steps: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// What to do with a thread
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Begin a new run
    Start(ConversationInput),
    /// Continue a suspended run
    Resume(ResumeValue),
}

/// How an invocation ended
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// Waiting at a human node
    Suspended {
        /// State at suspension
        state: ConversationState,
        /// What the human is asked
        interrupt: Interrupt,
    },
    /// Reached END
    Completed {
        /// Final state
        state: ConversationState,
    },
}

impl RunOutcome {
    /// State carried by either variant
    #[must_use]
    pub fn state(&self) -> &ConversationState {
        match self {
            Self::Suspended { state, .. } | Self::Completed { state } => state,
        }
    }

    /// Pending interrupt, if suspended
    #[must_use]
    pub fn interrupt(&self) -> Option<&Interrupt> {
        match self {
            Self::Suspended { interrupt, .. } => Some(interrupt),
            Self::Completed { .. } => None,
        }
    }
}

/// Runner misuse and persistence failures
///
/// Node failures are not errors here; they are recorded in the state.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// `Start` on a thread that already has a checkpoint
    #[error("thread {0} already exists")]
    ThreadExists(ThreadId),

    /// `Resume` on an unknown thread
    #[error("thread {0} not found")]
    ThreadNotFound(ThreadId),

    /// `Resume` on a thread that is not waiting for input
    #[error("thread {0} is not waiting for input")]
    NotSuspended(ThreadId),

    /// Resume value does not answer the pending interrupt
    #[error("thread is waiting for a {expected} answer, got a {got} answer")]
    ResumeMismatch {
        /// Pending interrupt kind
        expected: InterruptKind,
        /// Kind supplied
        got: InterruptKind,
    },

    /// Invocation exceeded its node budget
    #[error("workflow exceeded {limit} steps without suspending or finishing")]
    StepLimit {
        /// The configured limit
        limit: usize,
    },

    /// Checkpoint store failure
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Result of executing one node
enum Step {
    Continue(Route),
    Suspend(Interrupt),
}

/// Drives threads through the meal workflow
#[derive(Clone)]
pub struct MealWorkflow {
    planner: MealPlanner,
    checkpointer: Arc<dyn Checkpointer>,
    config: WorkflowConfig,
}

impl MealWorkflow {
    /// Create a runner
    pub fn new(planner: MealPlanner, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            planner,
            checkpointer,
            config: WorkflowConfig::default(),
        }
    }

    /// Override the runner limits
    #[must_use]
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Latest checkpoint of a thread
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Checkpoint`] if the store fails.
    pub async fn checkpoint(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, WorkflowError> {
        Ok(self.checkpointer.load(thread_id).await?)
    }

    /// Start or resume a thread and run until it suspends or completes
    ///
    /// # Errors
    ///
    /// Returns a [`WorkflowError`] for a command that does not fit the
    /// thread's checkpoint, for a run that exceeds the step limit, or when
    /// the checkpoint store fails. The stored checkpoint is left untouched
    /// in every error case.
    pub async fn invoke(
        &self,
        thread_id: &ThreadId,
        command: Command,
    ) -> Result<RunOutcome, WorkflowError> {
        let existing = self.checkpointer.load(thread_id).await?;

        let (mut state, mut next, mut resume) = match command {
            Command::Start(input) => {
                if existing.is_some() {
                    return Err(WorkflowError::ThreadExists(thread_id.clone()));
                }
                tracing::info!(thread_id = %thread_id, images = input.images.len(), "Starting thread");
                (
                    ConversationState::new(input),
                    Route::Node(NodeName::AnalyzeImages),
                    None,
                )
            }
            Command::Resume(value) => {
                let checkpoint =
                    existing.ok_or_else(|| WorkflowError::ThreadNotFound(thread_id.clone()))?;
                let pending = checkpoint
                    .pending
                    .as_ref()
                    .ok_or_else(|| WorkflowError::NotSuspended(thread_id.clone()))?;
                if pending.kind() != value.kind() {
                    return Err(WorkflowError::ResumeMismatch {
                        expected: pending.kind(),
                        got: value.kind(),
                    });
                }
                tracing::info!(thread_id = %thread_id, kind = %value.kind(), "Resuming thread");
                (checkpoint.state, checkpoint.next, Some(value))
            }
        };

        let mut steps = 0;
        loop {
            let node = match next {
                Route::Node(node) => node,
                Route::End => {
                    state.current_node = None;
                    state.mark_finished();
                    self.checkpointer
                        .save(&Checkpoint::new(thread_id.clone(), state.clone(), Route::End, None))
                        .await?;
                    tracing::info!(
                        thread_id = %thread_id,
                        duration_ms = state.execution_time.duration_ms,
                        errors = state.errors.len(),
                        "Thread completed"
                    );
                    return Ok(RunOutcome::Completed { state });
                }
            };

            steps += 1;
            if steps > self.config.max_steps {
                tracing::error!(thread_id = %thread_id, limit = self.config.max_steps, "Step limit reached");
                return Err(WorkflowError::StepLimit {
                    limit: self.config.max_steps,
                });
            }

            let span = tracing::info_span!("node", node = %node, thread_id = %thread_id);
            let step = self
                .execute(node, &mut state, resume.take())
                .instrument(span)
                .await?;

            match step {
                Step::Continue(route) => next = route,
                Step::Suspend(interrupt) => {
                    self.checkpointer
                        .save(&Checkpoint::new(
                            thread_id.clone(),
                            state.clone(),
                            Route::Node(node),
                            Some(interrupt.clone()),
                        ))
                        .await?;
                    tracing::info!(thread_id = %thread_id, kind = %interrupt.kind(), "Thread suspended");
                    return Ok(RunOutcome::Suspended { state, interrupt });
                }
            }
        }
    }

    async fn execute(
        &self,
        node: NodeName,
        state: &mut ConversationState,
        resume: Option<ResumeValue>,
    ) -> Result<Step, WorkflowError> {
        tracing::debug!("Entering node");

        let step = match (node, resume) {
            (NodeName::AnalyzeImages, _) => {
                self.planner.process_images(state).await;
                Step::Continue(Route::Node(decision_node(state)))
            }
            (NodeName::Clarify, None) => Step::Suspend(self.planner.request_clarification(state)),
            (NodeName::Clarify, Some(ResumeValue::Clarification(answer))) => {
                self.planner.apply_clarification(state, answer);
                Step::Continue(Route::Node(NodeName::AnalyzeImages))
            }
            (NodeName::GenerateRecipe, _) => {
                self.planner.generate_meal_recipe(state).await;
                Step::Continue(Route::Node(NodeName::ReviewRecipe))
            }
            (NodeName::ReviewRecipe, None) => Step::Suspend(self.planner.request_review(state)),
            (NodeName::ReviewRecipe, Some(ResumeValue::RecipeReview(decision))) => {
                Step::Continue(self.planner.apply_review(state, decision))
            }
            (NodeName::Clarify, Some(other)) => {
                return Err(WorkflowError::ResumeMismatch {
                    expected: InterruptKind::Clarification,
                    got: other.kind(),
                })
            }
            (NodeName::ReviewRecipe, Some(other)) => {
                return Err(WorkflowError::ResumeMismatch {
                    expected: InterruptKind::RecipeReview,
                    got: other.kind(),
                })
            }
        };

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::test_utils::MockBackend;
    use crate::backend::ModelAdapter;
    use crate::images::ImageLoader;
    use crate::workflow::InMemoryCheckpointer;

    fn workflow(backend: Arc<MockBackend>, max_steps: usize) -> MealWorkflow {
        let planner = MealPlanner::new(
            ModelAdapter::new(backend, "llava"),
            ImageLoader::new(Duration::from_secs(1)),
        );
        MealWorkflow::new(planner, Arc::new(InMemoryCheckpointer::new()))
            .with_config(WorkflowConfig { max_steps })
    }

    #[tokio::test]
    async fn test_resume_unknown_thread() {
        let runner = workflow(Arc::new(MockBackend::new()), 8);
        let err = runner
            .invoke(&ThreadId::from("nope"), Command::Resume(ResumeValue::approve()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ThreadNotFound(_)));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(500, "boom");
        // No images: analysis records an error and the run moves on to
        // generation, which also fails, then suspends for review.
        let runner = workflow(backend, 2);
        let outcome = runner
            .invoke(&ThreadId::from("t"), Command::Start(ConversationInput::default()))
            .await;
        assert!(matches!(outcome, Err(WorkflowError::StepLimit { limit: 2 })));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(500, "boom");
        let runner = workflow(backend, 8);
        let id = ThreadId::from("t");

        let first = runner
            .invoke(&id, Command::Start(ConversationInput::default()))
            .await
            .unwrap();
        assert!(matches!(
            first.interrupt(),
            Some(Interrupt::RecipeReview { recipe: None, .. })
        ));
        assert_eq!(first.state().errors.len(), 2);

        let err = runner
            .invoke(&id, Command::Start(ConversationInput::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ThreadExists(_)));
    }
}
