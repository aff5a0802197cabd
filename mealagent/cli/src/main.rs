//! mealagent - From a Photo of Ingredients to a Recipe
//!
//! Command-line driver for the mealagent workflow. Each invocation either
//! starts a thread or resumes one; between invocations the thread lives in
//! a checkpoint file, so the human can take as long as they like to answer.
//!
//! # Usage
//!
//! ```bash
//! # Start a thread from one or more photos
//! mealagent start --image fridge.jpg --goal "Quick Meal" --instructions vegetarian
//!
//! # Answer a clarification question
//! mealagent resume --thread <id> --answer "Those are sweet potatoes"
//! mealagent resume --thread <id> --image clearer.jpg
//!
//! # Approve or reject the proposed recipe
//! mealagent resume --thread <id> --approve
//! mealagent resume --thread <id> --reject
//!
//! # Inspect or remove saved threads, or check the backend
//! mealagent list
//! mealagent show --thread <id>
//! mealagent delete --thread <id>
//! mealagent models
//!
//! # Verbose logging
//! RUST_LOG=debug mealagent start --image fridge.jpg
//! ```
//!
//! # Environment Variables
//!
//! - `MEALAGENT_CONFIG`: Configuration file path
//! - `MEALAGENT_PROVIDER`, `MEALAGENT_MODEL`, `OLLAMA_HOST`, `OLLAMA_PORT`,
//!   `OPENAI_API_KEY`: Backend selection (see `mealagent_core::config`)
//! - `RUST_LOG`: Log filter (takes precedence over `[logging] filter`)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mealagent_core::{
    build_backend, load_config_from_path, Checkpoint, Checkpointer, ChatBackend, Command,
    ConfigOverrides, ConversationInput, ConversationState, FileCheckpointer, ImageLoader,
    Interrupt, MealAgentConfig, MealPlanner, MealWorkflow, ModelAdapter, Recipe, ResumeValue,
    RunOutcome, ThreadId,
};

/// mealagent - turn a photo of your ingredients into a recipe
#[derive(Parser, Debug)]
#[command(name = "mealagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "MEALAGENT_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Backend provider (ollama, openai)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Vision-capable model name
    #[arg(short = 'm', long, global = true)]
    model: Option<String>,

    /// Directory holding thread checkpoints
    #[arg(long, value_name = "DIR", global = true)]
    checkpoint_dir: Option<PathBuf>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start a new thread from photos
    Start {
        /// Image path, data: URL or http(s) URL (repeatable)
        #[arg(short = 'i', long = "image", value_name = "REF", required = true)]
        images: Vec<String>,

        /// What kind of meal you want, e.g. "Quick Meal"
        #[arg(short = 'g', long)]
        goal: Option<String>,

        /// Extra instructions, e.g. "vegetarian"
        #[arg(long)]
        instructions: Option<String>,

        /// Thread id to use (generated if omitted)
        #[arg(short = 't', long)]
        thread: Option<String>,
    },

    /// Answer the question a thread is waiting on
    Resume {
        /// Thread id
        #[arg(short = 't', long)]
        thread: String,

        #[command(flatten)]
        answer: Answer,
    },

    /// Show a thread's saved state
    Show {
        /// Thread id
        #[arg(short = 't', long)]
        thread: String,
    },

    /// List saved threads
    List,

    /// Delete a saved thread
    Delete {
        /// Thread id
        #[arg(short = 't', long)]
        thread: String,
    },

    /// Check the backend and list its models
    Models,
}

/// Exactly one answer per resume
#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct Answer {
    /// Text answer to a clarification question
    #[arg(long)]
    answer: Option<String>,

    /// Replacement image for a clarification question
    #[arg(long, value_name = "REF")]
    image: Option<String>,

    /// Approve the proposed recipe
    #[arg(long)]
    approve: bool,

    /// Reject the proposed recipe and get another one
    #[arg(long)]
    reject: bool,
}

impl Answer {
    fn into_resume_value(self) -> ResumeValue {
        match (self.answer, self.image) {
            (Some(text), _) => ResumeValue::text(text),
            (None, Some(url)) => ResumeValue::image(url),
            (None, None) if self.approve => ResumeValue::approve(),
            (None, None) => ResumeValue::reject(),
        }
    }
}

/// Initialize logging
///
/// `RUST_LOG` wins over the configured filter, which wins over the defaults.
fn init_logging(config: &MealAgentConfig) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if let Some(directives) = &config.log_filter {
        EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid log filter: {directives:?}"))?
    } else {
        EnvFilter::new("warn")
            .add_directive("mealagent=info".parse()?)
            .add_directive("mealagent_core=info".parse()?)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Load configuration and apply CLI overrides
fn load_settings(args: &Args) -> Result<MealAgentConfig> {
    let path = args
        .config
        .clone()
        .or_else(mealagent_core::default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(provider) = &args.provider {
        overrides = overrides.with_provider(provider.clone());
    }
    if let Some(model) = &args.model {
        overrides = overrides.with_model(model.clone());
    }
    if let Some(dir) = &args.checkpoint_dir {
        overrides = overrides.with_checkpoint_dir(dir.clone());
    }
    overrides.apply(&mut config);

    Ok(config)
}

fn backend(config: &MealAgentConfig) -> Result<Arc<dyn ChatBackend>> {
    let backend_config = config
        .backend_config()
        .context("Invalid backend configuration")?;
    Ok(build_backend(&backend_config, config.request_timeout))
}

fn checkpoints(config: &MealAgentConfig) -> FileCheckpointer {
    FileCheckpointer::new(config.checkpoint_dir.clone())
}

fn build_workflow(config: &MealAgentConfig) -> Result<MealWorkflow> {
    let adapter =
        ModelAdapter::new(backend(config)?, config.model.clone()).with_temperature(config.temperature);
    let planner = MealPlanner::new(adapter, ImageLoader::new(config.request_timeout));
    let checkpoints = Arc::new(checkpoints(config));
    Ok(MealWorkflow::new(planner, checkpoints).with_config(config.workflow_config()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_settings(&args)?;
    init_logging(&config)?;

    info!(
        provider = %config.provider,
        model = %config.model,
        source = %config.source(),
        "Configuration loaded"
    );

    run(args.command, &config, args.json).await
}

/// Execute one subcommand
///
/// Only the commands that talk to a model build a backend.
async fn run(command: Cmd, config: &MealAgentConfig, as_json: bool) -> Result<()> {
    match command {
        Cmd::Start {
            images,
            goal,
            instructions,
            thread,
        } => {
            let thread = thread.map_or_else(ThreadId::new, ThreadId::from);
            let input = ConversationInput {
                goal,
                instructions,
                images,
            };
            let outcome = build_workflow(config)?
                .invoke(&thread, Command::Start(input))
                .await
                .with_context(|| format!("Failed to start thread {thread}"))?;
            print_outcome(&thread, &outcome, as_json)?;
        }
        Cmd::Resume { thread, answer } => {
            let thread = ThreadId::from(thread);
            let outcome = build_workflow(config)?
                .invoke(&thread, Command::Resume(answer.into_resume_value()))
                .await
                .with_context(|| format!("Failed to resume thread {thread}"))?;
            print_outcome(&thread, &outcome, as_json)?;
        }
        Cmd::Show { thread } => {
            let thread = ThreadId::from(thread);
            let checkpoint = checkpoints(config)
                .load(&thread)
                .await?
                .with_context(|| format!("Thread {thread} not found"))?;
            print_checkpoint(&checkpoint, as_json)?;
        }
        Cmd::List => {
            let store = checkpoints(config);
            let mut saved = Vec::new();
            for thread in store.list().await? {
                if let Some(checkpoint) = store.load(&thread).await? {
                    saved.push(checkpoint);
                }
            }
            print_thread_list(&saved, as_json)?;
        }
        Cmd::Delete { thread } => {
            let thread = ThreadId::from(thread);
            if !checkpoints(config).delete(&thread).await? {
                anyhow::bail!("Thread {thread} not found");
            }
            info!(thread_id = %thread, "Thread deleted");
            if as_json {
                println!("{}", json!({ "thread_id": thread, "deleted": true }));
            } else {
                println!("Deleted thread {thread}");
            }
        }
        Cmd::Models => {
            let backend = backend(config)?;
            list_models(backend.as_ref(), config, as_json).await?;
        }
    }

    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_outcome(thread: &ThreadId, outcome: &RunOutcome, as_json: bool) -> Result<()> {
    if as_json {
        let value = json!({
            "thread_id": thread,
            "status": if outcome.interrupt().is_some() { "suspended" } else { "completed" },
            "interrupt": outcome.interrupt(),
            "state": outcome.state(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Thread: {thread}");
    print_errors(outcome.state());

    match outcome {
        RunOutcome::Suspended { interrupt, .. } => print_interrupt(thread, interrupt),
        RunOutcome::Completed { state } => {
            println!("\nDone.");
            if let Some(recipe) = &state.recipe {
                print_recipe(recipe);
            }
            if let Some(ms) = state.execution_time.duration_ms {
                println!("\nTotal time: {:.1}s", ms as f64 / 1000.0);
            }
        }
    }
    Ok(())
}

fn print_interrupt(thread: &ThreadId, interrupt: &Interrupt) {
    println!("\n{}", interrupt.instruction());
    match interrupt {
        Interrupt::Clarification { question, .. } => {
            if let Some(q) = question.as_ref().and_then(|c| c.question.as_deref()) {
                println!("  {q}");
            }
            println!("\nAnswer with one of:");
            println!("  mealagent resume --thread {thread} --answer \"...\"");
            println!("  mealagent resume --thread {thread} --image <path-or-url>");
        }
        Interrupt::RecipeReview { recipe, .. } => {
            match recipe {
                Some(recipe) => print_recipe(recipe),
                None => println!("  (no recipe could be generated)"),
            }
            println!("\nAnswer with one of:");
            println!("  mealagent resume --thread {thread} --approve");
            println!("  mealagent resume --thread {thread} --reject");
        }
    }
}

fn print_recipe(recipe: &Recipe) {
    println!("\n== {} ==", recipe.display_name());
    if let Some(description) = &recipe.description {
        println!("{description}");
    }
    if let Some(duration) = &recipe.duration {
        println!("Time: {duration}");
    }
    if !recipe.have.is_empty() {
        println!("\nYou have: {}", recipe.have.join(", "));
    }
    if !recipe.to_buy.is_empty() {
        println!("To buy:   {}", recipe.to_buy.join(", "));
    }
    println!("\nSteps:");
    for (i, step) in recipe.steps.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
    match recipe.approved {
        Some(true) => println!("\nApproved."),
        Some(false) => println!("\nRejected."),
        None => {}
    }
}

fn print_errors(state: &ConversationState) {
    for error in &state.errors {
        eprintln!("warning: {error}");
    }
}

fn print_checkpoint(checkpoint: &Checkpoint, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(checkpoint)?);
        return Ok(());
    }

    println!("Thread:  {}", checkpoint.thread_id);
    println!("Updated: {}", checkpoint.updated_at.to_rfc3339());
    println!("Next:    {}", checkpoint.next);
    println!("Status:  {}", if checkpoint.is_suspended() { "waiting for input" } else { "completed" });
    print_errors(&checkpoint.state);

    if let Some(interrupt) = &checkpoint.pending {
        print_interrupt(&checkpoint.thread_id, interrupt);
    } else if let Some(recipe) = &checkpoint.state.recipe {
        print_recipe(recipe);
    }
    Ok(())
}

fn print_thread_list(saved: &[Checkpoint], as_json: bool) -> Result<()> {
    if as_json {
        let value: Vec<_> = saved
            .iter()
            .map(|c| {
                json!({
                    "thread_id": c.thread_id,
                    "status": if c.is_suspended() { "suspended" } else { "completed" },
                    "next": c.next,
                    "updated_at": c.updated_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if saved.is_empty() {
        println!("No saved threads.");
        return Ok(());
    }
    for c in saved {
        let status = match &c.pending {
            Some(interrupt) => format!("waiting: {}", interrupt.kind()),
            None => "completed".to_string(),
        };
        println!("{}  {}  {status}", c.thread_id, c.updated_at.to_rfc3339());
    }
    Ok(())
}

async fn list_models(backend: &dyn ChatBackend, config: &MealAgentConfig, as_json: bool) -> Result<()> {
    let healthy = backend.health_check().await;
    let models = if healthy {
        backend
            .list_models()
            .await
            .with_context(|| format!("Failed to list {} models", backend.name()))?
    } else {
        Vec::new()
    };
    let configured_available = models.iter().any(|m| m.name == config.model);

    if as_json {
        let value = json!({
            "backend": backend.name(),
            "healthy": healthy,
            "configured_model": config.model,
            "configured_model_available": configured_available,
            "models": models,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "Backend: {} ({})",
        backend.name(),
        if healthy { "reachable" } else { "unreachable" }
    );
    for model in &models {
        let marker = if model.name == config.model { "*" } else { " " };
        match &model.size {
            Some(bytes) => println!(" {marker} {} ({:.1} GB)", model.name, *bytes as f64 / 1e9),
            None => println!(" {marker} {}", model.name),
        }
    }
    if healthy && !configured_available {
        eprintln!("warning: configured model {:?} is not available", config.model);
    }
    Ok(())
}
