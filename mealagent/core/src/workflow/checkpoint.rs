//! Thread Checkpoints
//!
//! A [`Checkpoint`] is everything needed to continue a run: the state, the
//! next route, and the interrupt the run is waiting on (if any). Two stores
//! are provided:
//!
//! - [`InMemoryCheckpointer`]: `DashMap` keyed by thread id, for tests and
//!   embedding
//! - [`FileCheckpointer`]: one JSON file per thread, used by the CLI so a
//!   run can be resumed from a later process

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::interrupt::Interrupt;
use super::Route;
use crate::messages::ThreadId;
use crate::state::ConversationState;

/// Saved position of one thread
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Thread this checkpoint belongs to
    pub thread_id: ThreadId,
    /// State after the last executed step
    pub state: ConversationState,
    /// Where execution continues
    pub next: Route,
    /// Interrupt awaiting an answer; `None` once the run completed
    pub pending: Option<Interrupt>,
    /// When the checkpoint was written
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint stamped with the current time
    #[must_use]
    pub fn new(
        thread_id: ThreadId,
        state: ConversationState,
        next: Route,
        pending: Option<Interrupt>,
    ) -> Self {
        Self {
            thread_id,
            state,
            next,
            pending,
            updated_at: Utc::now(),
        }
    }

    /// Whether the run is waiting for a human
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.pending.is_some()
    }
}

/// Checkpoint store errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Filesystem failure
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint could not be encoded or decoded
    #[error("corrupt checkpoint for thread {thread_id}: {source}")]
    Serde {
        /// Affected thread
        thread_id: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Thread id cannot be used as a file name
    #[error("invalid thread id: {0:?}")]
    InvalidThreadId(String),
}

/// Storage for checkpoints, keyed by thread id
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Latest checkpoint of a thread
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Replace the checkpoint of `checkpoint.thread_id`
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Remove a thread; returns whether it existed
    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, CheckpointError>;

    /// All stored thread ids
    async fn list(&self) -> Result<Vec<ThreadId>, CheckpointError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local checkpoint store
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    threads: DashMap<ThreadId, Checkpoint>,
}

impl InMemoryCheckpointer {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.threads.get(thread_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.threads
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, CheckpointError> {
        Ok(self.threads.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        Ok(self.threads.iter().map(|entry| entry.key().clone()).collect())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Default checkpoint directory (`$XDG_DATA_HOME/mealagent/threads`)
#[must_use]
pub fn default_checkpoint_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mealagent")
        .join("threads")
}

/// One JSON file per thread under a directory
#[derive(Clone, Debug)]
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    /// Store checkpoints under `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the checkpoint files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &ThreadId) -> Result<PathBuf, CheckpointError> {
        let id = thread_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CheckpointError::InvalidThreadId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl Default for FileCheckpointer {
    fn default() -> Self {
        Self::new(default_checkpoint_dir())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(thread_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CheckpointError::Serde {
                thread_id: thread_id.to_string(),
                source,
            })
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(&checkpoint.thread_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;

        let json =
            serde_json::to_vec_pretty(checkpoint).map_err(|source| CheckpointError::Serde {
                thread_id: checkpoint.thread_id.to_string(),
                source,
            })?;

        // Replace atomically
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(io_error(&path))?;

        tracing::debug!(thread_id = %checkpoint.thread_id, path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, CheckpointError> {
        let path = self.path_for(thread_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn list(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };

        let mut threads = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.dir))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                threads.push(ThreadId::from(stem));
            }
        }
        threads.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(threads)
    }
}
