//! Thread state persistence.
//!
//! State is only persisted across the clarification boundary: saved when a
//! run stops to ask the user a question, loaded on the next turn, and deleted
//! once the thread's report is written.

use crate::research::state::ResearchState;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ResearchState>>;
    async fn save(&self, state: &ResearchState) -> Result<()>;
    async fn delete(&self, thread_id: &str) -> Result<()>;
}

/// Process-local store, mainly for tests and embedding.
#[derive(Default)]
pub struct InMemoryStateStore {
    threads: RwLock<HashMap<String, ResearchState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ResearchState>> {
        Ok(self.threads.read().get(thread_id).cloned())
    }

    async fn save(&self, state: &ResearchState) -> Result<()> {
        self.threads
            .write()
            .insert(state.thread_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        self.threads.write().remove(thread_id);
        Ok(())
    }
}

/// One JSON file per thread under a directory.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> Result<PathBuf> {
        validate_thread_id(thread_id)?;
        Ok(self.dir.join(format!("{}.json", thread_id)))
    }
}

/// Thread ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_thread_id(thread_id: &str) -> Result<()> {
    let valid = !thread_id.is_empty()
        && thread_id.len() <= 128
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("Invalid thread id: '{}'", thread_id)))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ResearchState>> {
        let path = self.path_for(thread_id)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let state = serde_json::from_str(&content).map_err(|e| {
            AppError::Persistence(format!("Corrupt state file {}: {}", path.display(), e))
        })?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ResearchState) -> Result<()> {
        let path = self.path_for(&state.thread_id)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to create {}: {}", self.dir.display(), e)))?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to replace {}: {}", path.display(), e)))?;

        tracing::debug!(thread = %state.thread_id, path = %path.display(), "Saved thread state");
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        let path = self.path_for(thread_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Persistence(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
