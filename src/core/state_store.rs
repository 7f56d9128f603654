//! Persistence for pipeline state.
//!
//! Each audit owns a directory:
//!
//! ```text
//! <base>/<audit_id>/state.json         current PipelineState (replaced atomically)
//! <base>/<audit_id>/transitions.jsonl  append-only component transitions
//! ```
//!
//! State is written to a temp file and renamed over the old one, so a crash
//! mid-write leaves the previous version intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{PipelineState, TransitionEvent};

/// Errors from a state store
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("Audit not found: {0}")]
    NotFound(Uuid),

    #[error("Audit already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StateStoreError + '_ {
    move |source| StateStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Storage for per-audit pipeline state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist a brand-new state; fails if the audit already exists
    async fn create(&self, state: &PipelineState) -> Result<(), StateStoreError>;

    async fn load(&self, audit_id: Uuid) -> Result<PipelineState, StateStoreError>;

    /// Replace the stored state as one unit
    async fn save(&self, state: &PipelineState) -> Result<(), StateStoreError>;

    async fn append_transition(&self, event: &TransitionEvent) -> Result<(), StateStoreError>;

    /// Transitions in the order they were appended
    async fn transitions(&self, audit_id: Uuid) -> Result<Vec<TransitionEvent>, StateStoreError>;

    async fn list_audits(&self) -> Result<Vec<Uuid>, StateStoreError>;
}

/// Directory-per-audit JSON store
pub struct FileStateStore {
    base_dir: PathBuf,
}

impl FileStateStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn audit_dir(&self, audit_id: Uuid) -> PathBuf {
        self.base_dir.join(audit_id.to_string())
    }

    fn state_path(&self, audit_id: Uuid) -> PathBuf {
        self.audit_dir(audit_id).join("state.json")
    }

    fn transitions_path(&self, audit_id: Uuid) -> PathBuf {
        self.audit_dir(audit_id).join("transitions.jsonl")
    }

    async fn write_atomically(&self, state: &PipelineState) -> Result<(), StateStoreError> {
        let dir = self.audit_dir(state.audit_id);
        fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;

        let path = self.state_path(state.audit_id);
        let tmp = dir.join("state.json.tmp");
        let json = serde_json::to_vec_pretty(state)?;

        let mut file = File::create(&tmp).await.map_err(io_error(&tmp))?;
        file.write_all(&json).await.map_err(io_error(&tmp))?;
        file.sync_all().await.map_err(io_error(&tmp))?;
        drop(file);

        fs::rename(&tmp, &path).await.map_err(io_error(&path))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn create(&self, state: &PipelineState) -> Result<(), StateStoreError> {
        if fs::try_exists(self.state_path(state.audit_id))
            .await
            .unwrap_or(false)
        {
            return Err(StateStoreError::AlreadyExists(state.audit_id));
        }
        self.write_atomically(state).await
    }

    async fn load(&self, audit_id: Uuid) -> Result<PipelineState, StateStoreError> {
        let path = self.state_path(audit_id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateStoreError::NotFound(audit_id))
            }
            Err(e) => return Err(io_error(&path)(e)),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    async fn save(&self, state: &PipelineState) -> Result<(), StateStoreError> {
        self.write_atomically(state).await
    }

    async fn append_transition(&self, event: &TransitionEvent) -> Result<(), StateStoreError> {
        let dir = self.audit_dir(event.audit_id);
        fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;

        let path = self.transitions_path(event.audit_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_error(&path))?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .map_err(io_error(&path))?;
        file.flush().await.map_err(io_error(&path))?;
        Ok(())
    }

    async fn transitions(&self, audit_id: Uuid) -> Result<Vec<TransitionEvent>, StateStoreError> {
        let path = self.transitions_path(audit_id);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&path)(e)),
        };

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        while let Some(line) = lines.next_line().await.map_err(io_error(&path))? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    async fn list_audits(&self) -> Result<Vec<Uuid>, StateStoreError> {
        let mut audits = Vec::new();
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(audits),
            Err(e) => return Err(io_error(&self.base_dir)(e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.base_dir))? {
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = Uuid::parse_str(name) {
                    audits.push(id);
                }
            }
        }
        Ok(audits)
    }
}

/// Process-local store, for tests and embedding
#[derive(Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<Uuid, PipelineState>>,
    transitions: Mutex<HashMap<Uuid, Vec<TransitionEvent>>>,
    saves: Mutex<u64>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> u64 {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn create(&self, state: &PipelineState) -> Result<(), StateStoreError> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if states.contains_key(&state.audit_id) {
            return Err(StateStoreError::AlreadyExists(state.audit_id));
        }
        states.insert(state.audit_id, state.clone());
        Ok(())
    }

    async fn load(&self, audit_id: Uuid) -> Result<PipelineState, StateStoreError> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&audit_id)
            .cloned()
            .ok_or(StateStoreError::NotFound(audit_id))
    }

    async fn save(&self, state: &PipelineState) -> Result<(), StateStoreError> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(state.audit_id, state.clone());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    async fn append_transition(&self, event: &TransitionEvent) -> Result<(), StateStoreError> {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event.audit_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn transitions(&self, audit_id: Uuid) -> Result<Vec<TransitionEvent>, StateStoreError> {
        Ok(self
            .transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&audit_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_audits(&self) -> Result<Vec<Uuid>, StateStoreError> {
        Ok(self
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentKey, ComponentStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    fn new_state() -> PipelineState {
        PipelineState::new(
            Uuid::new_v4(),
            "https://example.com",
            ComponentKey::ALL,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path());
        let mut state = new_state();

        store.create(&state).await.unwrap();
        assert!(matches!(
            store.create(&state).await,
            Err(StateStoreError::AlreadyExists(_))
        ));

        state.mark_running(ComponentKey::Crawl, Utc::now()).unwrap();
        store.save(&state).await.unwrap();

        let loaded = store.load(state.audit_id).await.unwrap();
        assert_eq!(loaded, state);
        assert!(!store.audit_dir(state.audit_id).join("state.json.tmp").exists());
        assert_eq!(store.list_audits().await.unwrap(), vec![state.audit_id]);
    }

    #[tokio::test]
    async fn test_file_store_missing_audit() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path().join("audits"));

        let id = Uuid::new_v4();
        assert!(matches!(store.load(id).await, Err(StateStoreError::NotFound(x)) if x == id));
        assert!(store.list_audits().await.unwrap().is_empty());
        assert!(store.transitions(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transitions_append_in_order() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path());
        let audit_id = Uuid::new_v4();

        for (from, to) in [
            (ComponentStatus::Pending, ComponentStatus::Running),
            (ComponentStatus::Running, ComponentStatus::Completed),
        ] {
            let event = TransitionEvent::new(audit_id, ComponentKey::Crawl, from, to, Utc::now(), "crawl");
            store.append_transition(&event).await.unwrap();
        }

        let events = store.transitions(audit_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].to, ComponentStatus::Running);
        assert_eq!(events[1].to, ComponentStatus::Completed);
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        let state = new_state();

        store.create(&state).await.unwrap();
        store.save(&state).await.unwrap();
        store.save(&state).await.unwrap();

        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load(state.audit_id).await.unwrap(), state);
    }
}
