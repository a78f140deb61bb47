//! Progress store — durable, client-local record of onboarding progress.
//!
//! Persistence is best-effort: a failed write must never block the wizard,
//! and a corrupt record must never break the resume path. Failures are
//! logged and swallowed; corruption loads as "absent".

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::flow::StepId;
use crate::services::{Household, HouseholdDraft, LandlordContact};

/// Durable key-value port backing the progress store.
///
/// Injected, never a hidden global — the orchestrator takes this as a
/// dependency so the flow is testable without a real storage backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().expect("storage lock").get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("storage lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().expect("storage lock").remove(key);
        Ok(())
    }
}

/// File-per-key backend rooted at a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys may contain separators; flatten to a safe file name.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Write(e.to_string())),
        }
    }
}

/// The resumable subset of an onboarding session.
///
/// Mode is recomputed from the operator's identity on entry, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub step: StepId,
    pub household: Option<Household>,
    pub household_draft: HouseholdDraft,
    pub landlord_draft: LandlordContact,
    pub landlord_saved: bool,
    pub saved_at: DateTime<Utc>,
}

/// Store for one operator's onboarding progress, keyed by actor id.
pub struct ProgressStore {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl ProgressStore {
    pub fn new(backend: Arc<dyn StorageBackend>, actor_id: Uuid) -> Self {
        Self {
            backend,
            key: format!("onboarding_progress:{actor_id}"),
        }
    }

    /// Persist the snapshot, overwriting any prior record for this
    /// operator. Failures are logged and swallowed.
    pub async fn save(&self, snapshot: &ProgressSnapshot) {
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize onboarding progress: {e}");
                return;
            }
        };
        if let Err(e) = self.backend.set(&self.key, &json).await {
            tracing::warn!("failed to persist onboarding progress: {e}");
        }
    }

    /// The stored snapshot, or `None` if absent or corrupt.
    pub async fn load(&self) -> Option<ProgressSnapshot> {
        let raw = match self.backend.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("failed to read onboarding progress: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("discarding corrupt onboarding progress record: {e}");
                None
            }
        }
    }

    /// Remove the stored record. Called on cancel and on finalize.
    pub async fn clear(&self) {
        if let Err(e) = self.backend.remove(&self.key).await {
            tracing::warn!("failed to clear onboarding progress: {e}");
        }
    }
}
