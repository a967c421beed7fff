//! JSON file session repository
//!
//! Persists every session in a single JSON document:
//!
//! ```text
//! {
//!   "version": "0.1.0",
//!   "sessions": { "<id>": { ...session... } }
//! }
//! ```
//!
//! Writes go to a sibling temp file that is renamed over the store, so a
//! crash never leaves a half-written document. Load-modify-write cycles are
//! serialized within the process by a mutex; concurrent processes are not
//! coordinated.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::port::{SessionFilter, SessionRepository, by_start_time, check_active_conflict};
use crate::error::{RepositoryError, Result};
use crate::session::{Session, SessionId, SessionState};

/// On-disk document
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionStore {
    /// Application version that last wrote this file
    #[serde(default)]
    version: String,

    #[serde(default)]
    sessions: HashMap<SessionId, Session>,
}

pub struct JsonFileSessionRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSessionRepository {
    /// Create a repository backed by `path`; the file is created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SessionStore> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SessionStore::default()),
            Err(e) => {
                return Err(RepositoryError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                ))
                .into());
            }
        };

        if content.trim().is_empty() {
            return Ok(SessionStore::default());
        }

        let store: SessionStore = serde_json::from_str(&content).map_err(RepositoryError::from)?;
        Ok(store)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn persist(&self, store: &mut SessionStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RepositoryError::Storage(format!("Failed to create store directory: {}", e))
            })?;
        }

        store.version = env!("CARGO_PKG_VERSION").to_string();
        let content = serde_json::to_string_pretty(store).map_err(RepositoryError::from)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| RepositoryError::Storage(format!("Failed to write store: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RepositoryError::Storage(format!("Failed to replace store: {}", e)))?;

        debug!("Wrote {} sessions", store.sessions.len());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for JsonFileSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.load().await?.sessions.remove(id))
    }

    async fn find_active(&self) -> Result<Option<Session>> {
        Ok(self
            .load()
            .await?
            .sessions
            .into_values()
            .find(|s| s.state() == SessionState::Active))
    }

    async fn find_by_project(&self, project: &str) -> Result<Vec<Session>> {
        let mut found: Vec<Session> = self
            .load()
            .await?
            .sessions
            .into_values()
            .filter(|s| s.project() == project)
            .collect();
        found.sort_by(by_start_time);
        Ok(found)
    }

    #[instrument(skip_all, fields(id = %session.id()))]
    async fn save(&self, session: &Session) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        let mut store = self.load().await?;

        check_active_conflict(store.sessions.values(), session)?;
        store.sessions.insert(session.id().clone(), session.clone());
        self.persist(&mut store).await?;

        Ok(session.clone())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &SessionId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut store = self.load().await?;

        if store.sessions.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&mut store).await?;
        Ok(true)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        Ok(filter.select(self.load().await?.sessions.into_values()))
    }

    async fn count(&self, filter: &SessionFilter) -> Result<usize> {
        Ok(self
            .load()
            .await?
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .count())
    }

    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let mut found: Vec<Session> = self
            .load()
            .await?
            .sessions
            .into_values()
            .filter(|s| s.start_time() >= start && s.start_time() <= end)
            .collect();
        found.sort_by(by_start_time);
        Ok(found)
    }
}
