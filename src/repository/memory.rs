//! In-memory session repository
//!
//! Holds sessions in a map behind an async `RwLock`. Used by tests and as the
//! reference behaviour for other adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::port::{SessionFilter, SessionRepository, by_start_time, check_active_conflict};
use crate::error::Result;
use crate::session::{Session, SessionId, SessionState};

#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository, bypassing the active-session check
    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let map = sessions
            .into_iter()
            .map(|s| (s.id().clone(), s))
            .collect();
        Self {
            sessions: RwLock::new(map),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn find_active(&self) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|s| s.state() == SessionState::Active)
            .cloned())
    }

    async fn find_by_project(&self, project: &str) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut found: Vec<Session> = sessions
            .values()
            .filter(|s| s.project() == project)
            .cloned()
            .collect();
        found.sort_by(by_start_time);
        Ok(found)
    }

    async fn save(&self, session: &Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        check_active_conflict(sessions.values(), session)?;
        sessions.insert(session.id().clone(), session.clone());
        debug!("Saved session {} ({})", session.id(), session.state());
        Ok(session.clone())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(filter.select(sessions.values().cloned()))
    }

    async fn count(&self, filter: &SessionFilter) -> Result<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().filter(|s| filter.matches(s)).count())
    }

    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut found: Vec<Session> = sessions
            .values()
            .filter(|s| s.start_time() >= start && s.start_time() <= end)
            .cloned()
            .collect();
        found.sort_by(by_start_time);
        Ok(found)
    }
}
