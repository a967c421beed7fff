//! Session manager - command handlers for the session lifecycle
//!
//! Loads the session a command targets, lets the aggregate emit and apply the
//! transition event, and persists the result through the repository. Status
//! reports merge stored sessions with live git facts.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::git::{GitCliGateway, GitGateway, GitRunner, GitStatus};
use crate::repository::{JsonFileSessionRepository, SessionFilter, SessionRepository};
use crate::session::{Context, ContextValue, Session, SessionEvent, SessionId, SessionState};

/// A persisted session together with the event that produced its state
#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub event: SessionEvent,
}

/// Current session and working tree facts
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Active session, else the most recently started paused one
    pub session: Option<Session>,
    /// Worked time of `session` so far
    pub elapsed: Option<Duration>,
    pub git: Option<GitStatus>,
    pub last_commit: Option<String>,
}

/// Worked time per project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub sessions: usize,
    pub total: Duration,
}

/// Session manager coordinates all session operations
pub struct SessionManager {
    repository: Arc<dyn SessionRepository>,
    git: Arc<dyn GitGateway>,
    default_outcome: String,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(repository: Arc<dyn SessionRepository>, git: Arc<dyn GitGateway>) -> Self {
        Self {
            repository,
            git,
            default_outcome: Config::default().default_outcome,
        }
    }

    /// Wire the JSON file store and git CLI gateway described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let repository = JsonFileSessionRepository::new(config.sessions_file_path()?);
        let git = GitCliGateway::new(GitRunner::new().with_timeout(config.git_timeout()));

        Ok(Self::new(Arc::new(repository), Arc::new(git))
            .with_default_outcome(config.default_outcome.clone()))
    }

    /// Outcome recorded by [`end`](Self::end) when none is given
    pub fn with_default_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.default_outcome = outcome.into();
        self
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repository
    }

    /// Start a session; fails if another session is active
    #[instrument(skip(self))]
    pub async fn start(&self, project: &str, task: Option<String>) -> Result<Transition> {
        if let Some(active) = self.repository.find_active().await? {
            return Err(SessionError::AlreadyActive(active.id().clone()).into());
        }

        let (session, event) = Session::start(SessionId::new(), project, task);
        let session = self.repository.save(&session).await?;

        info!("Started session {} for project '{}'", session.id(), project);
        Ok(Transition { session, event })
    }

    /// Pause the active session
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<Transition> {
        let mut session = self
            .repository
            .find_active()
            .await?
            .ok_or(SessionError::NoActiveSession)?;

        let event = session.pause()?;
        let session = self.repository.save(&session).await?;

        info!("Paused session {}", session.id());
        Ok(Transition { session, event })
    }

    /// Resume `id`, or the most recently started paused session
    #[instrument(skip(self))]
    pub async fn resume(&self, id: Option<&SessionId>) -> Result<Transition> {
        let mut session = match id {
            Some(id) => self
                .repository
                .find_by_id(id)
                .await?
                .ok_or_else(|| SessionError::NotFound(id.clone()))?,
            None => self
                .latest_paused()
                .await?
                .ok_or(SessionError::NoPausedSession)?,
        };

        if let Some(active) = self.repository.find_active().await? {
            if active.id() != session.id() {
                return Err(SessionError::AlreadyActive(active.id().clone()).into());
            }
        }

        let event = session.resume()?;
        let session = self.repository.save(&session).await?;

        info!("Resumed session {}", session.id());
        Ok(Transition { session, event })
    }

    /// End the current session with `outcome` (or the configured default)
    #[instrument(skip(self))]
    pub async fn end(&self, outcome: Option<String>) -> Result<Transition> {
        let mut session = self.current().await?.ok_or(SessionError::NoActiveSession)?;

        let outcome = outcome.unwrap_or_else(|| self.default_outcome.clone());
        let event = session.end(outcome)?;
        let session = self.repository.save(&session).await?;

        info!(
            "Ended session {} ({})",
            session.id(),
            session.outcome().unwrap_or_default()
        );
        Ok(Transition { session, event })
    }

    /// Merge `updates` into the current session's context
    #[instrument(skip(self))]
    pub async fn update_context(&self, updates: Context) -> Result<Transition> {
        let mut session = self.current().await?.ok_or(SessionError::NoActiveSession)?;

        let event = session.update_context(updates)?;
        let session = self.repository.save(&session).await?;

        info!("Updated context of session {}", session.id());
        Ok(Transition { session, event })
    }

    /// The active session, else the most recently started paused one
    pub async fn current(&self) -> Result<Option<Session>> {
        match self.repository.find_active().await? {
            Some(active) => Ok(Some(active)),
            None => self.latest_paused().await,
        }
    }

    async fn latest_paused(&self) -> Result<Option<Session>> {
        let filter = SessionFilter::new().state(SessionState::Paused).limit(1);
        Ok(self.repository.list(&filter).await?.into_iter().next())
    }

    /// Current session merged with the git status of `path`
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn status(&self, path: &Path) -> Result<StatusReport> {
        let session = self.current().await?;
        let elapsed = session.as_ref().map(|s| s.elapsed(Utc::now()));
        let git = self.git.get_status(path).await?;
        let last_commit = self.git.get_last_commit_message(path).await?;

        Ok(StatusReport {
            session,
            elapsed,
            git,
            last_commit,
        })
    }

    pub async fn find(&self, id: &SessionId) -> Result<Option<Session>> {
        self.repository.find_by_id(id).await
    }

    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        self.repository.list(filter).await
    }

    pub async fn count(&self, filter: &SessionFilter) -> Result<usize> {
        self.repository.count(filter).await
    }

    /// Every session of `project`, oldest first
    pub async fn project_history(&self, project: &str) -> Result<Vec<Session>> {
        self.repository.find_by_project(project).await
    }

    /// Sessions started within `[start, end]`
    pub async fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Session>> {
        self.repository.find_by_date_range(start, end).await
    }

    /// Delete a session record
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &SessionId) -> Result<bool> {
        let removed = self.repository.delete(id).await?;
        if removed {
            info!("Deleted session {}", id);
        }
        Ok(removed)
    }

    /// Worked time per project over ended sessions matching `filter`
    ///
    /// Any state in `filter` is overridden. Sorted by project name.
    pub async fn summarize(&self, filter: &SessionFilter) -> Result<Vec<ProjectSummary>> {
        let filter = filter.unlimited().state(SessionState::Ended);
        let mut totals: BTreeMap<String, (usize, Duration)> = BTreeMap::new();

        for session in self.repository.list(&filter).await? {
            let entry = totals.entry(session.project().to_string()).or_default();
            entry.0 += 1;
            entry.1 += session.duration().unwrap_or_default();
        }

        Ok(totals
            .into_iter()
            .map(|(project, (sessions, total))| ProjectSummary {
                project,
                sessions,
                total,
            })
            .collect())
    }
}

/// Parse `KEY=VALUE` arguments into a context update
pub fn parse_context_entries<S: AsRef<str>>(entries: &[S]) -> Result<Context> {
    let mut context = Context::new();
    for entry in entries {
        let entry = entry.as_ref();
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| SessionError::InvalidContext(entry.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(SessionError::InvalidContext(entry.to_string()).into());
        }
        let Ok(value) = value.trim().parse::<ContextValue>();
        context.insert(key.to_string(), value);
    }
    Ok(context)
}
