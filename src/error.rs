//! Error types for flow-cli
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.
//!
//! Lookups that find nothing are not errors: repository and gateway queries
//! return `Ok(None)` / `Ok(false)` for those cases.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::{SessionId, SessionState};

/// Top-level error type for flow-cli
#[derive(Error, Debug)]
pub enum Error {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("Session {id} is {state}, cannot apply '{event}'")]
    InvalidTransition {
        id: SessionId,
        state: SessionState,
        event: &'static str,
    },

    #[error("Cannot open a session from a '{0}' event")]
    NotAStartEvent(&'static str),

    #[error("Event for session {event} applied to session {session}")]
    EventMismatch { session: SessionId, event: SessionId },

    #[error("Session {0} is already active; pause or end it first")]
    AlreadyActive(SessionId),

    #[error("No active session")]
    NoActiveSession,

    #[error("No paused session to resume")]
    NoPausedSession,

    #[error("Invalid context entry '{0}': expected KEY=VALUE")]
    InvalidContext(String),
}

/// Storage adapter errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Cannot save {incoming} as active: session {existing} is already active")]
    ActiveConflict {
        existing: SessionId,
        incoming: SessionId,
    },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Failed to (de)serialize session store: {0}")]
    Serialization(String),
}

/// Git operations errors
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git is not installed or not in PATH")]
    NotInstalled,

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Git command failed: {command} - {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Git command timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Gitoxide error: {0}")]
    Gix(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Failed to create config directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::NoActiveSession;
        assert!(err.to_string().contains("No active session"));

        let err = GitError::NotInstalled;
        assert!(err.to_string().contains("not installed"));

        let err = GitError::NotARepository(PathBuf::from("/tmp/foo"));
        assert!(err.to_string().contains("/tmp/foo"));

        let err = SessionError::InvalidTransition {
            id: SessionId::parse("s1").unwrap(),
            state: SessionState::Ended,
            event: "paused",
        };
        assert_eq!(err.to_string(), "Session s1 is ended, cannot apply 'paused'");
    }

    #[test]
    fn test_error_conversion() {
        let session_err = SessionError::NoPausedSession;
        let top: Error = session_err.into();
        assert!(matches!(top, Error::Session(_)));

        let repo_err = RepositoryError::Storage("disk full".to_string());
        let top: Error = repo_err.into();
        assert!(top.to_string().contains("disk full"));
    }
}
