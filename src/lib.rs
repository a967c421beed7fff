//! flow-cli - Track work sessions per project and task
//!
//! Records when work on a project starts, pauses, resumes and ends, keeps the
//! sessions in a local store, and reports status alongside live git facts.
//!
//! # Modules
//!
//! - [`session`] - Session aggregate, lifecycle events and command handlers
//! - [`repository`] - Storage contract and its JSON file / in-memory adapters
//! - [`git`] - Git status gateway (gitoxide + `git` CLI)
//! - [`config`] - Layered configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod git;
pub mod repository;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use repository::{SessionFilter, SessionRepository, SortField, SortOrder};
pub use session::{
    ContextValue, Session, SessionEvent, SessionEventKind, SessionId, SessionManager, SessionState,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
