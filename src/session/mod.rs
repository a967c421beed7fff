//! Session management module
//!
//! Provides the session lifecycle:
//! - `Session` - The aggregate, changed only through events
//! - `SessionEvent` - Immutable records of each transition
//! - `SessionManager` - Command handlers tying sessions, storage and git together

mod events;
mod manager;
mod types;

pub use events::*;
pub use manager::*;
pub use types::*;
