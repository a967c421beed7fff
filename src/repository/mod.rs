//! Session persistence
//!
//! - `SessionRepository` - The storage contract the session layer depends on
//! - `JsonFileSessionRepository` - Single-file JSON adapter used by the CLI
//! - `InMemorySessionRepository` - Map-backed adapter for tests

mod file;
mod memory;
mod port;

pub use file::*;
pub use memory::*;
pub use port::*;
