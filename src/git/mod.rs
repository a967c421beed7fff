//! Git status for session reports
//!
//! - `GitGateway` - The status contract the session layer consumes
//! - `GitBackend` - gitoxide repository discovery and branch lookup
//! - `GitCliGateway` - Gateway combining gitoxide with `git` subprocesses

mod backend;
mod command;
mod gateway;

pub use backend::*;
pub use command::*;
pub use gateway::*;
