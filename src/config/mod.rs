//! Configuration module
//!
//! Handles user configuration (`config.toml` in the platform config dir)
//! and the location of the session store.

mod settings;

pub use settings::*;
