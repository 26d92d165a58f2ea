//! Session manager implementation
//!
//! This module is organized into logical submodules:
//! - `core`: Core struct, constructors, loop spawning and shutdown
//! - `spawn`: Session and watcher creation
//! - `interaction`: Prompting, interruption, viewing, injection, destruction
//! - `watchers`: Watch relationship queries and changes
//! - `info`: Session information queries
//! - `output`: Buffered output retrieval with pagination
//! - `pagination`: Pagination utilities
//! - `persistence`: Snapshot and restore

// Module declarations
mod core;
mod info;
mod interaction;
mod output;
mod pagination;
mod persistence;
mod spawn;
mod watchers;

// Re-export public API
pub use self::core::SessionManager;
pub use persistence::{OrchestratorSnapshot, SNAPSHOT_VERSION, SessionSnapshot};
