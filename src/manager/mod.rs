//! Session management
//!
//! Provides `SessionManager` for creating, prompting, interrupting,
//! watching and destroying many concurrent agent sessions.
//!
//! # Module Structure
//!
//! - `session_manager` - Core `SessionManager` with public API

mod session_manager;

pub use session_manager::{OrchestratorSnapshot, SNAPSHOT_VERSION, SessionManager, SessionSnapshot};
