//! Type definitions for the agent orchestrator
//!
//! This module contains the shared data types, organized into logical
//! submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `CorrelationId`)
//! - [`chunk`] - Stream chunks, the unit of session output
//! - [`role`] - Session roles and authority levels
//! - [`watcher`] - Watcher configuration, triggers and retention
//! - [`session`] - Session status and query responses
//! - [`options`] - Orchestrator capacity limits

pub mod chunk;
pub mod identifiers;
pub mod options;
pub mod role;
pub mod session;
pub mod watcher;

// Re-export commonly used types
pub use chunk::{ChunkKind, StreamChunk};
pub use identifiers::{CorrelationId, SessionId};
pub use options::{OrchestratorOptions, OrchestratorOptionsBuilder};
pub use role::{RoleAuthority, SessionRole};
pub use session::{OutputPage, SessionInfo, SessionStatus};
pub use watcher::{RetentionStrategy, TriggerKinds, WatcherConfig, WatcherConfigBuilder};
