//! # Agent Orchestrator
//!
//! Runs many agent conversations ("sessions") concurrently and lets some
//! sessions ("watchers") observe another session's live output and inject
//! messages back into it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kodegen_agent_orchestrator::{
//!     RoleAuthority, ScriptedAgent, SessionManager, SessionRole, WatcherConfig,
//! };
//!
//! # async fn example() -> kodegen_agent_orchestrator::Result<()> {
//! let manager = SessionManager::with_defaults(Arc::new(ScriptedAgent::new()));
//!
//! let parent = manager.create_session(None)?;
//! let reviewer = SessionRole::new("reviewer", None, RoleAuthority::Supervisor)?;
//! let watcher = manager.create_watcher(
//!     parent,
//!     reviewer,
//!     WatcherConfig::builder("Flag anything that deletes data").build()?,
//! )?;
//!
//! manager.prompt(parent, "Clean up the temp directory")?;
//! assert_eq!(manager.get_parent(watcher), Some(parent));
//!
//! manager.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Sessions
//!
//! Each session owns a replay buffer, a bounded publisher, a FIFO input
//! queue and a cancellation signal, driven by one lightweight task. Output
//! is buffered, forwarded to an attached viewer and published to
//! subscribers in the order the agent produced it.
//!
//! ### 2. Cooperative Cancellation
//!
//! [`SessionManager::interrupt`] resolves a turn within one scheduling step
//! even while the agent call is stalled: the call is raced against the
//! cancellation wake and abandoned when cancellation wins.
//!
//! ### 3. Watchers
//!
//! A watcher accumulates its parent's chunks, evaluates them against its
//! brief at natural breakpoints and may inject a message carrying its role
//! and authority into the parent's input queue.
//!
//! ### 4. Persistence
//!
//! [`SessionManager::save_snapshot`] and [`SessionManager::restore`] carry
//! sessions, buffers and watch relationships across restarts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod error;
pub mod injection;
pub mod manager;
pub mod registry;
pub mod session;
pub mod types;
pub mod watch_graph;
pub mod watcher;

// Re-export commonly used types for external API
pub use agent::{
    Agent, ChunkStream, ConversationMessage, ConversationRole, ScriptStep, ScriptedAgent,
    SessionInput, TurnRequest,
};
pub use error::{OrchestratorError, Result};
pub use injection::Injection;
pub use manager::{OrchestratorSnapshot, SNAPSHOT_VERSION, SessionManager, SessionSnapshot};
pub use registry::SessionRegistry;
pub use session::{BackgroundSession, LiveViewer, TurnOutcome};
pub use watch_graph::WatchGraph;
pub use watcher::EvaluationDecision;

// Re-export type submodules for flat public API
pub use types::{
    ChunkKind, CorrelationId, OrchestratorOptions, OrchestratorOptionsBuilder, OutputPage,
    RetentionStrategy, RoleAuthority, SessionId, SessionInfo, SessionRole, SessionStatus,
    StreamChunk, TriggerKinds, WatcherConfig, WatcherConfigBuilder,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
