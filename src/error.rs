//! Error types for the agent orchestrator

use thiserror::Error;

use crate::types::identifiers::SessionId;

/// Main error type for the agent orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Lookup or operation on an unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Registering the watcher would make the watch graph cyclic
    #[error("Watching {parent} from {watcher} would create a cycle")]
    CycleDetected {
        /// Proposed parent session
        parent: SessionId,
        /// Proposed watcher session
        watcher: SessionId,
    },

    /// The watcher already observes a different parent
    #[error("Session {watcher} already watches {current_parent}")]
    AlreadyWatching {
        /// Watcher session
        watcher: SessionId,
        /// Parent the watcher is currently attached to
        current_parent: SessionId,
    },

    /// The session is not watching any parent
    #[error("Session {0} is not watching any session")]
    NotWatching(SessionId),

    /// The parent's input queue is at capacity
    #[error("Injection queue of session {0} is full")]
    InjectionQueueFull(SessionId),

    /// A prompt could not be queued because the input queue is at capacity
    #[error("Input queue of session {0} is full")]
    InputQueueFull(SessionId),

    /// Watcher fell behind its parent's publish window
    #[error("Watcher {watcher} missed {missed} chunk(s) from its parent")]
    LaggedObservation {
        /// Lagging watcher
        watcher: SessionId,
        /// Number of chunks that were dropped for this subscriber
        missed: u64,
    },

    /// The agent collaborator failed mid-turn
    #[error("Agent turn failed: {0}")]
    AgentTurnError(String),

    /// The session's loop has already stopped accepting input
    #[error("Session {0} is closed")]
    SessionClosed(SessionId),

    /// Maximum number of live sessions reached
    #[error("Maximum sessions reached: {0}")]
    SessionLimitReached(usize),

    /// Invalid role definition
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Injection content was empty
    #[error("Injection from {0} has empty content")]
    EmptyInjection(SessionId),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot read/write failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Snapshot encode/decode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Create a session not found error
    #[must_use]
    pub fn session_not_found(id: SessionId) -> Self {
        Self::SessionNotFound(id)
    }

    /// Create a cycle error
    #[must_use]
    pub fn cycle_detected(parent: SessionId, watcher: SessionId) -> Self {
        Self::CycleDetected { parent, watcher }
    }

    /// Create an already-watching error
    #[must_use]
    pub fn already_watching(watcher: SessionId, current_parent: SessionId) -> Self {
        Self::AlreadyWatching {
            watcher,
            current_parent,
        }
    }

    /// Create an agent turn error
    pub fn agent_turn(msg: impl Into<String>) -> Self {
        Self::AgentTurnError(msg.into())
    }

    /// Create an invalid role error
    pub fn invalid_role(msg: impl Into<String>) -> Self {
        Self::InvalidRole(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error leaves the watch graph and registry untouched
    ///
    /// Structural errors are returned to the caller of a mutating operation
    /// and never terminate a session loop.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_) | Self::CycleDetected { .. } | Self::AlreadyWatching { .. }
        )
    }
}
