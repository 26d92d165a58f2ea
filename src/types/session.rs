//! Session status and query response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chunk::StreamChunk;
use super::identifiers::SessionId;
use super::role::SessionRole;
use super::watcher::WatcherConfig;

/// Turn state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Waiting for input
    #[default]
    Idle,
    /// A turn is executing
    Running,
}

/// Session info for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier
    pub id: SessionId,

    /// Role the session plays
    pub role: SessionRole,

    /// Current turn state
    pub status: SessionStatus,

    /// Watched session, if this is a watcher
    pub parent: Option<SessionId>,

    /// Sessions watching this one
    pub watchers: Vec<SessionId>,

    /// Watcher configuration, if this is a watcher
    pub watcher_config: Option<WatcherConfig>,

    /// Chunks currently held in the replay buffer
    pub chunk_count: usize,

    /// When the session was created
    pub created_at: DateTime<Utc>,
}

/// Response from `buffered_output`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPage {
    /// Session identifier
    pub id: SessionId,

    /// Chunks in this page
    pub chunks: Vec<StreamChunk>,

    /// Resolved start index into the replay buffer
    pub offset: usize,

    /// Total chunks in the replay buffer
    pub total: usize,

    /// Whether chunks exist beyond this page
    pub has_more: bool,
}
