//! Snapshot and restore
//!
//! A snapshot records, per session, what is needed to bring it back: id,
//! role, watcher configuration, parent and replay buffer. Restoring is
//! phased so every watch relationship is registered before any loop runs
//! and starts publishing.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::{OrchestratorError, Result};
use crate::session::{BackgroundSession, rebuild_history};
use crate::types::{
    OrchestratorOptions, SessionId, SessionRole, StreamChunk, WatcherConfig,
};

use super::core::SessionManager;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted state of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier
    pub id: SessionId,
    /// Role
    pub role: SessionRole,
    /// Watcher configuration, for watcher sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watcher_config: Option<WatcherConfig>,
    /// Watched session at snapshot time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SessionId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Replay buffer
    #[serde(default)]
    pub buffer: Vec<StreamChunk>,
}

/// Persisted state of a whole manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSnapshot {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Sessions in creation order
    pub sessions: Vec<SessionSnapshot>,
}

impl OrchestratorSnapshot {
    /// Read a snapshot written by [`SessionManager::save_snapshot`]
    ///
    /// # Errors
    /// `Persistence` on I/O failure, `Json` on a malformed file,
    /// `InvalidConfig` on an unsupported version.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(OrchestratorError::invalid_config(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

impl SessionManager {
    /// Capture every live session
    #[must_use]
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        let sessions = self
            .registry
            .list()
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .map(|session| SessionSnapshot {
                id: session.id(),
                role: session.role(),
                watcher_config: session.watcher_config().cloned(),
                parent: self.registry.get_parent(session.id()),
                created_at: session.created_at(),
                buffer: session.buffered_chunks(),
            })
            .collect();

        OrchestratorSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            sessions,
        }
    }

    /// Write a snapshot of every live session as JSON
    ///
    /// # Errors
    /// `Json` or `Persistence` on failure.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path.as_ref(), json).await?;
        log::info!(
            "Saved snapshot of {} session(s) to {}",
            snapshot.sessions.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Build a manager from a snapshot
    ///
    /// 1. sessions are re-created with their buffers
    /// 2. watch relationships are registered into a fresh graph
    /// 3. conversation histories are rebuilt from the buffers
    /// 4. only then are the loops started
    ///
    /// A parent missing from the snapshot leaves its watcher detached.
    ///
    /// # Errors
    /// `SessionLimitReached` if the snapshot exceeds `options.max_sessions`,
    /// `CycleDetected` or `AlreadyWatching` for an inconsistent snapshot,
    /// `InvalidConfig` if a session with a parent has no watcher config.
    pub fn restore(
        agent: Arc<dyn Agent>,
        options: OrchestratorOptions,
        snapshot: OrchestratorSnapshot,
    ) -> Result<Self> {
        let manager = Self::new(agent, options);
        let mut inputs = HashMap::new();
        let mut histories = HashMap::new();
        let mut edges = Vec::new();

        for saved in snapshot.sessions {
            if saved.parent.is_some() && saved.watcher_config.is_none() {
                return Err(OrchestratorError::invalid_config(format!(
                    "session {} has a parent but no watcher config",
                    saved.id
                )));
            }
            let (session, rx) = BackgroundSession::new(
                saved.id,
                saved.role,
                saved.watcher_config,
                saved.created_at,
                manager.limits(),
            );
            histories.insert(saved.id, rebuild_history(&saved.buffer));
            session.restore_buffer(saved.buffer);
            manager.registry.insert(session)?;
            inputs.insert(saved.id, rx);
            if let Some(parent) = saved.parent {
                edges.push((parent, saved.id));
            }
        }

        for (parent, watcher) in edges {
            match manager.registry.add_watcher(parent, watcher) {
                Ok(()) => {}
                Err(OrchestratorError::SessionNotFound(missing)) if missing == parent => {
                    log::warn!("[{}] Parent {} not in snapshot; left detached", watcher, parent);
                }
                Err(e) => return Err(e),
            }
        }

        for id in manager.registry.list() {
            if let Some(rx) = inputs.remove(&id) {
                let history = histories.remove(&id).unwrap_or_default();
                manager.start_loop(id, rx, history)?;
            }
        }

        log::info!("Restored {} session(s)", manager.registry.len());
        Ok(manager)
    }
}
