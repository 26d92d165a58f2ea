//! Session information queries

use std::sync::Arc;

use crate::error::Result;
use crate::session::BackgroundSession;
use crate::types::{SessionId, SessionInfo, SessionStatus};

use super::core::SessionManager;

impl SessionManager {
    /// All live session ids, in creation order
    #[must_use]
    pub fn list(&self) -> Vec<SessionId> {
        self.registry.list()
    }

    /// Info for every live session, in creation order
    #[must_use]
    pub fn list_info(&self) -> Vec<SessionInfo> {
        self.list()
            .into_iter()
            .filter_map(|id| self.info(id).ok())
            .collect()
    }

    /// Info for one session
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn info(&self, id: SessionId) -> Result<SessionInfo> {
        let session = self.registry.require(id)?;
        Ok(SessionInfo {
            id,
            role: session.role(),
            status: session.status(),
            parent: self.registry.get_parent(id),
            watchers: self.registry.get_watchers(id),
            watcher_config: session.watcher_config().cloned(),
            chunk_count: session.chunk_count(),
            created_at: session.created_at(),
        })
    }

    /// Current turn state of a session
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn status(&self, id: SessionId) -> Result<SessionStatus> {
        Ok(self.registry.require(id)?.status())
    }

    /// Handle to a live session
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn session(&self, id: SessionId) -> Result<Arc<BackgroundSession>> {
        self.registry.require(id)
    }
}
