//! Watch relationship queries and changes

use crate::error::{OrchestratorError, Result};
use crate::types::SessionId;

use super::core::SessionManager;

impl SessionManager {
    /// Watchers of `parent_id`; empty for unknown or unwatched sessions
    #[must_use]
    pub fn get_watchers(&self, parent_id: SessionId) -> Vec<SessionId> {
        self.registry.get_watchers(parent_id)
    }

    /// Parent of `watcher_id`, if it is currently watching one
    #[must_use]
    pub fn get_parent(&self, watcher_id: SessionId) -> Option<SessionId> {
        self.registry.get_parent(watcher_id)
    }

    /// Point an existing watcher session at `parent_id`
    ///
    /// # Errors
    /// - `SessionNotFound` if either session is unknown
    /// - `InvalidConfig` if `watcher_id` was not created as a watcher
    /// - `AlreadyWatching` if it watches a different parent
    /// - `CycleDetected` if it is `parent_id` or one of its ancestors
    pub fn watch(&self, parent_id: SessionId, watcher_id: SessionId) -> Result<()> {
        let watcher = self.registry.require(watcher_id)?;
        if watcher.watcher_config().is_none() {
            return Err(OrchestratorError::invalid_config(format!(
                "session {watcher_id} was not created as a watcher"
            )));
        }
        self.registry.add_watcher(parent_id, watcher_id)?;
        log::info!("[{}] Watching {}", watcher_id, parent_id);
        Ok(())
    }

    /// Detach a watcher from its parent without destroying either
    ///
    /// Returns the former parent, `None` if it was not watching.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown watcher.
    pub fn remove_watcher(&self, watcher_id: SessionId) -> Result<Option<SessionId>> {
        self.registry.require(watcher_id)?;
        let former = self.registry.remove_watcher(watcher_id);
        if let Some(parent) = former {
            log::info!("[{}] Stopped watching {}", watcher_id, parent);
        }
        Ok(former)
    }
}
