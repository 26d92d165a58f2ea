//! Session creation
//!
//! Handles creation of plain sessions and watcher sessions.

use chrono::Utc;

use crate::error::Result;
use crate::session::BackgroundSession;
use crate::types::{SessionId, SessionRole, WatcherConfig};

use super::core::SessionManager;

impl SessionManager {
    /// Create a session and start its loop
    ///
    /// Sessions start `Idle` with an empty buffer. `role` defaults to a
    /// generic peer role.
    ///
    /// # Errors
    /// `SessionLimitReached` when the manager is full.
    pub fn create_session(&self, role: Option<SessionRole>) -> Result<SessionId> {
        let id = SessionId::new();
        let role = role.unwrap_or_default();
        let (session, inputs) =
            BackgroundSession::new(id, role.clone(), None, Utc::now(), self.limits());

        self.registry.insert(session)?;
        self.start_loop(id, inputs, Vec::new())?;

        log::info!("[{}] Session created (role: {})", id, role.name);
        Ok(id)
    }

    /// Create a watcher session observing `parent_id`
    ///
    /// The watcher is subscribed to the parent before this returns, so it
    /// observes everything the parent emits afterwards.
    ///
    /// # Errors
    /// `InvalidConfig` for an unusable `config`, `SessionNotFound` for an
    /// unknown parent, `SessionLimitReached` when the manager is full.
    pub fn create_watcher(
        &self,
        parent_id: SessionId,
        role: SessionRole,
        config: WatcherConfig,
    ) -> Result<SessionId> {
        config.validate()?;
        self.registry.require(parent_id)?;

        let id = SessionId::new();
        let (session, inputs) = BackgroundSession::new(
            id,
            role.clone(),
            Some(config),
            Utc::now(),
            self.limits(),
        );
        self.registry.insert(session)?;

        if let Err(e) = self.registry.add_watcher(parent_id, id) {
            // Parent vanished between the lookup and the link.
            self.registry.remove(id);
            return Err(e);
        }
        self.start_loop(id, inputs, Vec::new())?;

        log::info!(
            "[{}] Watcher created on {} (role: {}, authority: {})",
            id,
            parent_id,
            role.name,
            role.authority
        );
        Ok(id)
    }
}
