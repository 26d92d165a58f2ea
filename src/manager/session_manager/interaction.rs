//! Session interaction methods
//!
//! Handles prompting, interruption, live viewing, injection and destruction.

use tokio::sync::broadcast;

use crate::error::{OrchestratorError, Result};
use crate::session::LiveViewer;
use crate::types::{SessionId, SessionRole, StreamChunk};

use super::core::SessionManager;

impl SessionManager {
    /// Queue a prompt for a session
    ///
    /// The prompt runs after everything already queued; it never runs
    /// concurrently with another turn of the same session.
    ///
    /// # Errors
    /// `SessionNotFound`, `InputQueueFull` or `SessionClosed`.
    pub fn prompt(&self, id: SessionId, text: impl Into<String>) -> Result<()> {
        let session = self.registry.require(id)?;
        session.enqueue_prompt(text)?;
        log::debug!("[{}] Prompt queued", id);
        Ok(())
    }

    /// Cancel a session's current turn
    ///
    /// Returns `false` when a cancellation was already pending.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn interrupt(&self, id: SessionId) -> Result<bool> {
        let session = self.registry.require(id)?;
        let fresh = session.interrupt();
        if fresh {
            log::info!("[{}] Interrupt requested", id);
        }
        Ok(fresh)
    }

    /// Attach a live viewer: replay the buffer, then stream new chunks
    ///
    /// Returns the number of chunks replayed.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn attach(&self, id: SessionId, viewer: LiveViewer) -> Result<usize> {
        let session = self.registry.require(id)?;
        let replayed = session.attach(viewer);
        log::debug!("[{}] Viewer attached ({} chunk(s) replayed)", id, replayed);
        Ok(replayed)
    }

    /// Detach the live viewer
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn detach(&self, id: SessionId) -> Result<bool> {
        Ok(self.registry.require(id)?.detach())
    }

    /// Subscribe to a session's published chunks
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn subscribe(&self, id: SessionId) -> Result<broadcast::Receiver<StreamChunk>> {
        Ok(self.registry.require(id)?.subscribe())
    }

    /// Replace a session's role
    ///
    /// A watcher's later injections carry the new role name and authority.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn set_role(&self, id: SessionId, role: SessionRole) -> Result<()> {
        let session = self.registry.require(id)?;
        log::info!(
            "[{}] Role set to {} ({})",
            id,
            role.name,
            role.authority
        );
        session.set_role(role);
        Ok(())
    }

    /// Send a message from a watcher into its parent on the caller's behalf
    ///
    /// Used to forward decisions a watcher surfaced as `PendingInjection`
    /// chunks, or to inject manually.
    ///
    /// # Errors
    /// `SessionNotFound`, `NotWatching`, `EmptyInjection`,
    /// `InjectionQueueFull` or `SessionClosed`.
    pub fn watcher_inject(&self, watcher_id: SessionId, message: &str, urgent: bool) -> Result<()> {
        let watcher = self.registry.require(watcher_id)?;
        let parent_id = self
            .registry
            .get_parent(watcher_id)
            .ok_or(OrchestratorError::NotWatching(watcher_id))?;
        let parent = self.registry.require(parent_id)?;

        let role = watcher.role();
        parent.receive_injection(watcher_id, &role.name, role.authority, message, urgent)?;
        log::info!("[{}] Injected into {} (urgent: {})", watcher_id, parent_id, urgent);
        Ok(())
    }

    /// Destroy a session
    ///
    /// Watch edges naming the session are removed first; its watchers are
    /// detached and keep running as independent sessions. Waits for the
    /// session's loop to stop.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub async fn destroy(&self, id: SessionId) -> Result<()> {
        let removed = self
            .registry
            .remove(id)
            .ok_or_else(|| OrchestratorError::session_not_found(id))?;

        removed.shutdown.cancel();
        if let Some(task) = removed.task
            && let Err(e) = task.await
        {
            log::warn!("[{}] Session task ended abnormally: {}", id, e);
        }

        log::info!(
            "[{}] Session destroyed ({} watcher(s) detached)",
            id,
            removed.detached_watchers.len()
        );
        Ok(())
    }
}
