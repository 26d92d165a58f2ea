//! Core session manager structure and lifecycle management
//!
//! Provides the main `SessionManager` struct with construction, loop
//! spawning and shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::{Agent, ConversationMessage, SessionInput};
use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::session::BackgroundSession;
use crate::session::agent_loop::run_session_loop;
use crate::session::background::SessionLimits;
use crate::types::{OrchestratorOptions, SessionId};
use crate::watcher::watcher_loop::{WatcherContext, run_watcher_loop};

// ============================================================================
// SESSION MANAGER CORE
// ============================================================================

/// Manager for multiple concurrent agent sessions
///
/// The `SessionManager` is the one explicitly constructed owner of the
/// session registry. It handles:
/// - Session lifecycle (create, destroy, shutdown)
/// - Prompting, interruption and live viewing
/// - Watcher creation and watch relationships
/// - Snapshot and restore
///
/// Share it as `Arc<SessionManager>`; every operation takes `&self`.
pub struct SessionManager {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) agent: Arc<dyn Agent>,
    pub(crate) options: OrchestratorOptions,
}

impl SessionManager {
    /// Create a manager whose sessions run turns on `agent`
    #[must_use]
    pub fn new(agent: Arc<dyn Agent>, options: OrchestratorOptions) -> Self {
        log::debug!(
            "Creating SessionManager (max_sessions: {}, broadcast_capacity: {})",
            options.max_sessions,
            options.broadcast_capacity
        );
        Self {
            registry: Arc::new(SessionRegistry::new(options.max_sessions)),
            agent,
            options,
        }
    }

    /// Create a manager with default options
    #[must_use]
    pub fn with_defaults(agent: Arc<dyn Agent>) -> Self {
        Self::new(agent, OrchestratorOptions::default())
    }

    /// Options this manager was built with
    #[must_use]
    pub const fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// The underlying registry
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub(crate) const fn limits(&self) -> SessionLimits {
        SessionLimits {
            broadcast_capacity: self.options.broadcast_capacity,
            input_queue_capacity: self.options.input_queue_capacity,
            output_buffer_limit: self.options.output_buffer_limit,
        }
    }

    /// Spawn the loop task for a registered session
    ///
    /// Watchers get the dual-input watcher loop, everything else the plain
    /// agent loop. The task ends when the session's shutdown token fires.
    pub(crate) fn start_loop(
        &self,
        id: SessionId,
        inputs: mpsc::Receiver<SessionInput>,
        history: Vec<ConversationMessage>,
    ) -> Result<()> {
        let agent = Arc::clone(&self.agent);
        let registry = Arc::downgrade(&self.registry);

        self.registry.start(id, move |session: Arc<BackgroundSession>, shutdown| {
            tokio::spawn(async move {
                let id = session.id();
                match session.watcher_config().cloned() {
                    Some(config) => {
                        let ctx = WatcherContext {
                            session,
                            agent,
                            registry,
                            config,
                        };
                        tokio::select! {
                            () = shutdown.cancelled() => {}
                            () = run_watcher_loop(ctx, inputs, history) => {}
                        }
                    }
                    None => {
                        tokio::select! {
                            () = shutdown.cancelled() => {}
                            () = run_session_loop(session, agent, inputs, history) => {}
                        }
                    }
                }
                log::debug!("[{}] Session task finished", id);
            })
        })
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for removed in self.registry.drain() {
            removed.shutdown.cancel();
        }
    }
}

impl SessionManager {
    /// Gracefully shutdown the SessionManager
    ///
    /// Destroys every session and waits for their loops to stop.
    pub async fn shutdown(&self) -> Result<()> {
        log::info!("Shutting down SessionManager...");

        let removed = self.registry.drain();
        for session in &removed {
            log::debug!("[{}] Stopping session", session.session.id());
            session.shutdown.cancel();
        }
        for session in removed {
            if let Some(task) = session.task
                && let Err(e) = task.await
            {
                log::warn!("[{}] Session task ended abnormally: {}", session.session.id(), e);
            }
        }

        log::info!("SessionManager shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
