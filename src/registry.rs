//! Session registry
//!
//! The one table shared by every session task. Lookups take the read lock;
//! only create and destroy take the write lock, and no lock is ever held
//! across an `.await`. When both the session table and the watch graph are
//! needed, the table is locked first.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{OrchestratorError, Result};
use crate::session::BackgroundSession;
use crate::types::SessionId;
use crate::watch_graph::WatchGraph;

struct SessionEntry {
    session: Arc<BackgroundSession>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    order: u64,
}

/// A removed session and the handles needed to stop its loop
pub(crate) struct RemovedSession {
    pub session: Arc<BackgroundSession>,
    pub shutdown: CancellationToken,
    pub task: Option<JoinHandle<()>>,
    /// Watchers that lost this session as their parent
    pub detached_watchers: Vec<SessionId>,
}

/// Concurrent table of live sessions plus their watch relationships
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    graph: RwLock<WatchGraph>,
    next_order: AtomicU64,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create an empty registry holding at most `max_sessions` sessions
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            graph: RwLock::new(WatchGraph::new()),
            next_order: AtomicU64::new(0),
            max_sessions,
        }
    }

    /// Add a session whose loop has not been started yet
    ///
    /// # Errors
    /// `SessionLimitReached` when the registry is full.
    pub(crate) fn insert(&self, session: Arc<BackgroundSession>) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            return Err(OrchestratorError::SessionLimitReached(self.max_sessions));
        }
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        sessions.insert(
            session.id(),
            SessionEntry {
                session,
                shutdown: CancellationToken::new(),
                task: None,
                order,
            },
        );
        Ok(())
    }

    /// Start a registered session's loop
    ///
    /// `spawn` receives the session's shutdown token. A session whose loop is
    /// already running is left alone.
    ///
    /// # Errors
    /// `SessionNotFound` if the session was destroyed in the meantime.
    pub(crate) fn start(
        &self,
        id: SessionId,
        spawn: impl FnOnce(Arc<BackgroundSession>, CancellationToken) -> JoinHandle<()>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::session_not_found(id))?;
        if entry.task.is_none() {
            entry.task = Some(spawn(Arc::clone(&entry.session), entry.shutdown.clone()));
        }
        Ok(())
    }

    /// Look up a session
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<BackgroundSession>> {
        self.sessions.read().get(&id).map(|e| Arc::clone(&e.session))
    }

    /// Look up a session that must exist
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn require(&self, id: SessionId) -> Result<Arc<BackgroundSession>> {
        self.get(id).ok_or_else(|| OrchestratorError::session_not_found(id))
    }

    /// Whether `id` is registered
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    /// All session ids in creation order
    #[must_use]
    pub fn list(&self) -> Vec<SessionId> {
        let sessions = self.sessions.read();
        let mut ids: Vec<(u64, SessionId)> =
            sessions.iter().map(|(id, e)| (e.order, *id)).collect();
        ids.sort_unstable_by_key(|(order, _)| *order);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Remove a session and every watch edge naming it
    ///
    /// Graph cleanup and unlinking of the detached watchers run before the
    /// entry is dropped, under the table's write lock, so no new edge to the
    /// session can appear in between. The caller stops the loop.
    pub(crate) fn remove(&self, id: SessionId) -> Option<RemovedSession> {
        let mut sessions = self.sessions.write();
        if !sessions.contains_key(&id) {
            return None;
        }

        let detached = {
            let mut graph = self.graph.write();
            let detached = graph.cleanup_parent(id);
            graph.remove_watcher(id);
            detached
        };

        for watcher in &detached {
            if let Some(entry) = sessions.get(watcher) {
                entry.session.unlink_parent();
            }
        }

        let entry = sessions.remove(&id)?;
        Some(RemovedSession {
            session: entry.session,
            shutdown: entry.shutdown,
            task: entry.task,
            detached_watchers: detached,
        })
    }

    /// Remove every session, in creation order
    pub(crate) fn drain(&self) -> Vec<RemovedSession> {
        let mut sessions = self.sessions.write();
        *self.graph.write() = WatchGraph::new();

        let mut entries: Vec<SessionEntry> = sessions.drain().map(|(_, e)| e).collect();
        entries.sort_unstable_by_key(|e| e.order);
        entries
            .into_iter()
            .map(|e| RemovedSession {
                session: e.session,
                shutdown: e.shutdown,
                task: e.task,
                detached_watchers: Vec::new(),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Watch graph
    // ------------------------------------------------------------------

    /// Register `watcher` as observing `parent` and link its feed
    ///
    /// Re-registering an existing edge leaves the current feed alone.
    ///
    /// # Errors
    /// `SessionNotFound` if either session is unknown, otherwise whatever
    /// [`WatchGraph::add_watcher`] rejects.
    pub(crate) fn add_watcher(&self, parent: SessionId, watcher: SessionId) -> Result<()> {
        let sessions = self.sessions.read();
        let parent_session = sessions
            .get(&parent)
            .ok_or_else(|| OrchestratorError::session_not_found(parent))?;
        let watcher_session = sessions
            .get(&watcher)
            .ok_or_else(|| OrchestratorError::session_not_found(watcher))?;

        let mut graph = self.graph.write();
        if graph.get_parent(watcher) == Some(parent) {
            return Ok(());
        }
        graph.add_watcher(parent, watcher)?;
        watcher_session.session.link_parent(&parent_session.session);
        Ok(())
    }

    /// Detach `watcher` from its parent; returns the former parent
    pub(crate) fn remove_watcher(&self, watcher: SessionId) -> Option<SessionId> {
        let sessions = self.sessions.read();
        let former = self.graph.write().remove_watcher(watcher)?;
        if let Some(entry) = sessions.get(&watcher) {
            entry.session.unlink_parent();
        }
        Some(former)
    }

    /// Watchers of `parent`
    #[must_use]
    pub fn get_watchers(&self, parent: SessionId) -> Vec<SessionId> {
        self.graph.read().get_watchers(parent)
    }

    /// Parent of `watcher`
    #[must_use]
    pub fn get_parent(&self, watcher: SessionId) -> Option<SessionId> {
        self.graph.read().get_parent(watcher)
    }

    /// Copy of the current graph
    #[must_use]
    pub fn graph_snapshot(&self) -> WatchGraph {
        self.graph.read().clone()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}
