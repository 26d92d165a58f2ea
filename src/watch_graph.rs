//! Parent/watcher relationship bookkeeping
//!
//! Pure data: no locks and no I/O. The session registry guards a single
//! `WatchGraph` behind its reader/writer lock so both directions always
//! change together.

use std::collections::HashMap;

use crate::error::{OrchestratorError, Result};
use crate::types::SessionId;

/// Bidirectional parent ↔ watcher map
///
/// Invariants:
/// - every `watcher -> parent` entry has a matching `parent -> [.., watcher, ..]`
///   entry and vice versa
/// - a watcher has at most one parent
/// - following parent edges never revisits a session
#[derive(Debug, Default, Clone)]
pub struct WatchGraph {
    parent_to_watchers: HashMap<SessionId, Vec<SessionId>>,
    watcher_to_parent: HashMap<SessionId, SessionId>,
}

impl WatchGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `watcher` as observing `parent`
    ///
    /// Re-registering an existing edge is a no-op.
    ///
    /// # Errors
    /// - `AlreadyWatching` if `watcher` observes a different parent
    /// - `CycleDetected` if `watcher` is `parent` or one of its ancestors
    pub fn add_watcher(&mut self, parent: SessionId, watcher: SessionId) -> Result<()> {
        if let Some(&current) = self.watcher_to_parent.get(&watcher) {
            if current == parent {
                return Ok(());
            }
            return Err(OrchestratorError::already_watching(watcher, current));
        }

        if self.is_ancestor_or_self(watcher, parent) {
            return Err(OrchestratorError::cycle_detected(parent, watcher));
        }

        self.watcher_to_parent.insert(watcher, parent);
        self.parent_to_watchers.entry(parent).or_default().push(watcher);
        Ok(())
    }

    /// Remove `watcher`'s edge from both directions
    ///
    /// Returns the former parent; `None` (and no change) if it had none.
    pub fn remove_watcher(&mut self, watcher: SessionId) -> Option<SessionId> {
        let parent = self.watcher_to_parent.remove(&watcher)?;
        if let Some(watchers) = self.parent_to_watchers.get_mut(&parent) {
            watchers.retain(|&id| id != watcher);
            if watchers.is_empty() {
                self.parent_to_watchers.remove(&parent);
            }
        }
        Some(parent)
    }

    /// Watchers of `parent`, in registration order
    #[must_use]
    pub fn get_watchers(&self, parent: SessionId) -> Vec<SessionId> {
        self.parent_to_watchers.get(&parent).cloned().unwrap_or_default()
    }

    /// Parent of `watcher`, if it has one
    #[must_use]
    pub fn get_parent(&self, watcher: SessionId) -> Option<SessionId> {
        self.watcher_to_parent.get(&watcher).copied()
    }

    /// Drop every edge into `parent`
    ///
    /// The watcher sessions themselves are left alone. Returns the watchers
    /// that were detached.
    pub fn cleanup_parent(&mut self, parent: SessionId) -> Vec<SessionId> {
        let watchers = self.parent_to_watchers.remove(&parent).unwrap_or_default();
        for watcher in &watchers {
            self.watcher_to_parent.remove(watcher);
        }
        watchers
    }

    /// All edges as `(watcher, parent)` pairs
    #[must_use]
    pub fn edges(&self) -> Vec<(SessionId, SessionId)> {
        self.watcher_to_parent
            .iter()
            .map(|(&watcher, &parent)| (watcher, parent))
            .collect()
    }

    /// Whether the graph holds no edges
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent_to_watchers.is_empty() && self.watcher_to_parent.is_empty()
    }

    fn is_ancestor_or_self(&self, candidate: SessionId, of: SessionId) -> bool {
        let mut current = Some(of);
        // Acyclic by construction, so the walk ends; the step bound guards
        // against a corrupted graph.
        let mut edges_followed = 0usize;
        while let Some(node) = current {
            if node == candidate {
                return true;
            }
            current = self.watcher_to_parent.get(&node).copied();
            if current.is_some() {
                edges_followed += 1;
                if edges_followed > self.watcher_to_parent.len() {
                    return true;
                }
            }
        }
        false
    }
}
