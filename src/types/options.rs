//! Orchestrator options and configuration
//!
//! This module contains the capacity limits of a `SessionManager`, with a
//! builder that validates each bound.

use crate::error::{OrchestratorError, Result};

// ============================================================================
// Defaults and Bounds
// ============================================================================

/// Default maximum number of live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Default per-subscriber publish window
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Default input queue capacity per session
pub const DEFAULT_INPUT_QUEUE_CAPACITY: usize = 32;

const MAX_SESSIONS_BOUND: usize = 1024;
const BROADCAST_CAPACITY_BOUND: usize = 65_536;
const INPUT_QUEUE_CAPACITY_BOUND: usize = 4096;

// ============================================================================
// Orchestrator Options
// ============================================================================

/// Capacity limits for a `SessionManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Maximum number of live sessions
    pub max_sessions: usize,
    /// Chunks a watcher may fall behind before it lags
    pub broadcast_capacity: usize,
    /// Pending prompts and injections per session
    pub input_queue_capacity: usize,
    /// Replay buffer bound (`None` keeps every chunk)
    pub output_buffer_limit: Option<usize>,
}

impl OrchestratorOptions {
    /// Create a new builder for `OrchestratorOptions`
    #[must_use]
    pub fn builder() -> OrchestratorOptionsBuilder {
        OrchestratorOptionsBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        check_bound("max_sessions", self.max_sessions, MAX_SESSIONS_BOUND)?;
        check_bound(
            "broadcast_capacity",
            self.broadcast_capacity,
            BROADCAST_CAPACITY_BOUND,
        )?;
        check_bound(
            "input_queue_capacity",
            self.input_queue_capacity,
            INPUT_QUEUE_CAPACITY_BOUND,
        )?;
        if self.output_buffer_limit == Some(0) {
            return Err(OrchestratorError::invalid_config(
                "output_buffer_limit must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            input_queue_capacity: DEFAULT_INPUT_QUEUE_CAPACITY,
            output_buffer_limit: None,
        }
    }
}

fn check_bound(name: &str, value: usize, max: usize) -> Result<()> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(OrchestratorError::invalid_config(format!(
            "{name} {value} outside allowed range 1..={max}"
        )))
    }
}

// ============================================================================
// Builder for OrchestratorOptions
// ============================================================================

/// Builder for `OrchestratorOptions`
#[derive(Debug, Default)]
pub struct OrchestratorOptionsBuilder {
    options: OrchestratorOptions,
}

impl OrchestratorOptionsBuilder {
    /// Set the maximum number of live sessions
    #[must_use]
    pub const fn max_sessions(mut self, max: usize) -> Self {
        self.options.max_sessions = max;
        self
    }

    /// Set the per-subscriber publish window
    #[must_use]
    pub const fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.options.broadcast_capacity = capacity;
        self
    }

    /// Set the per-session input queue capacity
    #[must_use]
    pub const fn input_queue_capacity(mut self, capacity: usize) -> Self {
        self.options.input_queue_capacity = capacity;
        self
    }

    /// Bound the replay buffer, dropping the oldest chunks beyond `limit`
    #[must_use]
    pub const fn output_buffer_limit(mut self, limit: usize) -> Self {
        self.options.output_buffer_limit = Some(limit);
        self
    }

    /// Build the options
    ///
    /// # Errors
    /// Returns `InvalidConfig` when any value is outside its allowed range.
    pub fn build(self) -> Result<OrchestratorOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
