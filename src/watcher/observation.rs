//! Observation buffer
//!
//! Parent chunks a watcher has seen. New chunks wait in `pending` until an
//! evaluation consumes them; evaluated chunks move to `retained`, which the
//! configured [`RetentionStrategy`] keeps bounded.

use std::collections::VecDeque;

use tokio::time::Instant;

use crate::types::{ChunkKind, CorrelationId, RetentionStrategy, StreamChunk};

/// Rough token estimate for prompt budgeting (four characters per token)
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Parent chunks accumulated by a watcher
#[derive(Debug, Default)]
pub struct ObservationBuffer {
    retained: VecDeque<StreamChunk>,
    pending: Vec<StreamChunk>,
    last_observed: Option<Instant>,
}

/// Pending observations taken for one evaluation
#[derive(Debug, Clone)]
pub struct EvaluationBatch {
    /// Previously evaluated chunks still retained
    pub context: Vec<StreamChunk>,
    /// Chunks evaluated for the first time
    pub fresh: Vec<StreamChunk>,
    /// Correlation ids of `fresh`
    pub observed_ids: Vec<CorrelationId>,
}

impl ObservationBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parent chunk
    pub fn push(&mut self, chunk: StreamChunk) {
        self.pending.push(chunk);
        self.last_observed = Some(Instant::now());
    }

    /// Record that `missed` parent chunks were never received
    pub fn push_gap(&mut self, missed: u64) {
        self.push(StreamChunk::observation_gap(missed));
    }

    /// Whether any pending chunk carries something worth evaluating
    #[must_use]
    pub fn has_pending_content(&self) -> bool {
        self.pending.iter().any(|c| c.render_observation().is_some())
    }

    /// Number of pending chunks
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of retained chunks
    #[must_use]
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// When the last parent chunk was recorded
    #[must_use]
    pub const fn last_observed(&self) -> Option<Instant> {
        self.last_observed
    }

    /// Take the pending chunks for evaluation
    ///
    /// They become retained context once [`finish_evaluation`](Self::finish_evaluation)
    /// runs.
    pub fn begin_evaluation(&mut self) -> EvaluationBatch {
        let fresh = std::mem::take(&mut self.pending);
        let observed_ids = fresh.iter().filter_map(|c| c.correlation_id.clone()).collect();
        EvaluationBatch {
            context: self.retained.iter().cloned().collect(),
            fresh,
            observed_ids,
        }
    }

    /// Retain an evaluated batch and apply `retention`
    pub fn finish_evaluation(&mut self, batch: EvaluationBatch, retention: RetentionStrategy) {
        self.retained.extend(batch.fresh);
        self.apply_retention(retention);
    }

    /// Drop pending chunks without evaluating them
    ///
    /// Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.last_observed = None;
        dropped
    }

    fn apply_retention(&mut self, retention: RetentionStrategy) {
        match retention {
            RetentionStrategy::SlidingWindow { max_tokens } => {
                let mut total: usize = self.retained.iter().map(chunk_tokens).sum();
                while total > max_tokens {
                    match self.retained.pop_front() {
                        Some(oldest) => total -= chunk_tokens(&oldest),
                        None => break,
                    }
                }
            }
            RetentionStrategy::RelevanceFiltered { max_items } => {
                self.retained.retain(is_relevant);
                while self.retained.len() > max_items {
                    self.retained.pop_front();
                }
            }
            RetentionStrategy::Autonomous => self.retained.clear(),
        }
    }
}

fn chunk_tokens(chunk: &StreamChunk) -> usize {
    chunk
        .render_observation()
        .map_or(0, |text| estimate_tokens(&text))
}

fn is_relevant(chunk: &StreamChunk) -> bool {
    matches!(
        chunk.kind,
        ChunkKind::ToolCall { .. }
            | ChunkKind::ToolResult { .. }
            | ChunkKind::Error { .. }
            | ChunkKind::Interrupted
            | ChunkKind::ObservationGap { .. }
    )
}
