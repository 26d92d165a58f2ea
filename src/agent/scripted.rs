//! Scripted agent
//!
//! Replays pre-programmed turns step by step. Used by the demo binary and
//! the test-suite, where it stands in for a real model: `Delay` paces
//! output, `Hang` models a call that never returns, and `Fail` models a
//! collaborator error mid-turn.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;

use super::{Agent, ChunkStream, TurnRequest};
use crate::error::OrchestratorError;
use crate::types::StreamChunk;

/// One step of a scripted turn
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a chunk
    Chunk(StreamChunk),
    /// Sleep before the next step
    Delay(Duration),
    /// Never produce anything again
    Hang,
    /// Fail the turn with an agent error
    Fail(String),
}

impl ScriptStep {
    /// Emit a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self::Chunk(StreamChunk::text(text))
    }

    /// Emit a done chunk
    #[must_use]
    pub fn done() -> Self {
        Self::Chunk(StreamChunk::done())
    }
}

#[derive(Default)]
struct ScriptState {
    turns: VecDeque<Vec<ScriptStep>>,
    requests: Vec<TurnRequest>,
}

/// Agent that replays queued turns, falling back to a fixed reply
pub struct ScriptedAgent {
    state: Mutex<ScriptState>,
    fallback: Vec<ScriptStep>,
    live_turns: Arc<AtomicUsize>,
}

impl ScriptedAgent {
    /// Create an agent whose unscripted turns reply `"ok"` and finish
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState::default()),
            fallback: vec![ScriptStep::text("ok"), ScriptStep::done()],
            live_turns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a turn at construction time
    #[must_use]
    pub fn with_turn(self, steps: Vec<ScriptStep>) -> Self {
        self.push_turn(steps);
        self
    }

    /// Replace the reply used once the queued turns run out
    #[must_use]
    pub fn with_fallback(mut self, steps: Vec<ScriptStep>) -> Self {
        self.fallback = steps;
        self
    }

    /// Queue a turn
    pub fn push_turn(&self, steps: Vec<ScriptStep>) {
        self.state.lock().turns.push_back(steps);
    }

    /// Every request received so far, in call order
    #[must_use]
    pub fn requests(&self) -> Vec<TurnRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests received for one session
    #[must_use]
    pub fn requests_for(&self, session_id: crate::types::SessionId) -> Vec<TurnRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Number of turn streams that have not been dropped yet
    #[must_use]
    pub fn live_turns(&self) -> usize {
        self.live_turns.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the live-turn count when its stream is dropped
struct LiveTurn(Arc<AtomicUsize>);

impl LiveTurn {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveTurn {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Agent for ScriptedAgent {
    fn run_turn(&self, request: TurnRequest) -> ChunkStream {
        let steps = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state
                .turns
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        };
        let guard = LiveTurn::enter(&self.live_turns);

        async_stream::stream! {
            let _guard = guard;
            for step in steps {
                match step {
                    ScriptStep::Chunk(chunk) => yield Ok(chunk),
                    ScriptStep::Delay(delay) => tokio::time::sleep(delay).await,
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                    ScriptStep::Fail(message) => {
                        yield Err(OrchestratorError::agent_turn(message));
                        break;
                    }
                }
            }
        }
        .boxed()
    }
}
