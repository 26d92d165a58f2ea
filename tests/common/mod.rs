//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kodegen_agent_orchestrator::{
    Agent, ChunkKind, ChunkStream, ScriptedAgent, SessionId, SessionManager, StreamChunk,
    TurnRequest,
};

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// Marker that only appears in watcher evaluation prompts
const EVALUATION_MARKER: &str = "=== PARENT SESSION OBSERVATIONS ===";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sends evaluation turns to one script and everything else to another
///
/// Keeps worker and watcher scripts independent of how their turns
/// interleave on the runtime.
#[derive(Default)]
pub struct RoutingAgent {
    pub worker: ScriptedAgent,
    pub evaluator: ScriptedAgent,
}

impl RoutingAgent {
    pub fn new(worker: ScriptedAgent, evaluator: ScriptedAgent) -> Arc<Self> {
        Arc::new(Self { worker, evaluator })
    }
}

impl Agent for RoutingAgent {
    fn run_turn(&self, request: TurnRequest) -> ChunkStream {
        if request.prompt.contains(EVALUATION_MARKER) {
            self.evaluator.run_turn(request)
        } else {
            self.worker.run_turn(request)
        }
    }
}

/// Poll `condition` until it holds, failing the test after [`WAIT`]
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

/// Buffered chunk kinds of a session
pub fn kinds(manager: &SessionManager, id: SessionId) -> Vec<ChunkKind> {
    manager
        .session(id)
        .map(|s| s.buffered_chunks().into_iter().map(|c| c.kind).collect())
        .unwrap_or_default()
}

/// Number of buffered chunks of a session matching `pred`
pub fn count(manager: &SessionManager, id: SessionId, pred: impl Fn(&ChunkKind) -> bool) -> usize {
    kinds(manager, id).iter().filter(|k| pred(k)).count()
}

pub fn is_done(kind: &ChunkKind) -> bool {
    matches!(kind, ChunkKind::Done)
}

/// Wait until a session has recorded `n` `Done` chunks
pub async fn wait_for_turns(manager: &SessionManager, id: SessionId, n: usize) {
    wait_until(&format!("{n} completed turn(s) on {id}"), || {
        count(manager, id, is_done) >= n
    })
    .await;
}

/// Evaluation reply asking to interject
pub fn interject(urgent: bool, content: &str) -> StreamChunk {
    StreamChunk::text(format!(
        "[INTERJECT]\nurgent: {urgent}\ncontent: {content}\n[/INTERJECT]"
    ))
}

/// Evaluation reply declining to interject
pub fn continue_reply() -> StreamChunk {
    StreamChunk::text("[CONTINUE]\nNothing to add.\n[/CONTINUE]")
}
