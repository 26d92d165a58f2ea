//! Agent loop
//!
//! Drives one session's turns. Each turn races the agent's next chunk
//! against the session's cancellation; when cancellation wins the agent
//! stream is dropped on the spot and the turn is finalized with a single
//! `Interrupted` chunk.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use super::background::BackgroundSession;
use crate::agent::{Agent, ConversationMessage, SessionInput, TurnRequest};
use crate::types::{ChunkKind, CorrelationId, SessionId, SessionStatus, StreamChunk};

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The agent finished with `Done`
    Completed,
    /// The agent failed; an `Error` chunk was recorded
    Failed,
    /// Cancellation won the race; an `Interrupted` chunk was recorded
    Interrupted,
}

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// How the turn ended
    pub outcome: TurnOutcome,
    /// Assistant text streamed during the turn
    pub assistant_text: String,
}

/// One unit of work for the agent loop
#[derive(Debug, Clone)]
pub(crate) struct Turn {
    message: ConversationMessage,
    opening: Option<StreamChunk>,
    observed: Vec<CorrelationId>,
}

impl Turn {
    /// Turn for an item taken off the input queue
    pub(crate) fn from_input(input: &SessionInput) -> Self {
        let opening = match input {
            SessionInput::Prompt(text) => Some(StreamChunk::user_input(text.clone())),
            // Its `WatcherInput` went out on receipt; this marks where it runs.
            SessionInput::Injection(injection) => {
                Some(StreamChunk::injection_consumed(injection.clone()))
            }
        };
        Self {
            message: input.to_conversation_message(),
            opening,
            observed: Vec::new(),
        }
    }

    /// Evaluation turn of a watcher over `count` observations of `source`
    pub(crate) fn evaluation(
        prompt: String,
        source: SessionId,
        count: usize,
        observed: Vec<CorrelationId>,
    ) -> Self {
        Self {
            message: ConversationMessage::user(prompt),
            opening: Some(StreamChunk::observation(source, count).with_observed(observed.clone())),
            observed,
        }
    }
}

/// Run one turn to its end
///
/// Appends the exchange to `history`. Never fails: agent errors become an
/// `Error` chunk and the session stays usable.
pub(crate) async fn run_turn(
    session: &BackgroundSession,
    agent: &dyn Agent,
    history: &mut Vec<ConversationMessage>,
    turn: Turn,
) -> TurnResult {
    let id = session.id();
    let cancel = session.cancel_signal();

    // Clear before going Running so an interrupt issued once Running is
    // observable is never lost.
    cancel.reset();
    session.set_status(SessionStatus::Running);
    log::debug!("[{}] Turn started", id);

    if let Some(opening) = turn.opening {
        session.handle_output(opening);
    }

    let request = TurnRequest {
        session_id: id,
        prompt: turn.message.content.clone(),
        history: history.clone(),
    };
    let mut stream = agent.run_turn(request);
    let mut assistant_text = String::new();

    let terminal = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                break StreamChunk::interrupted();
            }
            next = stream.next() => match next {
                None => break StreamChunk::done(),
                Some(Err(e)) => {
                    log::warn!("[{}] Agent turn failed: {}", id, e);
                    break StreamChunk::error(e.to_string());
                }
                Some(Ok(chunk)) => {
                    let chunk = tag_observed(chunk, &turn.observed);
                    if chunk.is_terminal() {
                        break chunk;
                    }
                    if let Some(text) = chunk.assistant_text() {
                        assistant_text.push_str(text);
                    }
                    session.handle_output(chunk);
                }
            }
        }
    };

    // Abandon the in-flight agent call before anything else is recorded.
    drop(stream);

    let outcome = match terminal.kind {
        ChunkKind::Done => TurnOutcome::Completed,
        ChunkKind::Interrupted => TurnOutcome::Interrupted,
        _ => TurnOutcome::Failed,
    };

    history.push(turn.message);
    if !assistant_text.is_empty() {
        history.push(ConversationMessage::assistant(assistant_text.clone()));
    }

    cancel.reset();
    session.set_status(SessionStatus::Idle);
    session.handle_output(tag_observed(terminal, &turn.observed));

    match outcome {
        TurnOutcome::Completed => log::debug!("[{}] Turn completed", id),
        TurnOutcome::Failed => log::debug!("[{}] Turn ended with error", id),
        TurnOutcome::Interrupted => log::info!("[{}] Turn interrupted", id),
    }

    TurnResult {
        outcome,
        assistant_text,
    }
}

fn tag_observed(chunk: StreamChunk, observed: &[CorrelationId]) -> StreamChunk {
    if observed.is_empty() || !chunk.observed_correlation_ids.is_empty() {
        chunk
    } else {
        chunk.with_observed(observed.to_vec())
    }
}

/// Consume a session's input queue one turn at a time
///
/// Runs until the queue closes; the owning task is normally cancelled first.
pub(crate) async fn run_session_loop(
    session: Arc<BackgroundSession>,
    agent: Arc<dyn Agent>,
    mut inputs: mpsc::Receiver<SessionInput>,
    mut history: Vec<ConversationMessage>,
) {
    while let Some(input) = inputs.recv().await {
        log::debug!("[{}] Dequeued {}", session.id(), input.label());
        let turn = Turn::from_input(&input);
        run_turn(&session, agent.as_ref(), &mut history, turn).await;
    }
    log::debug!("[{}] Input queue closed", session.id());
}
