//! Watcher agent loop
//!
//! Every iteration races, in priority order:
//! 1. the watcher's own cancellation (while idle: drop unevaluated observations)
//! 2. the watcher's own input queue (its user always comes first)
//! 3. changes to its parent link (attach, detach, parent destroyed)
//! 4. the parent's published chunks
//! 5. the silence timeout, when observations are waiting
//!
//! A lagging subscription is reported, marked as a gap and skipped past; it
//! never stops the loop.

use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use super::evaluation::{EvaluationDecision, format_evaluation_prompt, parse_evaluation};
use super::observation::ObservationBuffer;
use crate::agent::{Agent, ConversationMessage, SessionInput};
use crate::error::OrchestratorError;
use crate::registry::SessionRegistry;
use crate::session::BackgroundSession;
use crate::session::agent_loop::{Turn, TurnOutcome, run_turn};
use crate::types::{ChunkKind, SessionId, StreamChunk, WatcherConfig};

/// Everything a watcher loop runs with
pub(crate) struct WatcherContext {
    pub session: Arc<BackgroundSession>,
    pub agent: Arc<dyn Agent>,
    pub registry: Weak<SessionRegistry>,
    pub config: WatcherConfig,
}

struct ParentFeed {
    id: SessionId,
    rx: broadcast::Receiver<StreamChunk>,
}

/// Run a watcher session until its input queue closes
pub(crate) async fn run_watcher_loop(
    ctx: WatcherContext,
    mut inputs: mpsc::Receiver<SessionInput>,
    mut history: Vec<ConversationMessage>,
) {
    let WatcherContext {
        session,
        agent,
        registry,
        config,
    } = ctx;
    let id = session.id();
    let mut parent_link = session.parent_receiver();
    let initial = *parent_link.borrow_and_update();
    let mut feed = connect(&session, &registry, initial);
    let mut observations = ObservationBuffer::new();

    log::info!(
        "[{}] Watcher loop started (parent: {})",
        id,
        feed.as_ref().map_or_else(|| "none".to_string(), |f| f.id.to_string())
    );

    loop {
        let silence_deadline = config
            .silence_timeout
            .filter(|_| observations.has_pending_content())
            .and_then(|timeout| observations.last_observed().map(|at| at + timeout));

        tokio::select! {
            biased;

            () = session.cancel_signal().cancelled() => {
                let dropped = observations.discard_pending();
                session.cancel_signal().reset();
                log::info!("[{}] Watcher cancelled while idle; dropped {} observation(s)", id, dropped);
            }

            input = inputs.recv() => {
                let Some(input) = input else { break };
                log::debug!("[{}] Watcher serving own {}", id, input.label());
                run_turn(&session, agent.as_ref(), &mut history, Turn::from_input(&input)).await;
            }

            changed = parent_link.changed() => {
                if changed.is_err() {
                    break;
                }
                let parent = *parent_link.borrow_and_update();
                let dropped = observations.discard_pending();
                feed = connect(&session, &registry, parent);
                match &feed {
                    Some(f) => log::info!("[{}] Now watching {}", id, f.id),
                    None => log::info!(
                        "[{}] Detached from parent; dropped {} pending observation(s)",
                        id,
                        dropped
                    ),
                }
            }

            received = recv_feed(&mut feed) => match received {
                Ok((parent, chunk)) => {
                    if is_own_injection(&chunk, id) {
                        continue;
                    }
                    let trigger = chunk.trigger_kind();
                    let had_content = observations.has_pending_content();
                    observations.push(chunk);
                    if had_content && config.triggers.intersects(trigger) {
                        evaluate(&session, agent.as_ref(), &registry, &config, &mut history, &mut observations, parent).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    let lag = OrchestratorError::LaggedObservation { watcher: id, missed };
                    log::warn!("[{}] {}", id, lag);
                    observations.push_gap(missed);
                    session.handle_output(StreamChunk::observation_gap(missed));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    log::info!("[{}] Parent stream closed", id);
                    feed = None;
                }
            },

            () = sleep_until(silence_deadline) => {
                if let Some(parent) = feed.as_ref().map(|f| f.id) {
                    log::debug!("[{}] Parent quiet; evaluating pending observations", id);
                    evaluate(&session, agent.as_ref(), &registry, &config, &mut history, &mut observations, parent).await;
                } else {
                    observations.discard_pending();
                }
            }
        }
    }
    log::debug!("[{}] Watcher loop stopped", id);
}

fn connect(
    session: &BackgroundSession,
    registry: &Weak<SessionRegistry>,
    parent: Option<SessionId>,
) -> Option<ParentFeed> {
    let parent = parent?;
    let rx = session.take_parent_subscription(parent).or_else(|| {
        let registry = registry.upgrade()?;
        registry.get(parent).map(|p| p.subscribe())
    })?;
    Some(ParentFeed { id: parent, rx })
}

async fn recv_feed(
    feed: &mut Option<ParentFeed>,
) -> Result<(SessionId, StreamChunk), broadcast::error::RecvError> {
    match feed {
        Some(feed) => feed.rx.recv().await.map(|chunk| (feed.id, chunk)),
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn is_own_injection(chunk: &StreamChunk, watcher: SessionId) -> bool {
    matches!(
        &chunk.kind,
        ChunkKind::WatcherInput(injection) | ChunkKind::InjectionConsumed(injection)
            if injection.watcher_id == watcher
    )
}

/// Run one evaluation turn over the pending observations and act on it
async fn evaluate(
    session: &BackgroundSession,
    agent: &dyn Agent,
    registry: &Weak<SessionRegistry>,
    config: &WatcherConfig,
    history: &mut Vec<ConversationMessage>,
    observations: &mut ObservationBuffer,
    parent: SessionId,
) {
    let id = session.id();
    let role = session.role();
    let batch = observations.begin_evaluation();
    let prompt = format_evaluation_prompt(&role, &config.brief, &batch);
    let turn = Turn::evaluation(prompt, parent, batch.fresh.len(), batch.observed_ids.clone());

    let result = run_turn(session, agent, history, turn).await;
    observations.finish_evaluation(batch, config.retention);

    let decision = match result.outcome {
        TurnOutcome::Completed => parse_evaluation(&result.assistant_text),
        TurnOutcome::Failed | TurnOutcome::Interrupted => {
            log::debug!("[{}] Evaluation did not complete; continuing", id);
            EvaluationDecision::Continue
        }
    };

    let EvaluationDecision::Interject { urgent, content } = decision else {
        log::debug!("[{}] Evaluation decided to continue", id);
        return;
    };
    log::info!("[{}] Evaluation decided to interject (urgent: {})", id, urgent);

    if !config.auto_inject {
        session.handle_output(StreamChunk::pending_injection(urgent, content));
        return;
    }

    let Some(registry) = registry.upgrade() else {
        return;
    };
    // The parent may have been destroyed or swapped while the turn ran.
    match registry.get_parent(id) {
        Some(current) if current == parent => {}
        Some(current) => {
            log::warn!(
                "[{}] Moved from {} to {} during evaluation; dropping injection",
                id,
                parent,
                current
            );
            return;
        }
        None => {
            log::warn!("[{}] Detached from {} during evaluation; dropping injection", id, parent);
            return;
        }
    }
    let Some(target) = registry.get(parent) else {
        log::warn!("[{}] Parent gone before injection could be delivered", id);
        return;
    };
    if let Err(e) = target.receive_injection(id, &role.name, role.authority, &content, urgent) {
        log::warn!("[{}] Injection into {} dropped: {}", id, target.id(), e);
    }
}
