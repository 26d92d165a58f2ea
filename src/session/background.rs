//! Background session state
//!
//! A [`BackgroundSession`] owns everything one session mutates: its replay
//! buffer, its publisher, its input queue, its status and its cancellation
//! signal. Other sessions reach it only through these entry points.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};

use super::cancel::CancelSignal;
use crate::agent::SessionInput;
use crate::error::{OrchestratorError, Result};
use crate::injection::Injection;
use crate::types::{
    CorrelationId, RoleAuthority, SessionId, SessionRole, SessionStatus, StreamChunk,
    WatcherConfig,
};

/// Callback receiving every chunk a session emits while attached
///
/// Invoked while the session's output lock is held; it must not call back
/// into the same session.
pub type LiveViewer = Arc<dyn Fn(&StreamChunk) + Send + Sync>;

/// Capacities a session is built with
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionLimits {
    pub broadcast_capacity: usize,
    pub input_queue_capacity: usize,
    pub output_buffer_limit: Option<usize>,
}

struct OutputState {
    buffer: VecDeque<StreamChunk>,
    next_seq: u64,
    viewer: Option<LiveViewer>,
}

/// One addressable agent conversation
pub struct BackgroundSession {
    id: SessionId,
    role: RwLock<SessionRole>,
    watcher_config: Option<WatcherConfig>,
    created_at: DateTime<Utc>,
    output: Mutex<OutputState>,
    output_limit: Option<usize>,
    publisher: broadcast::Sender<StreamChunk>,
    input_tx: mpsc::Sender<SessionInput>,
    status: watch::Sender<SessionStatus>,
    parent: watch::Sender<Option<SessionId>>,
    parent_subscription: Mutex<Option<(SessionId, broadcast::Receiver<StreamChunk>)>>,
    cancel: CancelSignal,
}

impl BackgroundSession {
    /// Create a session and the receiving end of its input queue
    pub(crate) fn new(
        id: SessionId,
        role: SessionRole,
        watcher_config: Option<WatcherConfig>,
        created_at: DateTime<Utc>,
        limits: SessionLimits,
    ) -> (Arc<Self>, mpsc::Receiver<SessionInput>) {
        let (publisher, _) = broadcast::channel(limits.broadcast_capacity);
        let (input_tx, input_rx) = mpsc::channel(limits.input_queue_capacity);
        let (status, _) = watch::channel(SessionStatus::Idle);
        let (parent, _) = watch::channel(None);

        let session = Arc::new(Self {
            id,
            role: RwLock::new(role),
            watcher_config,
            created_at,
            output: Mutex::new(OutputState {
                buffer: VecDeque::new(),
                next_seq: 0,
                viewer: None,
            }),
            output_limit: limits.output_buffer_limit,
            publisher,
            input_tx,
            status,
            parent,
            parent_subscription: Mutex::new(None),
            cancel: CancelSignal::new(),
        });
        (session, input_rx)
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current role
    #[must_use]
    pub fn role(&self) -> SessionRole {
        self.role.read().clone()
    }

    pub(crate) fn set_role(&self, role: SessionRole) {
        *self.role.write() = role;
    }

    /// Watcher configuration, if this session was created as a watcher
    #[must_use]
    pub const fn watcher_config(&self) -> Option<&WatcherConfig> {
        self.watcher_config.as_ref()
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ------------------------------------------------------------------
    // Status and parent link
    // ------------------------------------------------------------------

    /// Current turn state
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub(crate) fn set_status(&self, status: SessionStatus) {
        self.status.send_replace(status);
    }

    /// Receiver that observes every status transition
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Wait until the session reaches `want`
    pub async fn wait_for_status(&self, want: SessionStatus) {
        let mut rx = self.status.subscribe();
        // The sender lives as long as `self`, so this only fails if it is gone.
        let _ = rx.wait_for(|status| *status == want).await;
    }

    /// Session this one watches, if any
    #[must_use]
    pub fn parent(&self) -> Option<SessionId> {
        *self.parent.borrow()
    }

    /// Start observing `parent`
    ///
    /// Subscribes here, before the link is published, so nothing the parent
    /// emits after this call is missed while the watcher loop catches up.
    pub(crate) fn link_parent(&self, parent: &Self) {
        *self.parent_subscription.lock() = Some((parent.id(), parent.subscribe()));
        self.parent.send_replace(Some(parent.id()));
    }

    /// Stop observing the current parent
    pub(crate) fn unlink_parent(&self) {
        self.parent_subscription.lock().take();
        self.parent.send_replace(None);
    }

    /// Subscription made by [`link_parent`](Self::link_parent), if it is for `parent`
    pub(crate) fn take_parent_subscription(
        &self,
        parent: SessionId,
    ) -> Option<broadcast::Receiver<StreamChunk>> {
        let mut slot = self.parent_subscription.lock();
        match slot.take() {
            Some((id, rx)) if id == parent => Some(rx),
            _ => None,
        }
    }

    pub(crate) fn parent_receiver(&self) -> watch::Receiver<Option<SessionId>> {
        self.parent.subscribe()
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Buffer, forward and publish one chunk
    ///
    /// Chunks without a correlation ID are assigned the next one for this
    /// session. Buffering, forwarding and publishing happen under one lock,
    /// so the buffer, the live viewer and every subscriber see the same
    /// order. Returns the chunk as it was recorded.
    pub fn handle_output(&self, mut chunk: StreamChunk) -> StreamChunk {
        let mut output = self.output.lock();

        let seq = output.next_seq;
        output.next_seq += 1;
        if chunk.correlation_id.is_none() {
            chunk.correlation_id = Some(CorrelationId::for_chunk(self.id, seq));
        }

        output.buffer.push_back(chunk.clone());
        if let Some(limit) = self.output_limit {
            while output.buffer.len() > limit {
                output.buffer.pop_front();
            }
        }

        if let Some(viewer) = &output.viewer {
            viewer(&chunk);
        }

        // No subscribers is not an error.
        let _ = self.publisher.send(chunk.clone());
        chunk
    }

    /// Subscribe to chunks published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamChunk> {
        self.publisher.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.publisher.receiver_count()
    }

    /// Replay the buffer to `viewer`, then forward every new chunk to it
    ///
    /// Replaces any viewer already attached. Returns the number of chunks
    /// replayed.
    pub fn attach(&self, viewer: LiveViewer) -> usize {
        let mut output = self.output.lock();
        for chunk in &output.buffer {
            viewer(chunk);
        }
        let replayed = output.buffer.len();
        output.viewer = Some(viewer);
        replayed
    }

    /// Stop forwarding to the live viewer
    ///
    /// Returns `false` when no viewer was attached.
    pub fn detach(&self) -> bool {
        self.output.lock().viewer.take().is_some()
    }

    /// Whether a live viewer is attached
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.output.lock().viewer.is_some()
    }

    /// Copy of the replay buffer
    #[must_use]
    pub fn buffered_chunks(&self) -> Vec<StreamChunk> {
        self.output.lock().buffer.iter().cloned().collect()
    }

    /// Number of chunks in the replay buffer
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.output.lock().buffer.len()
    }

    /// Copy of `len` buffered chunks starting at `start`
    pub(crate) fn buffered_range(&self, start: usize, len: usize) -> (Vec<StreamChunk>, usize) {
        let output = self.output.lock();
        let total = output.buffer.len();
        let chunks = output.buffer.iter().skip(start).take(len).cloned().collect();
        (chunks, total)
    }

    /// Seed the replay buffer before the session's loop starts
    ///
    /// Only the newest chunks up to the output limit are kept.
    pub(crate) fn restore_buffer(&self, chunks: Vec<StreamChunk>) {
        let mut output = self.output.lock();
        let next_seq = chunks
            .iter()
            .filter_map(|c| c.correlation_id.as_ref())
            .filter(|c| c.as_str().starts_with(&self.id.to_string()))
            .filter_map(CorrelationId::sequence)
            .max()
            .map_or(chunks.len() as u64, |max| max + 1);
        let mut buffer: VecDeque<_> = chunks.into();
        if let Some(limit) = self.output_limit {
            let excess = buffer.len().saturating_sub(limit);
            buffer.drain(..excess);
        }
        output.buffer = buffer;
        output.next_seq = next_seq;
    }

    // ------------------------------------------------------------------
    // Input and cancellation
    // ------------------------------------------------------------------

    /// Queue a prompt from this session's own user
    ///
    /// # Errors
    /// `InputQueueFull` when the queue is at capacity, `SessionClosed` when
    /// the loop has stopped.
    pub fn enqueue_prompt(&self, text: impl Into<String>) -> Result<()> {
        self.input_tx
            .try_send(SessionInput::Prompt(text.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => OrchestratorError::InputQueueFull(self.id),
                mpsc::error::TrySendError::Closed(_) => OrchestratorError::SessionClosed(self.id),
            })
    }

    /// Accept a message from a watcher
    ///
    /// Reserves a queue slot first so a full queue neither interrupts nor
    /// publishes anything. An urgent injection interrupts before it is
    /// queued, so it can never cancel its own turn. The `WatcherInput` chunk
    /// is published right away; the turn that later runs the message opens
    /// with an `InjectionConsumed` chunk.
    ///
    /// # Errors
    /// `EmptyInjection`, `InjectionQueueFull` or `SessionClosed`.
    pub fn receive_injection(
        &self,
        from_id: SessionId,
        role_name: &str,
        authority: RoleAuthority,
        content: &str,
        interrupt_now: bool,
    ) -> Result<Injection> {
        let injection = Injection::new(from_id, role_name, authority, content, interrupt_now)?;

        let permit = self.input_tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => OrchestratorError::InjectionQueueFull(self.id),
            mpsc::error::TrySendError::Closed(()) => OrchestratorError::SessionClosed(self.id),
        })?;

        if interrupt_now && self.interrupt() {
            log::info!("[{}] Urgent injection from {} interrupted the current turn", self.id, from_id);
        }
        // Published before queueing so it always precedes the turn's
        // `InjectionConsumed` marker.
        self.handle_output(StreamChunk::watcher_input(injection.clone()));
        permit.send(SessionInput::Injection(injection.clone()));
        log::debug!(
            "[{}] Queued injection from {} ({}, {})",
            self.id,
            from_id,
            role_name,
            authority
        );
        Ok(injection)
    }

    /// Request cancellation of the current turn
    ///
    /// Returns `false` when cancellation was already pending.
    pub fn interrupt(&self) -> bool {
        self.cancel.interrupt()
    }

    pub(crate) const fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }
}

impl std::fmt::Debug for BackgroundSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSession")
            .field("id", &self.id)
            .field("role", &self.role.read().name)
            .field("status", &self.status())
            .field("parent", &self.parent())
            .field("chunks", &self.chunk_count())
            .finish()
    }
}
