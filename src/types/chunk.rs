//! Stream chunk types
//!
//! A [`StreamChunk`] is one unit of session output. Everything a session
//! produces (agent text, tool traffic, terminal markers, observations made
//! by a watcher, injections received from a watcher) flows through the same
//! type so that a single buffer and a single publisher can carry it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{CorrelationId, SessionId};
use super::watcher::TriggerKinds;
use crate::injection::Injection;

// ============================================================================
// Chunk Kinds
// ============================================================================

/// Kind-specific payload of a stream chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkKind {
    /// A prompt as it began executing, recorded for replay
    UserInput {
        /// Prompt text
        text: String,
    },
    /// Assistant text
    Text {
        /// Text fragment
        text: String,
    },
    /// Assistant reasoning
    Thinking {
        /// Thinking fragment
        text: String,
    },
    /// Tool invocation requested by the agent
    ToolCall {
        /// Tool call identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool arguments
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Result of a tool invocation
    ToolResult {
        /// Identifier of the originating tool call
        tool_call_id: String,
        /// Result payload
        content: String,
        /// Whether the tool reported failure
        #[serde(default)]
        is_error: bool,
    },
    /// Turn completed normally
    Done,
    /// Turn failed
    Error {
        /// Error detail
        message: String,
    },
    /// Turn was cancelled
    Interrupted,
    /// Watcher observed a batch of parent chunks
    Observation {
        /// Observed session
        source: SessionId,
        /// Number of chunks evaluated
        count: usize,
    },
    /// Watcher missed parent chunks because it fell behind
    ObservationGap {
        /// Number of chunks missed
        missed: u64,
    },
    /// Injection received from a watcher
    WatcherInput(Injection),
    /// A queued watcher injection started executing as a turn
    InjectionConsumed(Injection),
    /// Interject decision held back for the caller to forward
    PendingInjection {
        /// Whether the watcher asked to interrupt the parent
        urgent: bool,
        /// Message to forward
        content: String,
    },
}

// ============================================================================
// Stream Chunk
// ============================================================================

/// One unit of session output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Payload
    #[serde(flatten)]
    pub kind: ChunkKind,
    /// Origin link, assigned when the chunk enters a session's buffer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Parent chunks this chunk was produced in response to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observed_correlation_ids: Vec<CorrelationId>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl StreamChunk {
    /// Wrap a payload in a fresh chunk
    #[must_use]
    pub fn new(kind: ChunkKind) -> Self {
        Self {
            kind,
            correlation_id: None,
            observed_correlation_ids: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Text { text: text.into() })
    }

    /// Create a thinking chunk
    pub fn thinking(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::Thinking { text: text.into() })
    }

    /// Create a user-input chunk
    pub fn user_input(text: impl Into<String>) -> Self {
        Self::new(ChunkKind::UserInput { text: text.into() })
    }

    /// Create a tool-call chunk
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::new(ChunkKind::ToolCall {
            id: id.into(),
            name: name.into(),
            args,
        })
    }

    /// Create a tool-result chunk
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(ChunkKind::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
        })
    }

    /// Create a done chunk
    #[must_use]
    pub fn done() -> Self {
        Self::new(ChunkKind::Done)
    }

    /// Create an error chunk
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ChunkKind::Error {
            message: message.into(),
        })
    }

    /// Create an interrupted chunk
    #[must_use]
    pub fn interrupted() -> Self {
        Self::new(ChunkKind::Interrupted)
    }

    /// Create an observation summary chunk
    #[must_use]
    pub fn observation(source: SessionId, count: usize) -> Self {
        Self::new(ChunkKind::Observation { source, count })
    }

    /// Create a gap-indicator chunk
    #[must_use]
    pub fn observation_gap(missed: u64) -> Self {
        Self::new(ChunkKind::ObservationGap { missed })
    }

    /// Create a watcher-input chunk
    #[must_use]
    pub fn watcher_input(injection: Injection) -> Self {
        Self::new(ChunkKind::WatcherInput(injection))
    }

    /// Create the chunk that opens a turn running a queued injection
    #[must_use]
    pub fn injection_consumed(injection: Injection) -> Self {
        Self::new(ChunkKind::InjectionConsumed(injection))
    }

    /// Create a pending-injection chunk
    pub fn pending_injection(urgent: bool, content: impl Into<String>) -> Self {
        Self::new(ChunkKind::PendingInjection {
            urgent,
            content: content.into(),
        })
    }

    /// Set the correlation ID
    #[must_use]
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Set the observed correlation IDs
    #[must_use]
    pub fn with_observed(mut self, ids: Vec<CorrelationId>) -> Self {
        self.observed_correlation_ids = ids;
        self
    }

    /// Whether this chunk ends a turn
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            ChunkKind::Done | ChunkKind::Error { .. } | ChunkKind::Interrupted
        )
    }

    /// Trigger class of this chunk, empty for non-trigger kinds
    #[must_use]
    pub const fn trigger_kind(&self) -> TriggerKinds {
        match self.kind {
            ChunkKind::Done => TriggerKinds::TURN_COMPLETE,
            ChunkKind::ToolResult { .. } => TriggerKinds::TOOL_RESULT,
            ChunkKind::Error { .. } => TriggerKinds::ERROR,
            ChunkKind::Interrupted => TriggerKinds::INTERRUPTED,
            _ => TriggerKinds::empty(),
        }
    }

    /// Assistant-visible text carried by this chunk
    #[must_use]
    pub fn assistant_text(&self) -> Option<&str> {
        match &self.kind {
            ChunkKind::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Render this chunk the way a watcher sees it in an evaluation prompt
    ///
    /// Chunks that carry nothing worth evaluating render as `None`.
    #[must_use]
    pub fn render_observation(&self) -> Option<String> {
        match &self.kind {
            ChunkKind::Text { text } if !text.is_empty() => Some(text.clone()),
            ChunkKind::Thinking { text } => Some(format!("[Thinking]: {text}\n")),
            ChunkKind::ToolCall { id, name, args } => {
                if args.is_null() {
                    Some(format!("[Tool Call]: {name} ({id})\n"))
                } else {
                    Some(format!("[Tool Call]: {name} ({id}) {args}\n"))
                }
            }
            ChunkKind::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => {
                let label = if *is_error { "Tool Error" } else { "Tool Result" };
                Some(format!("[{label}]: {tool_call_id}\n{content}\n"))
            }
            ChunkKind::Error { message } => Some(format!("[Error]: {message}\n")),
            ChunkKind::Interrupted => Some("[Interrupted]\n".to_string()),
            ChunkKind::UserInput { text } => Some(format!("[User]: {text}\n")),
            ChunkKind::WatcherInput(injection) => Some(format!(
                "[Watcher {} ({})]: {}\n",
                injection.role_name,
                injection.authority.as_str(),
                injection.content
            )),
            ChunkKind::ObservationGap { missed } => {
                Some(format!("[... {missed} chunk(s) not observed ...]\n"))
            }
            _ => None,
        }
    }
}
