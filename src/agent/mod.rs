//! Agent collaborator abstraction
//!
//! The orchestrator never generates output itself. Each turn is delegated to
//! an [`Agent`], which turns a prompt plus conversation history into a stream
//! of [`StreamChunk`]s ending in `Done` or `Error`.

pub mod conversation;
pub mod scripted;

use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{SessionId, StreamChunk};

pub use conversation::{ConversationMessage, ConversationRole, SessionInput};
pub use scripted::{ScriptStep, ScriptedAgent};

/// Output of a single agent turn
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Everything an agent needs to run one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    /// Session the turn belongs to
    pub session_id: SessionId,
    /// User message for this turn, already in two-role form
    pub prompt: String,
    /// Prior conversation, oldest first
    pub history: Vec<ConversationMessage>,
}

/// Agent trait for producing session output
///
/// Implementations must be cheap to call concurrently from many sessions.
/// The returned stream may stall indefinitely; callers race it against
/// cancellation and drop it when cancellation wins.
pub trait Agent: Send + Sync {
    /// Start one turn and return its output stream
    ///
    /// Errors yielded by the stream end the turn with an `Error` chunk.
    fn run_turn(&self, request: TurnRequest) -> ChunkStream;
}
