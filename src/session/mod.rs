//! Session internals
//!
//! - `background`: the per-session state and its entry points
//! - `cancel`: cooperative cancellation signal
//! - `agent_loop`: turn execution raced against cancellation
//! - `history`: conversation rebuild from a replay buffer

pub mod agent_loop;
pub mod background;
pub mod cancel;
pub mod history;

pub use agent_loop::{TurnOutcome, TurnResult};
pub use background::{BackgroundSession, LiveViewer};
pub use cancel::CancelSignal;
pub use history::rebuild_history;
