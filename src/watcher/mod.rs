//! Watcher sessions
//!
//! - `observation`: accumulated parent chunks and retention
//! - `evaluation`: evaluation prompt and interject/continue parsing
//! - `watcher_loop`: the dual-input loop driving a watcher

pub mod evaluation;
pub mod observation;
pub(crate) mod watcher_loop;

pub use evaluation::{EvaluationDecision, format_evaluation_prompt, parse_evaluation};
pub use observation::{EvaluationBatch, ObservationBuffer, estimate_tokens};
