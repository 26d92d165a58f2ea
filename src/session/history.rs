//! Conversation history reconstruction from a replay buffer

use crate::agent::{ConversationMessage, SessionInput};
use crate::types::{ChunkKind, StreamChunk};

/// Rebuild the two-role conversation a session had from its buffered output
///
/// A turn opens at `UserInput`, `Observation` or `InjectionConsumed`. The
/// `WatcherInput` chunk published when an injection arrives is skipped: it
/// may land in the middle of another turn, ahead of prompts queued earlier.
#[must_use]
pub fn rebuild_history(chunks: &[StreamChunk]) -> Vec<ConversationMessage> {
    let mut history = Vec::new();
    let mut assistant = String::new();

    let flush = |history: &mut Vec<ConversationMessage>, assistant: &mut String| {
        if !assistant.is_empty() {
            history.push(ConversationMessage::assistant(std::mem::take(assistant)));
        }
    };

    for chunk in chunks {
        let opening = match &chunk.kind {
            ChunkKind::UserInput { text } => Some(ConversationMessage::user(text.clone())),
            ChunkKind::Observation { source, count } => Some(ConversationMessage::user(format!(
                "[Evaluated {count} observation(s) from session {source}]"
            ))),
            ChunkKind::InjectionConsumed(injection) => {
                Some(SessionInput::Injection(injection.clone()).to_conversation_message())
            }
            ChunkKind::Text { text } => {
                assistant.push_str(text);
                None
            }
            ChunkKind::Done | ChunkKind::Error { .. } | ChunkKind::Interrupted => {
                flush(&mut history, &mut assistant);
                None
            }
            _ => None,
        };
        if let Some(message) = opening {
            flush(&mut history, &mut assistant);
            history.push(message);
        }
    }
    flush(&mut history, &mut assistant);
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ConversationRole;
    use crate::injection::Injection;
    use crate::types::{RoleAuthority, SessionId};

    #[test]
    fn prompts_and_replies_alternate() {
        let chunks = vec![
            StreamChunk::user_input("hi"),
            StreamChunk::text("hel"),
            StreamChunk::text("lo"),
            StreamChunk::done(),
            StreamChunk::user_input("again"),
            StreamChunk::interrupted(),
        ];
        let history = rebuild_history(&chunks);
        assert_eq!(
            history,
            vec![
                ConversationMessage::user("hi"),
                ConversationMessage::assistant("hello"),
                ConversationMessage::user("again"),
            ]
        );
    }

    fn injection(content: &str) -> Injection {
        Injection::new(SessionId::new(), "reviewer", RoleAuthority::Peer, content, false).unwrap()
    }

    #[test]
    fn injection_lands_where_it_was_consumed() {
        let injection = injection("consider tests");
        let chunks = vec![
            StreamChunk::user_input("write code"),
            StreamChunk::text("fn main"),
            StreamChunk::watcher_input(injection.clone()),
            StreamChunk::text("() {}"),
            StreamChunk::done(),
            StreamChunk::injection_consumed(injection),
            StreamChunk::text("ok"),
            StreamChunk::done(),
        ];
        let history = rebuild_history(&chunks);
        assert_eq!(history.len(), 4);
        assert_eq!(history[1], ConversationMessage::assistant("fn main() {}"));
        assert_eq!(history[2].role, ConversationRole::User);
        assert_eq!(history[2].as_injection().unwrap().content, "consider tests");
        assert_eq!(history[3], ConversationMessage::assistant("ok"));
    }

    #[test]
    fn injection_received_behind_a_queued_prompt_stays_behind_it() {
        let injection = injection("injected");
        let chunks = vec![
            StreamChunk::user_input("first"),
            StreamChunk::text("working"),
            StreamChunk::watcher_input(injection.clone()),
            StreamChunk::interrupted(),
            StreamChunk::user_input("second"),
            StreamChunk::text("reply-second"),
            StreamChunk::done(),
            StreamChunk::injection_consumed(injection.clone()),
            StreamChunk::text("reply-injection"),
            StreamChunk::done(),
        ];
        assert_eq!(
            rebuild_history(&chunks),
            vec![
                ConversationMessage::user("first"),
                ConversationMessage::assistant("working"),
                ConversationMessage::user("second"),
                ConversationMessage::assistant("reply-second"),
                SessionInput::Injection(injection).to_conversation_message(),
                ConversationMessage::assistant("reply-injection"),
            ]
        );
    }
}
