//! Evaluation prompt and response handling
//!
//! A watcher's agent is asked to answer with one of two blocks:
//!
//! ```text
//! [INTERJECT]
//! urgent: true
//! content: message for the parent
//! [/INTERJECT]
//! ```
//!
//! or `[CONTINUE] ... [/CONTINUE]`. Anything else is treated as continue.

use std::fmt::Write as _;

use super::observation::EvaluationBatch;
use crate::types::{SessionRole, StreamChunk};

/// What a watcher decided after an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationDecision {
    /// Send `content` to the parent, interrupting it when `urgent`
    Interject {
        /// Interrupt the parent's current turn
        urgent: bool,
        /// Message body
        content: String,
    },
    /// Take no action
    Continue,
}

/// Build the prompt for one evaluation turn
#[must_use]
pub fn format_evaluation_prompt(role: &SessionRole, brief: &str, batch: &EvaluationBatch) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "You are a watcher session with role: {}", role.name);
    if let Some(description) = &role.description {
        let _ = writeln!(prompt, "Role description: {description}");
    }
    let _ = writeln!(
        prompt,
        "Authority level: {} - {}",
        role.authority,
        role.authority.evaluation_context()
    );
    let _ = write!(prompt, "\nYour brief:\n{}\n\n", brief.trim());

    prompt.push_str("=== PARENT SESSION OBSERVATIONS ===\n\n");
    if !batch.context.is_empty() {
        prompt.push_str("--- Previously evaluated ---\n");
        render_chunks(&mut prompt, &batch.context);
        prompt.push_str("\n--- New since last evaluation ---\n");
    }
    render_chunks(&mut prompt, &batch.fresh);
    prompt.push_str("\n=== END OBSERVATIONS ===\n\n");

    prompt.push_str(
        "Based on these observations, evaluate whether you need to interject.\n\n\
         RESPONSE FORMAT (required):\n\
         If you need to inject a message to the parent session, respond with:\n\
         [INTERJECT]\n\
         urgent: true\n\
         content: Your message here\n\
         [/INTERJECT]\n\n\
         Set 'urgent: true' to interrupt the parent mid-stream (for critical issues).\n\
         Set 'urgent: false' to wait until the parent's current turn completes.\n\n\
         If no interjection is needed, respond with:\n\
         [CONTINUE]\n\
         Your reasoning here (optional)\n\
         [/CONTINUE]\n\n\
         Use the exact markers [INTERJECT], [/INTERJECT], [CONTINUE], [/CONTINUE].\n\
         Field names must be lowercase: 'urgent:' and 'content:'.\n",
    );
    prompt
}

fn render_chunks(prompt: &mut String, chunks: &[StreamChunk]) {
    for rendered in chunks.iter().filter_map(StreamChunk::render_observation) {
        prompt.push_str(&rendered);
    }
    if !prompt.ends_with('\n') {
        prompt.push('\n');
    }
}

/// Parse a watcher's evaluation response
///
/// A `[CONTINUE]` block wins over everything else. A malformed
/// `[INTERJECT]` block (missing or non-boolean `urgent:`, missing or empty
/// `content:`, no closing marker) also yields `Continue`.
#[must_use]
pub fn parse_evaluation(response: &str) -> EvaluationDecision {
    if response.contains("[CONTINUE]") && response.contains("[/CONTINUE]") {
        return EvaluationDecision::Continue;
    }
    match parse_interject_block(response) {
        Ok(Some((urgent, content))) => EvaluationDecision::Interject { urgent, content },
        Ok(None) => EvaluationDecision::Continue,
        Err(reason) => {
            log::warn!("Malformed [INTERJECT] block ({reason}); treating as continue");
            EvaluationDecision::Continue
        }
    }
}

fn parse_interject_block(response: &str) -> Result<Option<(bool, String)>, &'static str> {
    const OPEN: &str = "[INTERJECT]";
    const CLOSE: &str = "[/INTERJECT]";

    let Some(start) = response.find(OPEN) else {
        return Ok(None);
    };
    let body_start = start + OPEN.len();
    let body_len = response[body_start..]
        .find(CLOSE)
        .ok_or("missing [/INTERJECT]")?;
    let lines: Vec<&str> = response[body_start..body_start + body_len].lines().collect();

    let urgent_line = lines
        .iter()
        .find_map(|line| line.trim().strip_prefix("urgent:"))
        .ok_or("missing 'urgent:'")?;
    let urgent = match urgent_line.trim() {
        "true" => true,
        "false" => false,
        _ => return Err("'urgent:' must be true or false"),
    };

    let content_at = lines
        .iter()
        .position(|line| line.trim().starts_with("content:"))
        .ok_or("missing 'content:'")?;
    let first = lines[content_at]
        .trim()
        .strip_prefix("content:")
        .unwrap_or_default()
        .trim_start();

    let mut parts = vec![first];
    for line in &lines[content_at + 1..] {
        if line.trim().starts_with("urgent:") {
            break;
        }
        parts.push(*line);
    }
    let content = parts.join("\n").trim().to_string();
    if content.is_empty() {
        return Err("empty 'content:'");
    }
    Ok(Some((urgent, content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RoleAuthority, SessionId};
    use crate::watcher::observation::ObservationBuffer;

    fn role(authority: RoleAuthority) -> SessionRole {
        SessionRole::new("reviewer", Some("Reviews diffs".into()), authority).unwrap()
    }

    #[test]
    fn prompt_carries_role_authority_brief_and_observations() {
        let mut buffer = ObservationBuffer::new();
        buffer.push(StreamChunk::text("Editing main.rs\n"));
        buffer.push(StreamChunk::tool_call("t1", "write_file", serde_json::Value::Null));
        let batch = buffer.begin_evaluation();

        let prompt = format_evaluation_prompt(
            &role(RoleAuthority::Supervisor),
            "Flag any unwrap()",
            &batch,
        );
        assert!(prompt.contains("role: reviewer"));
        assert!(prompt.contains("Role description: Reviews diffs"));
        assert!(prompt.contains("Authority level: Supervisor"));
        assert!(prompt.contains("should be followed"));
        assert!(prompt.contains("Flag any unwrap()"));
        assert!(prompt.contains("Editing main.rs"));
        assert!(prompt.contains("[Tool Call]: write_file (t1)"));
        assert!(!prompt.contains("Previously evaluated"));

        let peer = format_evaluation_prompt(&role(RoleAuthority::Peer), "b", &batch);
        assert!(peer.contains("suggestions that the parent session may consider"));
    }

    #[test]
    fn retained_context_is_labelled() {
        let mut buffer = ObservationBuffer::new();
        buffer.push(StreamChunk::text("old"));
        let batch = buffer.begin_evaluation();
        buffer.finish_evaluation(batch, crate::types::RetentionStrategy::default());
        buffer.push(StreamChunk::observation(SessionId::new(), 1));
        buffer.push(StreamChunk::text("new"));
        let prompt = format_evaluation_prompt(
            &role(RoleAuthority::Peer),
            "b",
            &buffer.begin_evaluation(),
        );
        let old_at = prompt.find("old").unwrap();
        let new_at = prompt.find("New since last evaluation").unwrap();
        assert!(old_at < new_at);
    }

    #[test]
    fn parses_interject() {
        let response = "Looks risky.\n[INTERJECT]\nurgent: true\ncontent: Stop, that deletes\nthe database\n[/INTERJECT]";
        assert_eq!(
            parse_evaluation(response),
            EvaluationDecision::Interject {
                urgent: true,
                content: "Stop, that deletes\nthe database".into()
            }
        );
    }

    #[test]
    fn continue_wins() {
        let response = "[CONTINUE]\nfine\n[/CONTINUE]\n[INTERJECT]\nurgent: false\ncontent: x\n[/INTERJECT]";
        assert_eq!(parse_evaluation(response), EvaluationDecision::Continue);
    }

    #[test]
    fn malformed_blocks_fall_back_to_continue() {
        for response in [
            "no markers at all",
            "[INTERJECT]\nurgent: true\ncontent: unterminated",
            "[INTERJECT]\ncontent: no urgency\n[/INTERJECT]",
            "[INTERJECT]\nurgent: maybe\ncontent: x\n[/INTERJECT]",
            "[INTERJECT]\nurgent: false\n[/INTERJECT]",
            "[INTERJECT]\nurgent: false\ncontent:   \n[/INTERJECT]",
            "[INTERJECT]\nUrgent: true\ncontent: x\n[/INTERJECT]",
        ] {
            assert_eq!(parse_evaluation(response), EvaluationDecision::Continue, "{response}");
        }
    }
}
