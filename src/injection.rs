//! Cross-session injection protocol
//!
//! An [`Injection`] is the message a watcher sends into its parent's input
//! queue. Inside the orchestrator it always travels as this structured value;
//! it is flattened into a prefixed user message only when it crosses into the
//! two-role conversation format an [`Agent`](crate::agent::Agent) consumes,
//! and [`Injection::decode_wire`] reverses that flattening when a history is
//! rebuilt from a replay buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::types::{RoleAuthority, SessionId};

const WIRE_OPEN: &str = "[WATCHER: ";
const WIRE_AUTHORITY: &str = " | Authority: ";
const WIRE_SESSION: &str = " | Session: ";
const WIRE_CLOSE: &str = "] ";

/// Message injected by a watcher into its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
    /// Originating watcher session
    pub watcher_id: SessionId,
    /// Role name of the watcher
    pub role_name: String,
    /// Authority the message carries
    pub authority: RoleAuthority,
    /// Message body
    pub content: String,
    /// Whether the parent's current turn was interrupted for this message
    #[serde(default)]
    pub urgent: bool,
    /// When the watcher sent it
    pub sent_at: DateTime<Utc>,
}

impl Injection {
    /// Create a validated injection
    ///
    /// # Errors
    /// Returns `EmptyInjection` when `content` is blank.
    pub fn new(
        watcher_id: SessionId,
        role_name: impl Into<String>,
        authority: RoleAuthority,
        content: impl Into<String>,
        urgent: bool,
    ) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(OrchestratorError::EmptyInjection(watcher_id));
        }
        Ok(Self {
            watcher_id,
            role_name: role_name.into(),
            authority,
            content,
            urgent,
            sent_at: Utc::now(),
        })
    }

    /// Flatten into the prefixed single-line form a two-role agent sees
    #[must_use]
    pub fn encode_wire(&self) -> String {
        format!(
            "{WIRE_OPEN}{}{WIRE_AUTHORITY}{}{WIRE_SESSION}{}{WIRE_CLOSE}{}",
            self.role_name,
            self.authority.as_str(),
            self.watcher_id,
            self.content
        )
    }

    /// Recover an injection from its prefixed form
    ///
    /// Returns `None` for ordinary user text. Urgency is not carried on the
    /// wire and decodes as `false`.
    #[must_use]
    pub fn decode_wire(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(WIRE_OPEN)?;
        let session_at = rest.find(WIRE_SESSION)?;
        let header = &rest[..session_at];
        let after_session = &rest[session_at + WIRE_SESSION.len()..];
        let close_at = after_session.find(WIRE_CLOSE)?;

        let watcher_id = after_session[..close_at].parse().ok()?;
        let content = &after_session[close_at + WIRE_CLOSE.len()..];

        let authority_at = header.rfind(WIRE_AUTHORITY)?;
        let role_name = &header[..authority_at];
        let authority = header[authority_at + WIRE_AUTHORITY.len()..].parse().ok()?;

        Some(Self {
            watcher_id,
            role_name: role_name.to_string(),
            authority,
            content: content.to_string(),
            urgent: false,
            sent_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_carries_role_authority_and_origin() {
        let id = SessionId::new();
        let injection =
            Injection::new(id, "reviewer", RoleAuthority::Supervisor, "stop using unwrap", true)
                .unwrap();
        assert_eq!(
            injection.encode_wire(),
            format!("[WATCHER: reviewer | Authority: Supervisor | Session: {id}] stop using unwrap")
        );
    }

    #[test]
    fn decode_reverses_encode_except_urgency() {
        let id = SessionId::new();
        let original = Injection::new(
            id,
            "sec | audit",
            RoleAuthority::Peer,
            "check [this] | and that",
            true,
        )
        .unwrap();
        let decoded = Injection::decode_wire(&original.encode_wire()).unwrap();
        assert_eq!(decoded.watcher_id, id);
        assert_eq!(decoded.role_name, "sec | audit");
        assert_eq!(decoded.authority, RoleAuthority::Peer);
        assert_eq!(decoded.content, "check [this] | and that");
        assert!(!decoded.urgent);
    }

    #[test]
    fn plain_text_is_not_an_injection() {
        assert_eq!(Injection::decode_wire("hello"), None);
        assert_eq!(Injection::decode_wire("[WATCHER: x] hi"), None);
    }

    #[test]
    fn empty_content_rejected() {
        let err = Injection::new(SessionId::new(), "r", RoleAuthority::Peer, "  ", false)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::EmptyInjection(_)));
    }
}
