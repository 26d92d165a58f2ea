//! Session roles and authority levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Weight attached to a watcher's injected messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleAuthority {
    /// Advisory: the parent may consider the message
    #[default]
    Peer,
    /// Directive: the parent is expected to follow the message
    Supervisor,
}

impl RoleAuthority {
    /// Display name (`Peer`, `Supervisor`)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Peer => "Peer",
            Self::Supervisor => "Supervisor",
        }
    }

    /// How a watcher with this authority should frame its interjections
    #[must_use]
    pub const fn evaluation_context(&self) -> &'static str {
        match self {
            Self::Peer => {
                "As a Peer, your interjections are suggestions that the parent session may consider."
            }
            Self::Supervisor => {
                "As a Supervisor, your interjections carry authority and should be followed by the parent session."
            }
        }
    }
}

impl fmt::Display for RoleAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleAuthority {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "peer" => Ok(Self::Peer),
            "supervisor" => Ok(Self::Supervisor),
            other => Err(OrchestratorError::invalid_role(format!(
                "unknown authority '{other}' (expected peer or supervisor)"
            ))),
        }
    }
}

/// Role a session plays when it watches another session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRole {
    /// Role name (e.g. "code-reviewer")
    pub name: String,
    /// What this role looks for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Authority level
    #[serde(default)]
    pub authority: RoleAuthority,
}

impl SessionRole {
    /// Create a validated role
    ///
    /// # Errors
    /// Returns `InvalidRole` when the name is blank.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        authority: RoleAuthority,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OrchestratorError::invalid_role("role name cannot be empty"));
        }
        Ok(Self {
            name,
            description: description.filter(|d| !d.trim().is_empty()),
            authority,
        })
    }
}

impl Default for SessionRole {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            description: None,
            authority: RoleAuthority::Peer,
        }
    }
}
