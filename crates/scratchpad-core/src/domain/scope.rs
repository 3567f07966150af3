use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Isolation level of a scratchpad buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScratchpadScope {
    Session,
    User,
    Global,
}

impl ScratchpadScope {
    pub const ALL: [ScratchpadScope; 3] = [Self::Session, Self::User, Self::Global];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::User => "user",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for ScratchpadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScratchpadScope {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Self::Session),
            "user" => Ok(Self::User),
            "global" => Ok(Self::Global),
            other => Err(ToolError::InvalidScope(other.to_string())),
        }
    }
}

/// The `(userId, sessionId)` pair a session's tool calls are keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeContext {
    pub session_id: String,
    pub user_id: String,
}

impl ScopeContext {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn storage_key(&self, scope: ScratchpadScope) -> &str {
        match scope {
            ScratchpadScope::Session => &self.session_id,
            ScratchpadScope::User => &self.user_id,
            ScratchpadScope::Global => "global",
        }
    }
}
