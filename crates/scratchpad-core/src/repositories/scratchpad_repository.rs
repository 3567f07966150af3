//! Scratchpad repository trait (port) and in-memory adapter

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::ScratchpadScope;
use crate::error::ToolError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScratchpadRepository: Send + Sync {
    /// Appends `text`, newline-separated from existing content. Returns the new content.
    async fn append(&self, scope: ScratchpadScope, key: &str, text: &str) -> Result<String, ToolError>;

    async fn get(&self, scope: ScratchpadScope, key: &str) -> Result<Option<String>, ToolError>;

    /// Returns whether the buffer had content.
    async fn clear(&self, scope: ScratchpadScope, key: &str) -> Result<bool, ToolError>;

    /// Drops the session-scope buffer of an ended session. Must not block.
    fn release_session(&self, session_id: &str);
}

/// One map per scope level; lives for the process lifetime.
#[derive(Default)]
pub struct InMemoryScratchpadRepository {
    session: DashMap<String, String>,
    user: DashMap<String, String>,
    global: DashMap<String, String>,
}

impl InMemoryScratchpadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffers(&self, scope: ScratchpadScope) -> &DashMap<String, String> {
        match scope {
            ScratchpadScope::Session => &self.session,
            ScratchpadScope::User => &self.user,
            ScratchpadScope::Global => &self.global,
        }
    }
}

#[async_trait]
impl ScratchpadRepository for InMemoryScratchpadRepository {
    async fn append(&self, scope: ScratchpadScope, key: &str, text: &str) -> Result<String, ToolError> {
        let mut buffer = self.buffers(scope).entry(key.to_string()).or_default();
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(text);
        Ok(buffer.clone())
    }

    async fn get(&self, scope: ScratchpadScope, key: &str) -> Result<Option<String>, ToolError> {
        Ok(self
            .buffers(scope)
            .get(key)
            .map(|buffer| buffer.value().clone()))
    }

    async fn clear(&self, scope: ScratchpadScope, key: &str) -> Result<bool, ToolError> {
        Ok(self.buffers(scope).remove(key).is_some())
    }

    fn release_session(&self, session_id: &str) {
        self.session.remove(session_id);
    }
}
