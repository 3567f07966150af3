// ============================================================================
// Scratchpad Core - Scratchpad Service
// File: crates/scratchpad-core/src/services/scratchpad_service.rs
// ============================================================================
//! Scoped text buffers addressed through a session's `ScopeContext`

use std::sync::Arc;

use tracing::debug;

use crate::domain::{ScopeContext, ScratchpadScope};
use crate::error::ToolError;
use crate::repositories::ScratchpadRepository;

pub struct ScratchpadService<R: ScratchpadRepository> {
    repo: Arc<R>,
}

impl<R: ScratchpadRepository> ScratchpadService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn append(
        &self,
        ctx: &ScopeContext,
        scope: ScratchpadScope,
        text: &str,
    ) -> Result<String, ToolError> {
        let content = self.repo.append(scope, ctx.storage_key(scope), text).await?;
        let appended = text.chars().count();
        let total = content.chars().count();

        debug!(
            scope = %scope,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            text_length = appended,
            total_length = total,
            "Text appended to scratchpad"
        );

        Ok(format!(
            "Appended {appended} characters to {scope} scratchpad. Total length: {total} characters."
        ))
    }

    pub async fn get(&self, ctx: &ScopeContext, scope: ScratchpadScope) -> Result<String, ToolError> {
        let content = self
            .repo
            .get(scope, ctx.storage_key(scope))
            .await?
            .filter(|content| !content.is_empty());

        debug!(
            scope = %scope,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            content_length = content.as_ref().map_or(0, |c| c.chars().count()),
            "Scratchpad content retrieved"
        );

        Ok(content.unwrap_or_else(|| format!("No content in {scope} scratchpad.")))
    }

    pub async fn clear(&self, ctx: &ScopeContext, scope: ScratchpadScope) -> Result<String, ToolError> {
        let had_content = self.repo.clear(scope, ctx.storage_key(scope)).await?;

        debug!(
            scope = %scope,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            had_content,
            "Scratchpad cleared"
        );

        Ok(format!("Cleared {scope} scratchpad."))
    }

    /// Forgets the session-scope buffer once the session has ended.
    pub fn release_session(&self, ctx: &ScopeContext) {
        self.repo.release_session(&ctx.session_id);
        debug!(session_id = %ctx.session_id, "Session scratchpad released");
    }
}
