//! Per-session communication channel

use std::sync::Arc;

use async_trait::async_trait;
use scratchpad_security::Identity;

use crate::domain::{RpcRequest, RpcResponse};
use crate::error::ChannelError;

/// Bidirectional request/response exchange owned by exactly one session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Notifications yield `Ok(None)`.
    async fn exchange(&self, request: RpcRequest) -> Result<Option<RpcResponse>, ChannelError>;

    fn close(&self) -> Result<(), ChannelError>;
}

/// Opens channels for new sessions. Called while the store holds an entry lock,
/// so it must not block or await.
pub trait ChannelFactory: Send + Sync {
    fn open(&self, session_id: &str, owner: &Identity) -> Arc<dyn SessionChannel>;
}
