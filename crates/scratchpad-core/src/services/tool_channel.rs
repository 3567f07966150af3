//! Session channel backed by a per-session worker task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scratchpad_security::Identity;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channel::{ChannelFactory, SessionChannel};
use crate::domain::{RpcRequest, RpcResponse, ScopeContext};
use crate::error::ChannelError;
use crate::repositories::ScratchpadRepository;
use crate::services::ToolDispatcher;

const QUEUE_DEPTH: usize = 32;

struct Envelope {
    request: RpcRequest,
    reply: oneshot::Sender<Option<RpcResponse>>,
}

/// Requests for one session are handled in arrival order by a dedicated task,
/// keyed by the session id and the owner captured at creation.
pub struct ToolChannel<R: ScratchpadRepository> {
    requests: mpsc::Sender<Envelope>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    dispatcher: Arc<ToolDispatcher<R>>,
    ctx: ScopeContext,
}

impl<R: ScratchpadRepository + 'static> ToolChannel<R> {
    /// Spawns the worker. Must be called inside a Tokio runtime.
    pub fn spawn(dispatcher: Arc<ToolDispatcher<R>>, ctx: ScopeContext) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let shutdown = CancellationToken::new();
        tokio::spawn(run_worker(dispatcher.clone(), ctx.clone(), rx, shutdown.clone()));
        Self {
            requests: tx,
            closed: AtomicBool::new(false),
            shutdown,
            dispatcher,
            ctx,
        }
    }
}

async fn run_worker<R: ScratchpadRepository>(
    dispatcher: Arc<ToolDispatcher<R>>,
    ctx: ScopeContext,
    mut rx: mpsc::Receiver<Envelope>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            envelope = rx.recv() => match envelope {
                Some(Envelope { request, reply }) => {
                    let response = dispatcher.dispatch(&ctx, request).await;
                    // caller may have gone away
                    let _ = reply.send(response);
                }
                None => break,
            },
        }
    }
    debug!(session_id = %ctx.session_id, "Session channel worker stopped");
}

#[async_trait]
impl<R: ScratchpadRepository + 'static> SessionChannel for ToolChannel<R> {
    async fn exchange(&self, request: RpcRequest) -> Result<Option<RpcResponse>, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ChannelError::Closed)?;
        response.await.map_err(|_| ChannelError::Closed)
    }

    /// Stops the worker and forgets the session-scope buffer. A later session
    /// reusing the id starts empty.
    fn close(&self) -> Result<(), ChannelError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyClosed);
        }
        self.shutdown.cancel();
        self.dispatcher.release_session(&self.ctx);
        Ok(())
    }
}

// Dropping without close only stops the worker: the id may already belong to a new session.
impl<R: ScratchpadRepository> Drop for ToolChannel<R> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub struct ToolChannelFactory<R: ScratchpadRepository> {
    dispatcher: Arc<ToolDispatcher<R>>,
}

impl<R: ScratchpadRepository> ToolChannelFactory<R> {
    pub fn new(dispatcher: Arc<ToolDispatcher<R>>) -> Self {
        Self { dispatcher }
    }
}

impl<R: ScratchpadRepository + 'static> ChannelFactory for ToolChannelFactory<R> {
    fn open(&self, session_id: &str, owner: &Identity) -> Arc<dyn SessionChannel> {
        let ctx = ScopeContext::new(session_id, owner.object_id());
        Arc::new(ToolChannel::spawn(self.dispatcher.clone(), ctx))
    }
}
