//! Background expiry of idle sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::session_store::SessionStore;

/// Sweeps `store` every `ttl / 2` until `shutdown` is cancelled.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    ttl: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let period = (ttl / 2).max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!(
            interval_secs = period.as_secs_f64(),
            ttl_secs = ttl.as_secs(),
            "Session sweeper started"
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    store.sweep_expired(ttl);
                }
            }
        }

        info!("Session sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelFactory, MockSessionChannel, SessionChannel};
    use crate::clock::ManualClock;
    use scratchpad_security::Identity;

    struct QuietFactory;

    impl ChannelFactory for QuietFactory {
        fn open(&self, _session_id: &str, _owner: &Identity) -> Arc<dyn SessionChannel> {
            let mut channel = MockSessionChannel::new();
            channel.expect_close().returning(|| Ok(()));
            Arc::new(channel)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_idle_sessions_and_stops() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(SessionStore::new(Arc::new(QuietFactory), clock.clone(), true));
        let owner = Identity::new("sub", "owner-1", None, vec!["s".to_string()]);
        store.resume_or_create(Some("idle"), &owner).unwrap();

        let ttl = Duration::from_secs(60);
        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), ttl, shutdown.clone());

        clock.advance(chrono::Duration::seconds(61));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(store.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
