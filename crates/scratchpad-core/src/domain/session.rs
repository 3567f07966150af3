use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::channel::SessionChannel;

/// A unit of continuity between a caller and the broker.
///
/// Values handed out by the store are snapshots; the store keeps the live record.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub owner_object_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    channel: Arc<dyn SessionChannel>,
}

impl Session {
    pub fn new(
        id: String,
        owner_object_id: String,
        now: DateTime<Utc>,
        channel: Arc<dyn SessionChannel>,
    ) -> Self {
        Self {
            id,
            owner_object_id,
            created_at: now,
            last_activity_at: now,
            channel,
        }
    }

    pub fn channel(&self) -> &Arc<dyn SessionChannel> {
        &self.channel
    }

    /// Never moves `last_activity_at` backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.last_activity_at)
            .to_std()
            .map(|idle| idle > ttl)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("owner_object_id", &self.owner_object_id)
            .field("created_at", &self.created_at)
            .field("last_activity_at", &self.last_activity_at)
            .finish_non_exhaustive()
    }
}
