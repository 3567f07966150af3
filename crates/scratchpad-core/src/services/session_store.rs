//! Session store
//!
//! Maps session ids to live sessions. Creation goes through `DashMap::entry`, so
//! the check-and-insert for one id happens under a single shard lock and
//! concurrent callers racing on the same fresh id all observe one session.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use scratchpad_security::Identity;
use tracing::{debug, info, warn};

use crate::channel::ChannelFactory;
use crate::clock::Clock;
use crate::domain::Session;
use crate::error::SessionError;

const SESSION_SUFFIX_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SESSION_SUFFIX_LEN: usize = 9;

enum Removal {
    Removed,
    Retained,
    Missing,
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    channels: Arc<dyn ChannelFactory>,
    clock: Arc<dyn Clock>,
    enforce_owner: bool,
}

impl SessionStore {
    pub fn new(channels: Arc<dyn ChannelFactory>, clock: Arc<dyn Clock>, enforce_owner: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            channels,
            clock,
            enforce_owner,
        }
    }

    /// Resumes the session named by `session_id`, or creates one.
    ///
    /// An unknown id creates a session under that id; no id generates a fresh
    /// one. Resuming bumps `last_activity_at`. With owner enforcement on, a
    /// session owned by another identity is rejected untouched.
    pub fn resume_or_create(
        &self,
        session_id: Option<&str>,
        owner: &Identity,
    ) -> Result<(Session, bool), SessionError> {
        let now = self.clock.now();

        let (session, is_new) = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => self.resume_or_create_with_id(id, owner, now)?,
            None => (self.create_with_generated_id(owner, now), true),
        };

        if is_new {
            info!(
                session_id = %session.id,
                user_id = %session.owner_object_id,
                total_sessions = self.sessions.len(),
                "Session created"
            );
        } else {
            debug!(session_id = %session.id, "Session resumed");
        }
        Ok((session, is_new))
    }

    fn resume_or_create_with_id(
        &self,
        id: &str,
        owner: &Identity,
        now: DateTime<Utc>,
    ) -> Result<(Session, bool), SessionError> {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let session = occupied.get_mut();
                if self.enforce_owner && session.owner_object_id != owner.object_id() {
                    warn!(
                        session_id = %id,
                        user_id = %owner.object_id(),
                        "Rejected resumption of a session owned by another user"
                    );
                    return Err(SessionError::OwnerMismatch {
                        session_id: id.to_string(),
                    });
                }
                session.touch(now);
                Ok((session.clone(), false))
            }
            Entry::Vacant(vacant) => {
                let session = self.open_session(id.to_string(), owner, now);
                vacant.insert(session.clone());
                Ok((session, true))
            }
        }
    }

    fn create_with_generated_id(&self, owner: &Identity, now: DateTime<Utc>) -> Session {
        loop {
            let id = generate_session_id(owner.object_id(), now);
            if let Entry::Vacant(vacant) = self.sessions.entry(id.clone()) {
                let session = self.open_session(id, owner, now);
                vacant.insert(session.clone());
                return session;
            }
        }
    }

    fn open_session(&self, id: String, owner: &Identity, now: DateTime<Utc>) -> Session {
        let channel = self.channels.open(&id, owner);
        Session::new(id, owner.object_id().to_string(), now, channel)
    }

    /// Read-only; does not count as activity.
    pub fn lookup(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Removes the session and closes its channel. Returns whether it existed.
    pub fn terminate(&self, session_id: &str) -> bool {
        match self.close_and_remove(session_id, |_| true) {
            Removal::Removed => {
                debug!(
                    session_id = %session_id,
                    total_sessions = self.sessions.len(),
                    "Session removed"
                );
                true
            }
            Removal::Retained | Removal::Missing => false,
        }
    }

    /// Termination on behalf of `caller`, honouring owner enforcement.
    pub fn terminate_for(&self, session_id: &str, caller: &Identity) -> Result<(), SessionError> {
        let enforce_owner = self.enforce_owner;
        let removal = self.close_and_remove(session_id, |session| {
            !enforce_owner || session.owner_object_id == caller.object_id()
        });

        match removal {
            Removal::Removed => {
                debug!(
                    session_id = %session_id,
                    total_sessions = self.sessions.len(),
                    "Session removed"
                );
                Ok(())
            }
            Removal::Retained => {
                warn!(
                    session_id = %session_id,
                    user_id = %caller.object_id(),
                    "Rejected termination of a session owned by another user"
                );
                Err(SessionError::OwnerMismatch {
                    session_id: session_id.to_string(),
                })
            }
            Removal::Missing => Err(SessionError::NotFound),
        }
    }

    /// Terminates every session idle for longer than `ttl`. Returns the count removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = self.clock.now();

        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now, ttl))
            .map(|entry| entry.key().clone())
            .collect();

        // Re-checked under the entry lock: a session resumed since the scan stays.
        let expired: Vec<String> = candidates
            .into_iter()
            .filter(|id| {
                matches!(
                    self.close_and_remove(id, |session| session.is_expired(now, ttl)),
                    Removal::Removed
                )
            })
            .collect();

        if !expired.is_empty() {
            info!(
                count = expired.len(),
                session_ids = ?expired,
                "Cleaning up expired sessions"
            );
        }
        expired.len()
    }

    /// Ids of every live session owned by `owner_object_id`.
    pub fn sessions_for_owner(&self, owner_object_id: &str) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().owner_object_id == owner_object_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Terminates all sessions. Used on shutdown.
    pub fn drain(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter(|id| self.terminate(id)).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes the channel before the entry is removed, while the id's shard lock
    /// is held, so a concurrent create under the same id only ever sees a
    /// released session.
    fn close_and_remove(
        &self,
        session_id: &str,
        should_remove: impl Fn(&Session) -> bool,
    ) -> Removal {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(occupied) if should_remove(occupied.get()) => {
                self.close_channel(occupied.get());
                occupied.remove();
                Removal::Removed
            }
            Entry::Occupied(_) => Removal::Retained,
            Entry::Vacant(_) => Removal::Missing,
        }
    }

    fn close_channel(&self, session: &Session) {
        if let Err(e) = session.channel().close() {
            warn!(session_id = %session.id, error = %e, "Error closing session channel");
        }
    }
}

fn generate_session_id(owner_object_id: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| SESSION_SUFFIX_CHARSET[rng.random_range(0..SESSION_SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("{owner_object_id}-{}-{suffix}", now.timestamp_millis())
}
