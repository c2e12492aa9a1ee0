//! Session principals and the store that owns them.
//!
//! The authenticator stage only talks to the two traits here. The bundled
//! [`MemorySessionStore`] keeps sessions in a [`DashMap`] keyed by session id,
//! read from a cookie. Liveness is a sliding window: a session is online while
//! it has not been invalidated and was last seen less than `lifetime` ago;
//! [`Principal::authenticate`] moves `last_seen` to now.
//!
//! Offline records are reclaimed. Resolving one hands out its offline
//! principal a last time (so the authenticator can redirect) and drops it;
//! records nobody comes back for are swept every [`SWEEP_EVERY`] opens, or
//! on demand with [`MemorySessionStore::purge_expired`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::request::Request;

/// An identity resolved from session state.
#[async_trait]
pub trait Principal: Send + Sync + 'static {
    /// Stable identifier of the user behind the session.
    fn id(&self) -> &str;

    /// Whether the session is still live. Evaluated when the principal was
    /// resolved.
    fn is_online(&self) -> bool;

    /// Renews liveness (sliding expiration). Identity does not change.
    async fn authenticate(&self) -> Result<(), Error>;
}

/// Resolves the principal bound to a request's session.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// `Ok(None)` means the request is anonymous. `Err` means the store
    /// itself could not be consulted.
    async fn resolve_principal(&self, req: &Request) -> Result<Option<Arc<dyn Principal>>, Error>;
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Opens between two sweeps of offline records.
pub const SWEEP_EVERY: usize = 256;

#[derive(Clone, Debug)]
struct SessionRecord {
    user_id: String,
    last_seen: Instant,
    invalidated: bool,
}

impl SessionRecord {
    fn is_online(&self, lifetime: Duration) -> bool {
        !self.invalidated && self.last_seen.elapsed() < lifetime
    }
}

struct Shared {
    sessions: DashMap<String, SessionRecord>,
    lifetime: Duration,
    opened: AtomicUsize,
}

/// Process-local session store with sliding expiration.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct MemorySessionStore {
    shared: Arc<Shared>,
    cookie: String,
}

impl MemorySessionStore {
    /// Sessions are read from cookie `cookie` and stay online for `lifetime`
    /// after their last renewal.
    pub fn new(cookie: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            shared: Arc::new(Shared { sessions: DashMap::new(), lifetime, opened: AtomicUsize::new(0) }),
            cookie: cookie.into(),
        }
    }

    /// Opens a session for `user_id` and returns its id.
    pub fn open(&self, user_id: impl Into<String>) -> String {
        if self.shared.opened.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        let session_id = Uuid::now_v7().to_string();
        let record = SessionRecord {
            user_id: user_id.into(),
            last_seen: Instant::now(),
            invalidated: false,
        };
        self.shared.sessions.insert(session_id.clone(), record);
        session_id
    }

    /// Marks a session offline (logout, forced expiry). Its next request is
    /// still recognised and redirected; after that the record is dropped.
    pub fn invalidate(&self, session_id: &str) {
        if let Some(mut record) = self.shared.sessions.get_mut(session_id) {
            record.invalidated = true;
        }
    }

    /// Drops every invalidated or lapsed record. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let lifetime = self.shared.lifetime;
        let before = self.shared.sessions.len();
        self.shared.sessions.retain(|_, record| record.is_online(lifetime));
        let purged = before.saturating_sub(self.shared.sessions.len());
        if purged > 0 {
            debug!(purged, "offline sessions reclaimed");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.shared.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.sessions.is_empty()
    }

    /// Name of the cookie carrying the session id.
    pub fn cookie_name(&self) -> &str {
        &self.cookie
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn resolve_principal(&self, req: &Request) -> Result<Option<Arc<dyn Principal>>, Error> {
        let Some(session_id) = req.cookie(&self.cookie) else {
            return Ok(None);
        };
        // Clone out of the shard so no lock outlives this call.
        let Some(record) = self.shared.sessions.get(session_id).map(|r| r.value().clone()) else {
            return Ok(None);
        };

        let lifetime = self.shared.lifetime;
        let online = record.is_online(lifetime);
        if !online {
            // Rechecked under the shard lock in case a renewal won the race.
            self.shared.sessions.remove_if(session_id, |_, r| !r.is_online(lifetime));
        }
        Ok(Some(Arc::new(SessionPrincipal {
            session_id: session_id.to_owned(),
            user_id: record.user_id,
            online,
            shared: Arc::clone(&self.shared),
        })))
    }
}

/// Principal handed out by [`MemorySessionStore`].
struct SessionPrincipal {
    session_id: String,
    user_id: String,
    online: bool,
    shared: Arc<Shared>,
}

#[async_trait]
impl Principal for SessionPrincipal {
    fn id(&self) -> &str {
        &self.user_id
    }

    fn is_online(&self) -> bool {
        self.online
    }

    async fn authenticate(&self) -> Result<(), Error> {
        // Only `last_seen` is written, under the entry's shard lock.
        match self.shared.sessions.get_mut(&self.session_id) {
            Some(mut record) => {
                record.last_seen = Instant::now();
                debug!(user = %self.user_id, "session renewed");
            }
            None => debug!(user = %self.user_id, "session vanished before renewal"),
        }
        Ok(())
    }
}
