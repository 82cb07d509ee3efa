//! Session cache — the observable store behind the route guard.
//!
//! DESIGN
//! ======
//! A single read-through cache over the identity service's session lookup.
//! State lives behind a mutex; transitions are broadcast on a watch channel
//! so any number of guards observe the same lifecycle without triggering
//! duplicate lookups. Exactly one lookup may be in flight at a time: a read
//! spawns one only when no session is cached (`Unknown`, or `Absent` for a
//! fresh attempt), and a generation counter discards a lookup that settles
//! after `invalidate` superseded it.
//!
//! TRADE-OFFS
//! ==========
//! Lookup failures resolve to `Absent` rather than an error state. The guard
//! then treats the user as signed out, which can redirect a valid user to
//! login during an identity-service outage — the fail-closed cost the gate
//! accepts over rendering protected content on uncertain state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::identity::{IdentityClient, SessionUser};

// =============================================================================
// STATE MODEL
// =============================================================================

/// Role carried by a resolved session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

/// A resolved identity. Owned exclusively by the cache; valid until the
/// lookup that produced it is superseded or invalidated.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
    pub issued_at: OffsetDateTime,
}

impl Session {
    fn from_user(user: SessionUser) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            display_name: user.name,
            issued_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Freshness of the cached lookup result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No lookup attempted since startup or the last invalidation.
    Unknown,
    /// A lookup is in flight.
    Loading,
    /// The lookup settled with a valid session.
    Resolved,
    /// The lookup settled without a session (including lookup failure).
    Absent,
}

/// Point-in-time view of the cache handed to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session: Option<Session>,
}

impl SessionSnapshot {
    fn unknown() -> Self {
        Self { status: SessionStatus::Unknown, session: None }
    }

    fn loading() -> Self {
        Self { status: SessionStatus::Loading, session: None }
    }

    fn resolved(session: Session) -> Self {
        Self { status: SessionStatus::Resolved, session: Some(session) }
    }

    fn absent() -> Self {
        Self { status: SessionStatus::Absent, session: None }
    }

    /// Whether the lookup has settled one way or the other.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SessionStatus::Resolved | SessionStatus::Absent)
    }
}

// =============================================================================
// CACHE
// =============================================================================

struct CacheState {
    snapshot: SessionSnapshot,
    /// Bumped on every invalidation. A lookup applies its result only if the
    /// generation it was spawned under is still current.
    generation: u64,
}

struct CacheInner {
    state: Mutex<CacheState>,
    tx: watch::Sender<SessionSnapshot>,
    identity: Arc<dyn IdentityClient>,
    lookup_timeout: Duration,
}

/// Process-wide session store. Clone is cheap; all clones share state.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<CacheInner>,
}

impl SessionCache {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityClient>, lookup_timeout: Duration) -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::unknown());
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    snapshot: SessionSnapshot::unknown(),
                    generation: 0,
                }),
                tx,
                identity,
                lookup_timeout,
            }),
        }
    }

    /// Current state, synchronously. On `Unknown` or `Absent` this
    /// transitions to `Loading` and spawns exactly one lookup — a settled
    /// `Absent` gets a fresh attempt on the next read, bounded by caller
    /// behavior, while a `Resolved` session is served from cache until
    /// invalidated. Callers that find the cache already `Loading` attach to
    /// that lookup via [`Self::subscribe`].
    pub fn get_session(&self) -> SessionSnapshot {
        let mut state = self.lock_state();
        if matches!(
            state.snapshot.status,
            SessionStatus::Unknown | SessionStatus::Absent
        ) {
            state.snapshot = SessionSnapshot::loading();
            self.inner.tx.send_replace(state.snapshot.clone());

            let cache = self.clone();
            let generation = state.generation;
            tokio::spawn(async move { cache.run_lookup(generation).await });
        }
        state.snapshot.clone()
    }

    /// Observe every state transition. Dropping the receiver unsubscribes;
    /// a dropped subscriber can never act on a later transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Force the state back to `Unknown` and notify subscribers. Called
    /// after sign-in and sign-out; the next `get_session` starts a fresh
    /// lookup.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        state.generation += 1;
        state.snapshot = SessionSnapshot::unknown();
        // send_replace stores the value even with no receiver alive, so a
        // subscriber arriving later still observes the reset.
        self.inner.tx.send_replace(state.snapshot.clone());
    }

    /// Sign out at the identity service, then invalidate. The local state is
    /// dropped even if the remote call fails — the credential may already be
    /// dead, and holding a resolved session here would render stale content.
    pub async fn sign_out(&self) {
        if let Err(e) = self.inner.identity.sign_out().await {
            tracing::warn!(error = %e, "sign-out request failed");
        }
        self.invalidate();
    }

    async fn run_lookup(&self, generation: u64) {
        let result = tokio::time::timeout(
            self.inner.lookup_timeout,
            self.inner.identity.fetch_session(),
        )
        .await;

        let settled = match result {
            Ok(Ok(Some(user))) => SessionSnapshot::resolved(Session::from_user(user)),
            Ok(Ok(None)) => SessionSnapshot::absent(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "session lookup failed, treating as absent");
                SessionSnapshot::absent()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.inner.lookup_timeout.as_secs(),
                    "session lookup timed out, treating as absent"
                );
                SessionSnapshot::absent()
            }
        };

        let mut state = self.lock_state();
        if state.generation != generation {
            // Invalidated while in flight; a newer lookup owns the state.
            return;
        }
        state.snapshot = settled;
        self.inner.tx.send_replace(state.snapshot.clone());
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
