//! Route guard — the authoritative, fully-informed authorization layer.
//!
//! DESIGN
//! ======
//! The edge middleware decides from credential presence alone; this layer
//! decides from the resolved session. `decide` is a pure function of
//! `(path, requirement, snapshot)` so the whole decision table is testable
//! without any async plumbing. Around it, `RouteGuard` subscribes to the
//! session cache, re-evaluates on every transition, and funnels redirect
//! dispatches through the coordinator so cache churn never dispatches the
//! same navigation twice. Only the mount-time read may trigger a lookup;
//! re-evaluation decides over the notified snapshot, so the guard can never
//! feed the cache the churn it is reacting to.

use std::sync::Arc;

use crate::classify;
use crate::config::GateConfig;
use crate::redirect::RedirectCoordinator;
use crate::session::{Role, SessionCache, SessionSnapshot, SessionStatus};

// =============================================================================
// DECISION
// =============================================================================

/// Authorization demanded by the page wrapping itself in the guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteRequirement {
    pub require_auth: bool,
    pub require_admin: bool,
}

impl RouteRequirement {
    /// No requirement: public page.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Any authenticated session suffices.
    #[must_use]
    pub fn auth() -> Self {
        Self { require_auth: true, require_admin: false }
    }

    /// Only an admin session suffices.
    #[must_use]
    pub fn admin() -> Self {
        Self { require_auth: true, require_admin: true }
    }

    /// Requirement implied by the shared classification table.
    #[must_use]
    pub fn from_class(class: classify::RouteClass) -> Self {
        match class {
            classify::RouteClass::Public => Self::none(),
            classify::RouteClass::AuthRequired => Self::auth(),
            classify::RouteClass::AdminRequired => Self::admin(),
        }
    }
}

/// Per-evaluation output of the guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the page content.
    Pass,
    /// Render the loading placeholder until the cache settles.
    AwaitSession,
    /// Navigate to the target instead of rendering.
    Redirect(String),
}

/// The guard decision table. Pure; every failure below this point has
/// already been normalized into the snapshot.
#[must_use]
pub fn decide(
    path: &str,
    requirement: RouteRequirement,
    snapshot: &SessionSnapshot,
    config: &GateConfig,
) -> GuardDecision {
    // A signed-in user has no business on the auth pages; send them to the
    // landing page for their role.
    if snapshot.status == SessionStatus::Resolved && classify::is_auth_page(path) {
        if let Some(session) = &snapshot.session {
            return GuardDecision::Redirect(config.landing_for(session.role).to_string());
        }
    }

    if !requirement.require_auth && !requirement.require_admin {
        return GuardDecision::Pass;
    }

    match snapshot.status {
        SessionStatus::Unknown | SessionStatus::Loading => GuardDecision::AwaitSession,
        SessionStatus::Resolved => match &snapshot.session {
            Some(session) if requirement.require_admin && session.role != Role::Admin => {
                // Authenticated but unauthorized: home, not login.
                GuardDecision::Redirect(config.home_path.clone())
            }
            Some(_) => GuardDecision::Pass,
            // Resolved without a session cannot satisfy an auth requirement.
            None => GuardDecision::Redirect(config.login_redirect(path)),
        },
        SessionStatus::Absent => GuardDecision::Redirect(config.login_redirect(path)),
    }
}

// =============================================================================
// GUARD DRIVER
// =============================================================================

/// Dispatches a navigation decided by the guard. In the event-driven client
/// this performs the actual location change; tests record calls.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, target: &str);
}

/// Wraps protected content: reads the session cache, classifies the current
/// requirement, and either passes, awaits, or redirects — at most one
/// redirect per navigation.
#[derive(Clone)]
pub struct RouteGuard {
    cache: SessionCache,
    coordinator: RedirectCoordinator,
    config: Arc<GateConfig>,
    navigator: Arc<dyn Navigator>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(
        cache: SessionCache,
        coordinator: RedirectCoordinator,
        config: Arc<GateConfig>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self { cache, coordinator, config, navigator }
    }

    /// Evaluate the current state. Reading the cache triggers a lookup when
    /// no session is cached. No navigation is dispatched here.
    #[must_use]
    pub fn evaluate(&self, path: &str, requirement: RouteRequirement) -> GuardDecision {
        let snapshot = self.cache.get_session();
        decide(path, requirement, &snapshot, &self.config)
    }

    /// Decide over an already-observed snapshot and, on a redirect decision,
    /// dispatch it through the coordinator. Never reads the cache, so
    /// notification-driven re-evaluation cannot restart a lookup. Repeated
    /// redirect decisions for the same navigation dispatch nothing.
    pub fn dispatch_for(
        &self,
        path: &str,
        requirement: RouteRequirement,
        snapshot: &SessionSnapshot,
    ) -> GuardDecision {
        let decision = decide(path, requirement, snapshot, &self.config);
        if let GuardDecision::Redirect(target) = &decision {
            let epoch = self.coordinator.epoch_for(path);
            if self.coordinator.try_issue(epoch) {
                tracing::debug!(%path, %target, "guard redirect");
                self.navigator.navigate(target);
            }
        }
        decision
    }

    /// Mount-time entry point: read the cache (triggering a lookup if
    /// needed) and dispatch through the coordinator.
    pub fn evaluate_and_dispatch(&self, path: &str, requirement: RouteRequirement) -> GuardDecision {
        let snapshot = self.cache.get_session();
        self.dispatch_for(path, requirement, &snapshot)
    }

    /// Await a terminal decision for the path: `Pass` or `Redirect`, never
    /// `AwaitSession` — unless the cache itself goes away mid-wait, in which
    /// case the placeholder decision is all that can be rendered.
    pub async fn resolve(&self, path: &str, requirement: RouteRequirement) -> GuardDecision {
        // Subscribe before the first read so a transition between the read
        // and the wait is never missed. Only that first read may trigger a
        // lookup; later rounds decide over the notified snapshot.
        let mut rx = self.cache.subscribe();
        let mut snapshot = self.cache.get_session();
        loop {
            let decision = decide(path, requirement, &snapshot, &self.config);
            if decision != GuardDecision::AwaitSession {
                return decision;
            }
            if rx.changed().await.is_err() {
                return GuardDecision::AwaitSession;
            }
            snapshot = rx.borrow_and_update().clone();
        }
    }

    /// Re-evaluate on every cache transition until the handle is dropped.
    /// Dropping the handle aborts the task, so an unmounted guard can never
    /// dispatch a late redirect.
    #[must_use]
    pub fn watch(&self, path: String, requirement: RouteRequirement) -> GuardHandle {
        let guard = self.clone();
        let mut rx = self.cache.subscribe();
        let task = tokio::spawn(async move {
            let mut snapshot = guard.cache.get_session();
            loop {
                guard.dispatch_for(&path, requirement, &snapshot);
                if rx.changed().await.is_err() {
                    break;
                }
                snapshot = rx.borrow_and_update().clone();
            }
        });
        GuardHandle { task }
    }
}

/// Handle to a watching guard. Aborts the evaluation task on drop.
pub struct GuardHandle {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
