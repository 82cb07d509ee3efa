use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{sleep, timeout};

use super::*;
use crate::session::Session;
use crate::state::test_helpers::{RecordingNavigator, StubIdentity, test_app_state};

fn session(role: Role) -> Session {
    Session {
        user_id: "user-1".to_string(),
        role,
        display_name: "Test User".to_string(),
        issued_at: OffsetDateTime::now_utc(),
    }
}

fn snapshot(status: SessionStatus, session: Option<Session>) -> SessionSnapshot {
    SessionSnapshot { status, session }
}

fn config() -> GateConfig {
    GateConfig::default()
}

fn guard_over(
    identity: Arc<dyn crate::identity::IdentityClient>,
) -> (RouteGuard, Arc<RecordingNavigator>) {
    let state = test_app_state(identity);
    let navigator = Arc::new(RecordingNavigator::default());
    let guard = RouteGuard::new(
        state.cache,
        state.coordinator,
        state.config,
        navigator.clone(),
    );
    (guard, navigator)
}

// =============================================================================
// DECISION TABLE
// =============================================================================

#[test]
fn public_route_passes_while_loading() {
    let decision = decide(
        "/",
        RouteRequirement::none(),
        &snapshot(SessionStatus::Loading, None),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Pass);
}

#[test]
fn public_route_passes_when_absent() {
    // Scenario D: no session at all on a public route.
    let decision = decide(
        "/",
        RouteRequirement::none(),
        &snapshot(SessionStatus::Absent, None),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Pass);
}

#[test]
fn auth_route_awaits_while_unknown() {
    let decision = decide(
        "/account",
        RouteRequirement::auth(),
        &snapshot(SessionStatus::Unknown, None),
        &config(),
    );
    assert_eq!(decision, GuardDecision::AwaitSession);
}

#[test]
fn auth_route_awaits_while_loading() {
    let decision = decide(
        "/account",
        RouteRequirement::auth(),
        &snapshot(SessionStatus::Loading, None),
        &config(),
    );
    assert_eq!(decision, GuardDecision::AwaitSession);
}

#[test]
fn admin_route_awaits_while_loading() {
    let decision = decide(
        "/admin/dashboard",
        RouteRequirement::admin(),
        &snapshot(SessionStatus::Loading, None),
        &config(),
    );
    assert_eq!(decision, GuardDecision::AwaitSession);
}

#[test]
fn auth_route_passes_with_resolved_user() {
    let decision = decide(
        "/account",
        RouteRequirement::auth(),
        &snapshot(SessionStatus::Resolved, Some(session(Role::User))),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Pass);
}

#[test]
fn admin_route_passes_with_resolved_admin() {
    let decision = decide(
        "/admin/dashboard",
        RouteRequirement::admin(),
        &snapshot(SessionStatus::Resolved, Some(session(Role::Admin))),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Pass);
}

#[test]
fn admin_route_redirects_user_home_not_login() {
    // Role gate: valid user, insufficient role — home, never pass.
    let decision = decide(
        "/admin/dashboard",
        RouteRequirement::admin(),
        &snapshot(SessionStatus::Resolved, Some(session(Role::User))),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Redirect("/".to_string()));
}

#[test]
fn auth_route_fails_closed_when_absent() {
    let decision = decide(
        "/account",
        RouteRequirement::auth(),
        &snapshot(SessionStatus::Absent, None),
        &config(),
    );
    assert_eq!(
        decision,
        GuardDecision::Redirect("/login?redirect=%2Faccount".to_string())
    );
}

#[test]
fn admin_route_fails_closed_when_absent() {
    let decision = decide(
        "/admin/dashboard",
        RouteRequirement::admin(),
        &snapshot(SessionStatus::Absent, None),
        &config(),
    );
    assert_eq!(
        decision,
        GuardDecision::Redirect("/login?redirect=%2Fadmin%2Fdashboard".to_string())
    );
}

#[test]
fn resolved_without_session_fails_closed() {
    let decision = decide(
        "/account",
        RouteRequirement::auth(),
        &snapshot(SessionStatus::Resolved, None),
        &config(),
    );
    assert_eq!(
        decision,
        GuardDecision::Redirect("/login?redirect=%2Faccount".to_string())
    );
}

// =============================================================================
// AUTH PAGE RULE
// =============================================================================

#[test]
fn signed_in_user_leaves_login_page() {
    let decision = decide(
        "/login",
        RouteRequirement::none(),
        &snapshot(SessionStatus::Resolved, Some(session(Role::User))),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Redirect("/".to_string()));
}

#[test]
fn signed_in_admin_leaves_login_for_dashboard() {
    // Scenario C.
    let decision = decide(
        "/login",
        RouteRequirement::none(),
        &snapshot(SessionStatus::Resolved, Some(session(Role::Admin))),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Redirect("/admin/dashboard".to_string()));
}

#[test]
fn signed_in_user_leaves_signup_page() {
    let decision = decide(
        "/signup",
        RouteRequirement::none(),
        &snapshot(SessionStatus::Resolved, Some(session(Role::User))),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Redirect("/".to_string()));
}

#[test]
fn signed_out_visitor_may_use_login_page() {
    let decision = decide(
        "/login",
        RouteRequirement::none(),
        &snapshot(SessionStatus::Absent, None),
        &config(),
    );
    assert_eq!(decision, GuardDecision::Pass);
}

// =============================================================================
// REQUIREMENT MAPPING
// =============================================================================

#[test]
fn requirement_follows_classification() {
    use crate::classify::RouteClass;
    assert_eq!(RouteRequirement::from_class(RouteClass::Public), RouteRequirement::none());
    assert_eq!(RouteRequirement::from_class(RouteClass::AuthRequired), RouteRequirement::auth());
    assert_eq!(RouteRequirement::from_class(RouteClass::AdminRequired), RouteRequirement::admin());
}

// =============================================================================
// DRIVER: DISPATCH DEDUPLICATION
// =============================================================================

#[tokio::test]
async fn redirect_dispatches_once_per_path() {
    // Scenario E: the same absent snapshot decided repeatedly for one
    // navigation must navigate exactly once.
    let (guard, navigator) = guard_over(StubIdentity::absent());
    let absent = snapshot(SessionStatus::Absent, None);

    for _ in 0..3 {
        let decision = guard.dispatch_for("/account", RouteRequirement::auth(), &absent);
        assert!(matches!(decision, GuardDecision::Redirect(_)));
    }
    assert_eq!(navigator.targets(), vec!["/login?redirect=%2Faccount".to_string()]);
}

#[tokio::test]
async fn path_change_re_enables_dispatch() {
    let (guard, navigator) = guard_over(StubIdentity::absent());
    let absent = snapshot(SessionStatus::Absent, None);

    guard.dispatch_for("/account", RouteRequirement::auth(), &absent);
    guard.dispatch_for("/orders", RouteRequirement::auth(), &absent);
    assert_eq!(navigator.targets().len(), 2);
}

#[tokio::test]
async fn mount_time_dispatch_redirects_resolved_non_admin() {
    let (guard, navigator) = guard_over(StubIdentity::resolved(Role::User));
    guard.cache.get_session();
    let mut rx = guard.cache.subscribe();
    timeout(Duration::from_secs(1), async {
        while !rx.borrow_and_update().is_terminal() {
            rx.changed().await.expect("cache dropped");
        }
    })
    .await
    .expect("cache did not settle");

    let decision = guard.evaluate_and_dispatch("/admin/dashboard", RouteRequirement::admin());
    assert_eq!(decision, GuardDecision::Redirect("/".to_string()));
    assert_eq!(navigator.targets(), vec!["/".to_string()]);
}

#[tokio::test]
async fn reevaluation_never_restarts_the_lookup() {
    // The settled-absent notification redirects once and then goes quiet:
    // re-evaluation decides over notified snapshots, so the guard does not
    // feed the cache a fresh lookup per notification.
    let stub = StubIdentity::absent();
    let (guard, navigator) = guard_over(stub.clone());

    let _handle = guard.watch("/account".to_string(), RouteRequirement::auth());
    sleep(Duration::from_millis(50)).await;

    assert_eq!(navigator.targets().len(), 1);
    assert_eq!(stub.lookup_count(), 1);
}

#[tokio::test]
async fn watch_dispatches_once_across_cache_churn() {
    let (stub, gate) = StubIdentity::held(Role::User);
    let (guard, navigator) = guard_over(stub.clone());
    stub.set_user(None);

    let _handle = guard.watch("/account".to_string(), RouteRequirement::auth());
    sleep(Duration::from_millis(20)).await;
    assert!(navigator.targets().is_empty(), "no dispatch before the cache settles");

    gate.add_permits(1);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(navigator.targets().len(), 1);

    // More churn on the same path: the invalidation notification re-runs
    // the decision but the navigation already dispatched. Still one.
    guard.cache.invalidate();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(navigator.targets().len(), 1);
}

#[tokio::test]
async fn dropped_guard_never_dispatches() {
    let (stub, gate) = StubIdentity::held(Role::User);
    let (guard, navigator) = guard_over(stub.clone());
    stub.set_user(None);

    let handle = guard.watch("/account".to_string(), RouteRequirement::auth());
    sleep(Duration::from_millis(20)).await;
    drop(handle);

    gate.add_permits(1);
    sleep(Duration::from_millis(50)).await;
    assert!(navigator.targets().is_empty());
}

// =============================================================================
// DRIVER: RESOLVE
// =============================================================================

#[tokio::test]
async fn resolve_passes_authenticated_user() {
    let (guard, _) = guard_over(StubIdentity::resolved(Role::User));
    let decision = timeout(
        Duration::from_secs(1),
        guard.resolve("/account", RouteRequirement::auth()),
    )
    .await
    .expect("resolve timed out");
    assert_eq!(decision, GuardDecision::Pass);
}

#[tokio::test]
async fn resolve_redirects_user_off_admin_route() {
    // Scenario B, client layer: edge passed the token through, the session
    // resolves with role USER, the guard sends them home.
    let (guard, _) = guard_over(StubIdentity::resolved(Role::User));
    let decision = timeout(
        Duration::from_secs(1),
        guard.resolve("/admin/dashboard", RouteRequirement::admin()),
    )
    .await
    .expect("resolve timed out");
    assert_eq!(decision, GuardDecision::Redirect("/".to_string()));
}

#[tokio::test]
async fn resolve_waits_for_held_lookup() {
    let (stub, gate) = StubIdentity::held(Role::User);
    let (guard, _) = guard_over(stub);

    let release = tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        gate.add_permits(1);
    });

    let decision = timeout(
        Duration::from_secs(1),
        guard.resolve("/account", RouteRequirement::auth()),
    )
    .await
    .expect("resolve timed out");
    assert_eq!(decision, GuardDecision::Pass);
    release.await.expect("release task");
}
