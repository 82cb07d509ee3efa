//! Route classification table shared by the edge and client layers.
//!
//! DESIGN
//! ======
//! Both authorization layers — the edge middleware that runs before any page
//! handler and the route guard that runs after the session lookup — must
//! classify a path identically. This module is the single source of truth:
//! a static prefix table and pure functions over it, no configuration and no
//! I/O, so the two evaluators cannot drift.

/// Authorization class of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    /// Anyone may view the route, session or not.
    Public,
    /// Any authenticated user may view the route.
    AuthRequired,
    /// Only users with the admin role may view the route.
    AdminRequired,
}

/// Path of the login page. Redirect targets for unauthenticated users are
/// built from this, and the edge layer uses it for the referer check.
pub const LOGIN_PATH: &str = "/login";

/// Path of the signup page.
pub const SIGNUP_PATH: &str = "/signup";

/// Prefixes requiring any authenticated session.
const AUTH_PREFIXES: &[&str] = &["/account", "/orders", "/checkout"];

/// Prefixes requiring the admin role.
const ADMIN_PREFIXES: &[&str] = &["/admin"];

/// Prefixes never evaluated by either layer: static assets and internal
/// endpoints that carry no page content.
const EXEMPT_PREFIXES: &[&str] = &["/pkg", "/assets", "/api"];

/// Exact paths never evaluated by either layer.
const EXEMPT_PATHS: &[&str] = &["/favicon.ico", "/robots.txt", "/healthz"];

/// Classify a request path. Pure function of the static table above.
#[must_use]
pub fn classify(path: &str) -> RouteClass {
    if ADMIN_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return RouteClass::AdminRequired;
    }
    if AUTH_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return RouteClass::AuthRequired;
    }
    RouteClass::Public
}

/// Whether the path is excluded from authorization evaluation entirely.
#[must_use]
pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path) || EXEMPT_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

/// Whether the path is one of the authentication pages (login/signup).
/// A resolved session on these pages redirects to the role landing page.
#[must_use]
pub fn is_auth_page(path: &str) -> bool {
    matches_prefix(path, LOGIN_PATH) || matches_prefix(path, SIGNUP_PATH)
}

/// Prefix match on whole path segments: `/account` matches `/account` and
/// `/account/settings` but not `/accounts`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
