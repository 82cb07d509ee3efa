//! Edge interceptor — the fast, partial-information authorization layer.
//!
//! DESIGN
//! ======
//! Runs on every page navigation before any content is produced. It sees
//! only coarse request metadata — is the credential cookie present, where
//! did the user come from — and never the resolved session, so it can only
//! choose between rendering, redirecting to login, and passing through for
//! the route guard to decide with full information. The decision itself is
//! a pure function (`intercept`) wrapped by a thin Axum middleware.
//!
//! TRADE-OFFS
//! ==========
//! A request arriving from the login page, or carrying the one-shot
//! `_recent_login` marker, passes through even without a visible cookie:
//! cookie propagation can lag credential issuance by one navigation. This
//! trust window grants rendering a shell, never data — the route guard
//! still fails closed when the session lookup comes back empty.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::classify::{self, RouteClass};
use crate::config::GateConfig;
use crate::state::AppState;

/// One-shot query marker set right after sign-in, consumed here.
pub const RECENT_LOGIN_PARAM: &str = "_recent_login";

/// Coarse view of a navigation request, the only inputs the edge may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest<'a> {
    pub path: &'a str,
    /// The credential cookie is present and non-empty. Contents are never
    /// inspected here.
    pub has_credential_token: bool,
    pub referer_is_login_page: bool,
    pub recent_login_flag: bool,
}

/// Outcome of the edge decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Render normally.
    Pass,
    /// Render normally, with the one-shot marker removed from the URL.
    PassStripMarker,
    /// Send the user to login before rendering anything.
    Redirect(String),
}

/// The edge decision table. Never fails: ambiguous input has already been
/// normalized to `has_credential_token = false` by the header helpers.
#[must_use]
pub fn intercept(request: &EdgeRequest, config: &GateConfig) -> EdgeDecision {
    // Static assets and internal endpoints are never evaluated.
    if classify::is_exempt(request.path) {
        return EdgeDecision::Pass;
    }

    let class = classify::classify(request.path);
    let protected = matches!(class, RouteClass::AuthRequired | RouteClass::AdminRequired);

    if !protected || request.has_credential_token {
        // Role verification is deferred to the route guard; the edge cannot
        // cheaply resolve a role from an opaque token.
        return pass(request);
    }

    if request.referer_is_login_page || request.recent_login_flag {
        // Bounded trust window for cookie propagation delay. One provisional
        // pass; the route guard fails closed if no session materializes.
        return pass(request);
    }

    EdgeDecision::Redirect(config.login_redirect(request.path))
}

fn pass(request: &EdgeRequest) -> EdgeDecision {
    if request.recent_login_flag {
        EdgeDecision::PassStripMarker
    } else {
        EdgeDecision::Pass
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Axum adapter: extract the coarse inputs, decide, act.
pub async fn edge_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let edge = EdgeRequest {
        path: &path,
        has_credential_token: credential_present(request.headers(), &state.config.cookie_name),
        referer_is_login_page: referer_is_login(request.headers()),
        recent_login_flag: has_recent_login(request.uri().query()),
    };

    match intercept(&edge, &state.config) {
        EdgeDecision::Pass => next.run(request).await,
        EdgeDecision::PassStripMarker => {
            // The marker must not survive this navigation or end up in a
            // bookmark: downstream rendering only ever sees the cleaned URI.
            let request = strip_marker_from_request(request);
            next.run(request).await
        }
        EdgeDecision::Redirect(target) => {
            tracing::debug!(%path, %target, "edge redirect");
            Redirect::temporary(&target).into_response()
        }
    }
}

/// Whether the credential cookie is present with a non-empty value. Any
/// malformed cookie header parses to "absent" — the edge never throws.
fn credential_present(headers: &HeaderMap, cookie_name: &str) -> bool {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| !cookie.value().trim().is_empty())
        .unwrap_or(false)
}

/// Whether the request came from an auth page (login or signup).
fn referer_is_login(headers: &HeaderMap) -> bool {
    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<Uri>().ok())
        .map(|uri| classify::is_auth_page(uri.path()))
        .unwrap_or(false)
}

/// Whether the query string carries the one-shot marker.
fn has_recent_login(query: Option<&str>) -> bool {
    query.unwrap_or("").split('&').any(is_marker_pair)
}

/// Whether one `key` or `key=value` pair is the marker. Shared by detection
/// and stripping so the two can never disagree on what the marker looks like.
fn is_marker_pair(pair: &str) -> bool {
    match pair.strip_prefix(RECENT_LOGIN_PARAM) {
        Some(rest) => rest.is_empty() || rest.starts_with('='),
        None => false,
    }
}

fn strip_marker_from_request(request: Request) -> Request {
    let cleaned = strip_recent_login(request.uri());
    let (mut parts, body) = request.into_parts();
    parts.uri = cleaned;
    Request::from_parts(parts, body)
}

/// Rebuild the URI without the `_recent_login` parameter. Falls back to the
/// original on any rebuild failure rather than erroring.
fn strip_recent_login(uri: &Uri) -> Uri {
    let retained: Vec<&str> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_marker_pair(pair))
        .collect();

    let rebuilt = if retained.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), retained.join("&"))
    };
    rebuilt.parse().unwrap_or_else(|_| uri.clone())
}

#[cfg(test)]
#[path = "edge_test.rs"]
mod tests;
