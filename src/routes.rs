//! Router assembly and page shells.
//!
//! SYSTEM CONTEXT
//! ==============
//! The edge middleware wraps every page route; each page handler then drives
//! the route guard for the authoritative decision once the session lookup
//! settles. Page content itself is out of scope for the gate — handlers
//! render placeholder shells so the two layers have something to protect.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::middleware;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::classify;
use crate::edge;
use crate::guard::{GuardDecision, Navigator, RouteGuard, RouteRequirement};
use crate::state::AppState;

/// Build the application router with the edge layer in front of every page.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/signup", get(signup))
        .route("/account", get(account))
        .route("/orders", get(orders))
        .route("/checkout", get(checkout))
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/sign-out", post(sign_out))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn_with_state(state.clone(), edge::edge_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// PAGE HANDLERS
// =============================================================================

/// In server-rendered pages the HTTP response itself carries the
/// navigation, so the guard's navigator has nothing extra to do.
struct ShellNavigator;

impl Navigator for ShellNavigator {
    fn navigate(&self, _target: &str) {}
}

fn page_guard(state: &AppState) -> RouteGuard {
    RouteGuard::new(
        state.cache.clone(),
        state.coordinator.clone(),
        state.config.clone(),
        Arc::new(ShellNavigator),
    )
}

/// Run the guard for the requested page and map its decision onto HTTP.
async fn render(state: &AppState, uri: &Uri, title: &str) -> Response {
    let path = uri.path();
    let requirement = RouteRequirement::from_class(classify::classify(path));
    match page_guard(state).resolve(path, requirement).await {
        GuardDecision::Pass => Html(shell(title, uri)).into_response(),
        GuardDecision::AwaitSession => Html(shell("Loading", uri)).into_response(),
        GuardDecision::Redirect(target) => Redirect::temporary(&target).into_response(),
    }
}

fn shell(title: &str, uri: &Uri) -> String {
    format!(
        "<!doctype html>\n<html><head><title>{title}</title>\
         <link rel=\"canonical\" href=\"{uri}\"></head>\
         <body><main>{title}</main></body></html>"
    )
}

async fn home(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Home").await
}

async fn login(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Sign in").await
}

async fn signup(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Create account").await
}

async fn account(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Your account").await
}

async fn orders(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Your orders").await
}

async fn checkout(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Checkout").await
}

async fn admin_dashboard(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, &uri, "Admin dashboard").await
}

/// `POST /sign-out` — invalidate at the identity service, drop the cached
/// session, land on home.
async fn sign_out(State(state): State<AppState>) -> Redirect {
    state.cache.sign_out().await;
    Redirect::to("/")
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
