//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the gate configuration and the two stateful collaborators: the
//! session cache (the only cross-request mutable state besides the redirect
//! mark) and the redirect coordinator. The edge middleware reads only the
//! config; page handlers drive the route guard.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::identity::IdentityClient;
use crate::redirect::RedirectCoordinator;
use crate::session::SessionCache;

/// Shared application state, cloned into every handler. All inner fields
/// are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub cache: SessionCache,
    pub coordinator: RedirectCoordinator,
}

impl AppState {
    #[must_use]
    pub fn new(config: GateConfig, identity: Arc<dyn IdentityClient>) -> Self {
        let lookup_timeout = config.identity_timeout;
        Self {
            config: Arc::new(config),
            cache: SessionCache::new(identity, lookup_timeout),
            coordinator: RedirectCoordinator::new(),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
