//! Gate configuration loaded from environment.

use std::time::Duration;

use crate::classify;
use crate::session::Role;

const DEFAULT_IDENTITY_BASE_URL: &str = "http://localhost:4000";
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;

/// Cookie holding the opaque credential token. Only its presence is
/// inspected at the edge; contents are validated by the identity service.
pub const SESSION_COOKIE: &str = "session_token";

/// Redirect targets and identity-service settings shared by both layers.
///
/// Route classification itself is deliberately not configurable — see
/// [`crate::classify`] — so the edge and client evaluators cannot diverge.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Landing page for regular users (and for admins denied elsewhere).
    pub home_path: String,
    /// Landing page for admins arriving from an auth page.
    pub admin_home_path: String,
    /// Name of the credential cookie checked at the edge.
    pub cookie_name: String,
    /// Base URL of the identity service (`GET /session`, `POST /sign-out`).
    pub identity_base_url: String,
    /// Upper bound on a single session lookup before it resolves absent.
    pub identity_timeout: Duration,
}

impl GateConfig {
    /// Load from `IDENTITY_BASE_URL` and `IDENTITY_TIMEOUT_SECS`, falling
    /// back to local-development defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let timeout_secs = env_parse("IDENTITY_TIMEOUT_SECS", DEFAULT_IDENTITY_TIMEOUT_SECS);
        Self {
            identity_base_url: std::env::var("IDENTITY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_BASE_URL.to_string()),
            identity_timeout: Duration::from_secs(timeout_secs),
            ..Self::default()
        }
    }

    /// Login URL carrying the original destination in the `redirect` query
    /// parameter, so the user returns there after signing in.
    #[must_use]
    pub fn login_redirect(&self, path: &str) -> String {
        format!("{}?redirect={}", classify::LOGIN_PATH, urlencoding::encode(path))
    }

    /// Landing page for a resolved role.
    #[must_use]
    pub fn landing_for(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_home_path,
            Role::User => &self.home_path,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            home_path: "/".to_string(),
            admin_home_path: "/admin/dashboard".to_string(),
            cookie_name: SESSION_COOKIE.to_string(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            identity_timeout: Duration::from_secs(DEFAULT_IDENTITY_TIMEOUT_SECS),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
