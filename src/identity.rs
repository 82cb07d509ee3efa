//! Identity service client — session lookup and sign-out.
//!
//! The gate does not issue or validate credentials itself; it consumes the
//! identity service's view of the current session. The client sits behind a
//! trait so the session cache can be driven by mocks in tests.

use async_trait::async_trait;
use serde::Deserialize;

use crate::session::Role;

/// Resolved identity as returned by `GET /session`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub role: Role,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    user: Option<SessionUser>,
}

/// Failure modes of the identity service. None of these reach the route
/// guard: the session cache absorbs every variant into an absent session.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("session lookup request failed: {0}")]
    Request(String),
    #[error("identity service returned status {0}")]
    Status(u16),
    #[error("malformed session response: {0}")]
    Decode(String),
}

/// Client for the identity service consumed by the session cache.
#[async_trait]
pub trait IdentityClient: Send + Sync + 'static {
    /// `GET /session` — `Ok(None)` means no valid session.
    async fn fetch_session(&self) -> Result<Option<SessionUser>, IdentityError>;

    /// `POST /sign-out` — invalidates the credential server-side.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// HTTP implementation over `reqwest`.
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn fetch_session(&self) -> Result<Option<SessionUser>, IdentityError> {
        let resp = self
            .client
            .get(format!("{}/session", self.base_url))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(IdentityError::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        parse_session_body(&body)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let resp = self
            .client
            .post(format!("{}/sign-out", self.base_url))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(IdentityError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Parse the `{"user": {...}} | null` lookup body.
fn parse_session_body(body: &str) -> Result<Option<SessionUser>, IdentityError> {
    let envelope: Option<SessionEnvelope> =
        serde_json::from_str(body).map_err(|e| IdentityError::Decode(e.to_string()))?;
    Ok(envelope.and_then(|e| e.user))
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
