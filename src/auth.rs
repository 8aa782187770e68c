use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// An authenticated session as reported by the auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// The bearer token to attach to outbound requests.
    pub access_token: String,
    /// The timestamp when the token expires, if the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Returns `true` if the session carries a usable token at `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

/// The injected auth-session collaborator.
///
/// Backed by the hosted auth service in production; the secure client asks
/// it for the current session before attaching an `Authorization` header.
/// Failures here are recovered locally: the request proceeds
/// unauthenticated rather than failing.
pub trait AuthProvider: Send + Sync {
    /// Returns the current authenticated session, or `None` when signed out.
    fn current_session(&self) -> BoxFuture<'_, anyhow::Result<Option<AuthSession>>>;
}
