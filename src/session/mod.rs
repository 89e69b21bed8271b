//! Session binding: maps the session cookie to server-side state.
//!
//! The backing store is selected by feature flag: in-memory for local
//! development, a shared Redis instance in environments with more than one
//! serving replica. Session state is an exhaustive union so that illegal
//! combinations (an authenticated session with a dangling PKCE verifier)
//! are unrepresentable.

mod manager;
mod memory;
mod redis;

pub use manager::{CookieSettings, SessionManager};
pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::oidc::UserInfo;
use crate::types::{SessionId, Subject};

/// Authenticated user state held in the session after a successful
/// callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub subject: Subject,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub access_token: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl AuthSession {
    /// Combine provider user info with the token response.
    #[must_use]
    pub fn from_user_info(
        user_info: UserInfo,
        access_token: String,
        id_token: String,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            subject: user_info.sub,
            uid: user_info.uid,
            email: user_info.email,
            given_name: user_info.given_name,
            family_name: user_info.family_name,
            roles: user_info.roles,
            access_token,
            id_token,
            refresh_token,
        }
    }
}

/// The full session state machine.
///
/// `code_verifier`/`nonce` exist only while a login is in progress; the
/// transition to `Authenticated` (or back to `Anonymous` on failure) drops
/// them, so they cannot outlive the callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Anonymous,
    InProgress {
        code_verifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nonce: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_to: Option<String>,
    },
    Authenticated(AuthSession),
}

impl SessionState {
    /// The authenticated user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&AuthSession> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Whether this session may view protected pages. An empty subject
    /// never counts as authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some_and(|u| !u.subject.is_empty())
    }
}

/// Server-side session persistence, keyed by opaque session id.
///
/// Implemented by [`MemoryStore`] and [`RedisStore`]; tests provide their
/// own implementations to exercise failure paths.
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a session. `None` when absent or expired.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionState>, Error>> + Send;

    /// Write a session with the given TTL, replacing any previous value.
    fn save(
        &self,
        id: &SessionId,
        state: &SessionState,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Remove a session.
    fn destroy(&self, id: &SessionId) -> impl Future<Output = Result<(), Error>> + Send;

    /// Refresh the TTL of an existing session (sliding expiry).
    fn touch(&self, id: &SessionId, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Parse session-secret material.
///
/// A JSON array of strings supports rotation (newest first); anything else,
/// including malformed JSON, is treated as a single raw secret. Never
/// fails.
#[must_use]
pub fn parse_session_secret(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return vec![raw.to_owned()];
    }
    match serde_json::from_str::<Vec<String>>(trimmed) {
        Ok(secrets) if !secrets.is_empty() => secrets,
        _ => vec![raw.to_owned()],
    }
}
