use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identity-provider subject (OAuth `sub` claim).
///
/// Opaque to this service: IDAM issues it and the session stores it as the
/// sole link to the provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Subject(pub String);

impl Subject {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Server-side session identifier carried in the session cookie.
///
/// Generated as a ULID; opaque to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
