/// Classified errors for the citizen UI core.
///
/// Domain failures are classified as close to the source as possible;
/// transport errors are wrapped into the nearest domain variant so the
/// HTTP layer only ever sees classified errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Failure before redirecting to the identity provider.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Failure during the OAuth2 callback: code exchange, missing or
    /// malformed ID token, or userinfo fetch.
    #[error("callback error: {0}")]
    Callback(String),

    /// Session store operation failed.
    #[error("session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider discovery or another provider-side HTTP failure.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// Template registration or rendering failure.
    #[error("template error: {0}")]
    Template(String),
}

impl Error {
    /// Classify an error as a callback failure without double-wrapping:
    /// an error that is already `Callback` keeps its original message.
    #[must_use]
    pub fn into_callback(self, context: &str) -> Self {
        match self {
            Self::Callback(_) => self,
            other => Self::Callback(format!("{context}: {other}")),
        }
    }

    /// Classify a pre-redirect login failure, keeping an existing
    /// `Authentication` message intact.
    #[must_use]
    pub fn into_authentication(self, context: &str) -> Self {
        match self {
            Self::Authentication(_) => self,
            other => Self::Authentication(format!("{context}: {other}")),
        }
    }
}
