use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use sha2::{Digest, Sha512};

use super::{SessionState, SessionStore};
use crate::error::Error;
use crate::types::SessionId;

/// Session cookie attributes.
///
/// `http_only` is unconditional. `secure` tracks the environment
/// classification; `SameSite` is `Strict` when secure and `Lax` otherwise
/// so that local HTTP development keeps working.
#[derive(Clone)]
pub struct CookieSettings {
    pub name: String,
    pub ttl: Duration,
    pub secure: bool,
}

impl CookieSettings {
    fn same_site(&self) -> SameSite {
        if self.secure { SameSite::Strict } else { SameSite::Lax }
    }
}

/// Binds browser cookies to server-side session state.
///
/// The cookie carries only an opaque session id inside an encrypted jar.
/// Multiple signing secrets are supported for rotation: reads try each key
/// newest-first, writes always use the newest. Expiry is sliding: the
/// store TTL is refreshed on every load and the cookie re-issued on every
/// response.
pub struct SessionManager<S> {
    store: Arc<S>,
    keys: Vec<Key>,
    settings: CookieSettings,
}

impl<S: SessionStore> SessionManager<S> {
    /// Create a manager from secret material (newest secret first).
    #[must_use]
    pub fn new(store: S, secrets: &[String], settings: CookieSettings) -> Self {
        let keys = secrets.iter().map(|s| derive_key(s)).collect();
        Self {
            store: Arc::new(store),
            keys,
            settings,
        }
    }

    /// Access the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Session id from the request cookie, if one decrypts with any
    /// configured key.
    #[must_use]
    pub fn session_id(&self, headers: &HeaderMap) -> Option<SessionId> {
        self.keys.iter().find_map(|key| {
            PrivateCookieJar::from_headers(headers, key.clone())
                .get(&self.settings.name)
                .map(|cookie| SessionId(cookie.value().to_owned()))
        })
    }

    /// Load the session for a request, refreshing its TTL, or start a fresh
    /// anonymous one.
    pub async fn load_or_create(&self, headers: &HeaderMap) -> (SessionId, SessionState) {
        if let Some(id) = self.session_id(headers) {
            match self.store.load(&id).await {
                Ok(Some(state)) => {
                    if let Err(err) = self.store.touch(&id, self.settings.ttl).await {
                        tracing::warn!(error = %err, "Session touch failed");
                    }
                    return (id, state);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "Session load failed"),
            }
        }
        (SessionId::generate(), SessionState::default())
    }

    /// Persist session state under the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the backing store rejects the write.
    pub async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), Error> {
        self.store.save(id, state, self.settings.ttl).await
    }

    /// Remove the session server-side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the backing store rejects the delete.
    pub async fn destroy(&self, id: &SessionId) -> Result<(), Error> {
        self.store.destroy(id).await
    }

    /// A cookie jar carrying the (re-issued, rolling) session cookie.
    #[must_use]
    pub fn issue_cookie(&self, id: &SessionId) -> PrivateCookieJar {
        let jar = self.jar();
        jar.add(self.session_cookie(id))
    }

    /// A cookie jar that removes the session cookie.
    #[must_use]
    pub fn clear_cookie(&self) -> PrivateCookieJar {
        let removal = Cookie::build((self.settings.name.clone(), ""))
            .path("/")
            .max_age(time::Duration::ZERO)
            .build();
        self.jar().add(removal)
    }

    fn jar(&self) -> PrivateCookieJar {
        let key = self.keys.first().cloned().unwrap_or_else(Key::generate);
        PrivateCookieJar::from_headers(&HeaderMap::new(), key)
    }

    fn session_cookie(&self, id: &SessionId) -> Cookie<'static> {
        let max_age = time::Duration::seconds(
            i64::try_from(self.settings.ttl.as_secs()).unwrap_or(i64::MAX),
        );
        Cookie::build((self.settings.name.clone(), id.as_str().to_owned()))
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(self.settings.same_site())
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// Stretch arbitrary-length secret material into the 64 bytes a cookie key
/// requires. Deterministic, so every replica derives the same key from the
/// shared secret.
fn derive_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}
