use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::oidc::OidcConfig;
use crate::session::parse_session_secret;

const DEFAULT_MOCK_ISSUER: &str = "http://localhost:3100/mock-idam";

/// Application configuration.
///
/// Use [`from_env()`](AppConfig::from_env) for convention-based setup, or
/// [`new()`](AppConfig::new) with `with_*` methods for full control (tests
/// construct configs this way).
#[derive(Clone)]
pub struct AppConfig {
    pub(crate) oidc: OidcConfig,
    pub(crate) session_secrets: Vec<String>,
    pub(crate) cookie_name: String,
    pub(crate) session_ttl: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) redis_enabled: bool,
    pub(crate) redis_url: Option<String>,
    pub(crate) key_prefix: String,
    pub(crate) use_mock_idam: bool,
}

impl AppConfig {
    /// Create config with the required provider settings.
    ///
    /// All optional fields use sensible defaults. Override with `with_*`
    /// methods.
    #[must_use]
    pub fn new(oidc: OidcConfig, session_secret: &str) -> Self {
        Self {
            oidc,
            session_secrets: parse_session_secret(session_secret),
            cookie_name: "finrem-citizen-ui".into(),
            session_ttl: Duration::from_secs(1800),
            secure_cookies: true,
            redis_enabled: false,
            redis_url: None,
            key_prefix: "finrem-citizen-ui".into(),
            use_mock_idam: false,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `IDAM_ISSUER_URL`: provider issuer (optional with `FEATURE_MOCK_IDAM`)
    /// - `IDAM_CLIENT_ID`: OAuth2 client ID (optional with `FEATURE_MOCK_IDAM`)
    /// - `IDAM_CLIENT_SECRET`: OAuth2 client secret (optional with `FEATURE_MOCK_IDAM`)
    /// - `SESSION_SECRET`: cookie secret, a string or a JSON array of
    ///   strings for rotation (optional with `FEATURE_MOCK_IDAM`)
    ///
    /// # Optional env vars
    /// - `IDAM_CALLBACK_URL`: absolute URL or path (default `/oauth2/callback`)
    /// - `IDAM_SCOPE`: OAuth2 scope (default `openid profile roles`)
    /// - `SESSION_COOKIE_NAME`, `SESSION_TTL_SECONDS`, `SESSION_KEY_PREFIX`
    /// - `FEATURE_REDIS` + `REDIS_CONNECTION_STRING`: shared session store
    /// - `FEATURE_MOCK_IDAM`: mount the mock provider and relax required vars
    /// - `APP_ENV`: `production` enables secure cookies
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or URLs are
    /// invalid.
    pub fn from_env() -> Result<Self, Error> {
        let use_mock_idam = feature_enabled("FEATURE_MOCK_IDAM");

        let issuer_str = match std::env::var("IDAM_ISSUER_URL") {
            Ok(v) => v,
            Err(_) if use_mock_idam => DEFAULT_MOCK_ISSUER.into(),
            Err(_) => return Err(Error::Config("IDAM_ISSUER_URL is required".into())),
        };
        let issuer: Url = issuer_str
            .parse()
            .map_err(|e| Error::Config(format!("IDAM_ISSUER_URL: {e}")))?;

        let client_id = required_or_mock_default(
            "IDAM_CLIENT_ID",
            use_mock_idam,
            "finrem-citizen-ui",
        )?;
        let client_secret = required_or_mock_default(
            "IDAM_CLIENT_SECRET",
            use_mock_idam,
            "mock-idam-secret",
        )?;

        let mut oidc = OidcConfig::new(issuer, client_id, client_secret);
        if let Ok(callback) = std::env::var("IDAM_CALLBACK_URL") {
            oidc = oidc.with_callback_url(callback);
        }
        if let Ok(scope) = std::env::var("IDAM_SCOPE") {
            oidc = oidc.with_scope(scope);
        }

        let session_secret =
            required_or_mock_default("SESSION_SECRET", use_mock_idam, "finrem-dev-secret")?;

        let mut config = Self::new(oidc, &session_secret)
            .with_secure_cookies(std::env::var("APP_ENV").as_deref() == Ok("production"))
            .with_mock_idam(use_mock_idam);

        if let Ok(name) = std::env::var("SESSION_COOKIE_NAME") {
            config = config.with_cookie_name(name);
        }
        if let Ok(ttl) = std::env::var("SESSION_TTL_SECONDS") {
            let seconds: u64 = ttl
                .parse()
                .map_err(|e| Error::Config(format!("SESSION_TTL_SECONDS: {e}")))?;
            config = config.with_session_ttl(Duration::from_secs(seconds));
        }
        if let Ok(prefix) = std::env::var("SESSION_KEY_PREFIX") {
            config = config.with_key_prefix(prefix);
        }
        if feature_enabled("FEATURE_REDIS") {
            let url = std::env::var("REDIS_CONNECTION_STRING")
                .map_err(|_| Error::Config("REDIS_CONNECTION_STRING is required".into()))?;
            config = config.with_redis(url);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_redis(mut self, url: impl Into<String>) -> Self {
        self.redis_enabled = true;
        self.redis_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_mock_idam(mut self, enabled: bool) -> Self {
        self.use_mock_idam = enabled;
        self
    }

    /// Whether the shared Redis store is enabled.
    #[must_use]
    pub fn redis_enabled(&self) -> bool {
        self.redis_enabled
    }

    /// Redis connection string, when the shared store is enabled.
    #[must_use]
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref()
    }

    /// Whether the mock provider should be mounted.
    #[must_use]
    pub fn use_mock_idam(&self) -> bool {
        self.use_mock_idam
    }

    /// Provider configuration.
    #[must_use]
    pub fn oidc(&self) -> &OidcConfig {
        &self.oidc
    }

    /// Session key namespace prefix for the shared store.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

fn feature_enabled(var: &str) -> bool {
    matches!(std::env::var(var).as_deref(), Ok("1") | Ok("true"))
}

fn required_or_mock_default(
    var: &str,
    use_mock_idam: bool,
    default: &str,
) -> Result<String, Error> {
    match std::env::var(var) {
        Ok(v) => Ok(v),
        Err(_) if use_mock_idam => Ok(default.into()),
        Err(_) => Err(Error::Config(format!("{var} is required"))),
    }
}
