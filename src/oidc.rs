use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use crate::error::Error;
use crate::token;
use crate::types::Subject;

/// Identity-provider configuration.
///
/// Required fields are constructor parameters — no runtime "missing field"
/// errors.
///
/// ```rust,ignore
/// use finrem_citizen_ui::oidc::OidcConfig;
///
/// let config = OidcConfig::new(
///     "https://idam.example.com/o".parse()?,
///     "finrem-citizen-ui",
///     "secret",
/// );
/// // Optional overrides via chaining:
/// let config = config.with_scope("openid profile roles");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) issuer: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) callback_url: String,
    pub(crate) scope: String,
}

impl OidcConfig {
    /// Create a new provider configuration.
    #[must_use]
    pub fn new(issuer: Url, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            issuer,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: "/oauth2/callback".into(),
            scope: "openid profile roles".into(),
        }
    }

    /// Override the callback URL. May be absolute, or a path to be resolved
    /// against the incoming request's host.
    #[must_use]
    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = url.into();
        self
    }

    /// Override the requested scope (default: `openid profile roles`).
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Provider issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Configured callback URL (absolute or path-only).
    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Requested OAuth2 scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Provider metadata from the OIDC discovery document.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ProviderMetadata {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    #[serde(default)]
    pub end_session_endpoint: Option<Url>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Whether the provider advertises S256 PKCE support.
    #[must_use]
    pub fn supports_pkce(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == "S256")
    }
}

/// Token response from the provider token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// User info from the provider userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfo {
    pub sub: Subject,
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
}

impl UserInfo {
    /// Create a new `UserInfo` with only the required `sub` field.
    #[must_use]
    pub fn new(sub: Subject) -> Self {
        Self {
            sub,
            uid: None,
            email: None,
            given_name: None,
            family_name: None,
            roles: Vec::new(),
        }
    }

    /// Set the provider user id.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the given and family names.
    #[must_use]
    pub fn with_name(mut self, given: impl Into<String>, family: impl Into<String>) -> Self {
        self.given_name = Some(given.into());
        self.family_name = Some(family.into());
        self
    }

    /// Set the roles.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }
}

/// Parameters for building an authorization redirect.
#[non_exhaustive]
pub struct AuthorizationParams {
    pub redirect_uri: String,
    pub code_challenge: String,
    pub nonce: Option<String>,
}

/// OIDC relying-party client for the IDAM provider.
///
/// Provider metadata is discovered lazily on first use and cached for the
/// process lifetime; concurrent first callers share a single discovery
/// request.
pub struct OidcClient {
    config: OidcConfig,
    http: reqwest::Client,
    metadata: OnceCell<ProviderMetadata>,
}

impl OidcClient {
    /// Outbound calls to the provider get a bounded timeout rather than the
    /// client default.
    const PROVIDER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    /// Create a new client. Discovery happens on first use.
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Self::PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http,
            metadata: OnceCell::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Whether discovery has already completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.metadata.initialized()
    }

    /// Provider metadata already discovered, if any. Does not trigger setup.
    #[must_use]
    pub fn cached_metadata(&self) -> Option<&ProviderMetadata> {
        self.metadata.get()
    }

    /// Provider metadata, running discovery if not yet cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if the discovery document cannot be
    /// fetched or parsed.
    pub async fn metadata(&self) -> Result<&ProviderMetadata, Error> {
        self.metadata.get_or_try_init(|| self.discover()).await
    }

    async fn discover(&self) -> Result<ProviderMetadata, Error> {
        let url = discovery_url(&self.config.issuer);
        tracing::info!(issuer = %self.config.issuer, "Setting up OIDC client");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("discovery request failed: {e}")))?;
        let response = Self::ensure_success(response, "discovery").await?;
        let metadata = response
            .json::<ProviderMetadata>()
            .await
            .map_err(|e| Error::Provider(format!("invalid discovery document: {e}")))?;

        tracing::info!("OIDC client configured successfully");
        Ok(metadata)
    }

    /// Build the authorization redirect URL.
    #[must_use]
    pub fn authorization_url(&self, metadata: &ProviderMetadata, params: &AuthorizationParams) -> Url {
        let mut url = metadata.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &params.redirect_uri)
                .append_pair("scope", &self.config.scope)
                .append_pair("code_challenge", &params.code_challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(nonce) = &params.nonce {
                query.append_pair("nonce", nonce);
            }
        }
        url
    }

    /// Exchange an authorization code for tokens (client_secret_post, with
    /// the PKCE verifier when one was issued).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] on transport failure or a non-success
    /// response from the token endpoint.
    pub async fn exchange_code(
        &self,
        metadata: &ProviderMetadata,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, Error> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(metadata.token_endpoint.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("token exchange failed: {e}")))?;

        let response = Self::ensure_success(response, "token exchange").await?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::Provider(format!("invalid token response: {e}")))
    }

    /// Fetch user info with an access token and check it against the
    /// expected subject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] on transport failure, or
    /// [`Error::Callback`] if the userinfo subject does not match the ID
    /// token's.
    pub async fn fetch_user_info(
        &self,
        metadata: &ProviderMetadata,
        access_token: &str,
        expected_sub: &Subject,
    ) -> Result<UserInfo, Error> {
        let response = self
            .http
            .get(metadata.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("userinfo request failed: {e}")))?;

        let response = Self::ensure_success(response, "userinfo request").await?;
        let user_info = response
            .json::<UserInfo>()
            .await
            .map_err(|e| Error::Provider(format!("invalid userinfo response: {e}")))?;

        if &user_info.sub != expected_sub {
            return Err(Error::Callback("userinfo subject mismatch".into()));
        }
        Ok(user_info)
    }

    /// Validate the nonce claim of an ID token against the expected value
    /// stored at login time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Callback`] if the token is malformed or the nonce
    /// does not match.
    pub fn validate_nonce(id_token: &str, expected: &str) -> Result<(), Error> {
        match token::nonce_from_id_token(id_token)? {
            Some(nonce) if nonce == expected => Ok(()),
            _ => Err(Error::Callback("ID token nonce mismatch".into())),
        }
    }

    /// Build the provider end-session URL for logout.
    ///
    /// Returns `None` if the provider does not advertise an end-session
    /// endpoint.
    #[must_use]
    pub fn end_session_url(
        &self,
        metadata: &ProviderMetadata,
        post_logout_redirect_uri: &str,
        id_token_hint: Option<&str>,
    ) -> Option<Url> {
        let mut url = metadata.end_session_endpoint.clone()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("post_logout_redirect_uri", post_logout_redirect_uri);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }
        Some(url)
    }

    /// Checks HTTP response status; returns the response on success or an
    /// error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Provider(format!("{operation} returned {status}: {body}")))
    }
}

/// Resolve the discovery document URL for an issuer, preserving any issuer
/// path component.
fn discovery_url(issuer: &Url) -> Url {
    let mut base = issuer.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base.push_str(".well-known/openid-configuration");
    base.parse().expect("issuer URL with well-known suffix is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce;

    fn test_config() -> OidcConfig {
        OidcConfig::new(
            "https://idam.example.com/o".parse().unwrap(),
            "finrem-citizen-ui",
            "test-secret",
        )
    }

    fn test_metadata(methods: &[&str]) -> ProviderMetadata {
        serde_json::from_value(serde_json::json!({
            "authorization_endpoint": "https://idam.example.com/o/authorize",
            "token_endpoint": "https://idam.example.com/o/token",
            "userinfo_endpoint": "https://idam.example.com/o/userinfo",
            "end_session_endpoint": "https://idam.example.com/o/endSession",
            "code_challenge_methods_supported": methods,
        }))
        .unwrap()
    }

    #[test]
    fn discovery_url_preserves_issuer_path() {
        let url = discovery_url(&"https://idam.example.com/o".parse().unwrap());
        assert_eq!(
            url.as_str(),
            "https://idam.example.com/o/.well-known/openid-configuration"
        );
    }

    #[test]
    fn discovery_url_handles_trailing_slash() {
        let url = discovery_url(&"https://idam.example.com/".parse().unwrap());
        assert_eq!(
            url.as_str(),
            "https://idam.example.com/.well-known/openid-configuration"
        );
    }

    #[test]
    fn supports_pkce_requires_s256() {
        assert!(test_metadata(&["S256", "plain"]).supports_pkce());
        assert!(!test_metadata(&["plain"]).supports_pkce());
        assert!(!test_metadata(&[]).supports_pkce());
    }

    #[test]
    fn authorization_url_contains_pkce_parameters() {
        let client = OidcClient::new(test_config());
        let verifier = pkce::generate_code_verifier();
        let url = client.authorization_url(
            &test_metadata(&["S256"]),
            &AuthorizationParams {
                redirect_uri: "https://localhost:3100/oauth2/callback".into(),
                code_challenge: pkce::generate_code_challenge(&verifier),
                nonce: None,
            },
        );

        let query = url.query().unwrap();
        assert!(query.contains("response_type=code"));
        assert!(query.contains("client_id=finrem-citizen-ui"));
        assert!(query.contains("code_challenge="));
        assert!(query.contains("code_challenge_method=S256"));
        assert!(query.contains("scope=openid+profile+roles"));
        assert!(!query.contains("nonce="));
    }

    #[test]
    fn authorization_url_includes_nonce_when_given() {
        let client = OidcClient::new(test_config());
        let url = client.authorization_url(
            &test_metadata(&[]),
            &AuthorizationParams {
                redirect_uri: "/cb".into(),
                code_challenge: "challenge".into(),
                nonce: Some("nonce-1".into()),
            },
        );
        assert!(url.query().unwrap().contains("nonce=nonce-1"));
    }

    #[test]
    fn end_session_url_includes_hint_when_present() {
        let client = OidcClient::new(test_config());
        let meta = test_metadata(&["S256"]);

        let url = client
            .end_session_url(&meta, "https://localhost:3100", Some("id-token"))
            .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("post_logout_redirect_uri="));
        assert!(query.contains("id_token_hint=id-token"));

        let without_hint = client
            .end_session_url(&meta, "https://localhost:3100", None)
            .unwrap();
        assert!(!without_hint.query().unwrap().contains("id_token_hint"));
    }

    #[test]
    fn end_session_url_absent_without_endpoint() {
        let client = OidcClient::new(test_config());
        let meta: ProviderMetadata = serde_json::from_value(serde_json::json!({
            "authorization_endpoint": "https://idam.example.com/o/authorize",
            "token_endpoint": "https://idam.example.com/o/token",
            "userinfo_endpoint": "https://idam.example.com/o/userinfo",
        }))
        .unwrap();
        assert!(client.end_session_url(&meta, "https://x", None).is_none());
    }

    #[test]
    fn validate_nonce_accepts_matching_claim() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let body = URL_SAFE_NO_PAD.encode(br#"{"sub":"s","nonce":"n-1"}"#);
        let token = format!("{header}.{body}.sig");
        assert!(OidcClient::validate_nonce(&token, "n-1").is_ok());
        assert!(OidcClient::validate_nonce(&token, "other").is_err());
    }
}
