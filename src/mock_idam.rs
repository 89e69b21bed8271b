//! Mock identity provider for local development.
//!
//! Serves its own discovery document, so the real OIDC flow runs
//! unmodified against it: sign-in form, one-time authorization codes,
//! unsigned (`alg: none`) ID tokens, userinfo and end-session endpoints.
//! Never mounted outside mock mode.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::middleware::request_origin;
use crate::oidc::UserInfo;
use crate::views::{MockLoginView, Views};

const MOCK_PATH: &str = "/mock-idam";

struct MockIdamState {
    views: Arc<Views>,
    /// One-time authorization codes, redeemed at the token endpoint.
    codes: Mutex<HashMap<String, String>>,
    /// Issued access tokens and the user info they resolve to.
    tokens: Mutex<HashMap<String, UserInfo>>,
}

/// The mock provider router, mounted under `/mock-idam`.
pub fn mock_idam_routes(views: Arc<Views>) -> Router {
    let state = Arc::new(MockIdamState {
        views,
        codes: Mutex::new(HashMap::new()),
        tokens: Mutex::new(HashMap::new()),
    });

    Router::new()
        .route(
            "/mock-idam/.well-known/openid-configuration",
            get(discovery),
        )
        .route("/mock-idam/login", get(login_page))
        .route("/mock-idam/authenticate", post(authenticate))
        .route("/mock-idam/o/token", post(token))
        .route("/mock-idam/o/userinfo", get(userinfo))
        .route("/mock-idam/o/endSession", get(end_session))
        .with_state(state)
}

/// Accepts `test-cred@hmcts.org` with any password, or any `@hmcts.org`
/// address with a non-empty password.
#[must_use]
pub fn validate_mock_credentials(email: &str, password: &str) -> bool {
    if email == "test-cred@hmcts.org" {
        return true;
    }
    email.ends_with("@hmcts.org") && !email.is_empty() && !password.is_empty()
}

/// An unsigned JWT-shaped ID token mimicking the IDAM structure.
#[must_use]
pub fn generate_mock_jwt(email: &str, uid: &str) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let header = json!({ "alg": "none", "typ": "JWT" });
    let payload = json!({
        "uid": uid,
        "sub": email,
        "email": email,
        "given_name": extract_first_name(email),
        "family_name": extract_last_name(email),
        "roles": ["citizen"],
        "iat": now,
        "exp": now + 3600,
        "iss": "mock-idam",
        "aud": "finrem-citizen-ui",
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header_b64}.{payload_b64}.mock-signature")
}

// ── Handlers ───────────────────────────────────────────────────────

async fn discovery(headers: HeaderMap) -> Json<JsonValue> {
    let base = format!("{}{}", request_origin(&headers), MOCK_PATH);
    Json(json!({
        "issuer": base.clone(),
        "authorization_endpoint": format!("{base}/login"),
        "token_endpoint": format!("{base}/o/token"),
        "userinfo_endpoint": format!("{base}/o/userinfo"),
        "end_session_endpoint": format!("{base}/o/endSession"),
        "response_types_supported": ["code"],
        "code_challenge_methods_supported": ["S256"],
    }))
}

#[derive(Deserialize)]
struct AuthorizeParams {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

async fn login_page(
    State(state): State<Arc<MockIdamState>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let view = MockLoginView {
        client_id: params.client_id.unwrap_or_default(),
        redirect_uri: params.redirect_uri.unwrap_or_default(),
        state: params.state.unwrap_or_default(),
        ..MockLoginView::default()
    };
    render_login(&state, view)
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    redirect_uri: String,
    #[serde(default)]
    state: String,
}

async fn authenticate(
    State(state): State<Arc<MockIdamState>>,
    Form(creds): Form<Credentials>,
) -> Response {
    if !validate_mock_credentials(&creds.email, &creds.password) {
        tracing::info!("Mock IDAM: invalid credentials");
        let view = MockLoginView {
            client_id: creds.client_id,
            redirect_uri: creds.redirect_uri,
            state: creds.state,
            email: creds.email,
            error: Some("Incorrect email or password".into()),
        };
        return render_login(&state, view);
    }

    let code = format!("mock-auth-code-{}", Ulid::new());
    state.codes.lock().await.insert(code.clone(), creds.email);

    let Ok(mut callback) = url::Url::parse(&creds.redirect_uri) else {
        return (StatusCode::BAD_REQUEST, "invalid redirect_uri").into_response();
    };
    {
        let mut query = callback.query_pairs_mut();
        query.append_pair("code", &code);
        if !creds.state.is_empty() {
            query.append_pair("state", &creds.state);
        }
    }

    tracing::info!("Mock IDAM: authentication successful");
    Redirect::to(callback.as_str()).into_response()
}

#[derive(Deserialize)]
struct TokenRequest {
    #[serde(default)]
    code: String,
}

async fn token(
    State(state): State<Arc<MockIdamState>>,
    Form(request): Form<TokenRequest>,
) -> Response {
    let Some(email) = state.codes.lock().await.remove(&request.code) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    };

    let uid = format!("mock-user-{}", Ulid::new());
    let id_token = generate_mock_jwt(&email, &uid);
    let access_token = format!("mock-access-token-{}", Ulid::new());

    let user_info = UserInfo::new(email.as_str().into())
        .with_uid(uid)
        .with_email(email.clone())
        .with_name(extract_first_name(&email), extract_last_name(&email))
        .with_roles(vec!["citizen".into()]);
    state
        .tokens
        .lock()
        .await
        .insert(access_token.clone(), user_info);

    tracing::info!(email = %email, "Mock IDAM: tokens generated");
    Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "id_token": id_token,
    }))
    .into_response()
}

async fn userinfo(State(state): State<Arc<MockIdamState>>, headers: HeaderMap) -> Response {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(access_token) = bearer else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match state.tokens.lock().await.get(access_token) {
        Some(user_info) => Json(user_info.clone()).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Deserialize)]
struct EndSessionParams {
    #[serde(default)]
    post_logout_redirect_uri: Option<String>,
}

async fn end_session(Query(params): Query<EndSessionParams>) -> Redirect {
    let target = params.post_logout_redirect_uri.unwrap_or_else(|| "/".into());
    Redirect::to(&target)
}

// ── Helpers ────────────────────────────────────────────────────────

fn render_login(state: &MockIdamState, view: MockLoginView) -> Response {
    match state.views.render("mock-idam-login", &view) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Mock IDAM: render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn extract_first_name(email: &str) -> String {
    name_part(email, 0).unwrap_or_else(|| "Test".into())
}

fn extract_last_name(email: &str) -> String {
    name_part(email, 1).unwrap_or_else(|| "User".into())
}

fn name_part(email: &str, index: usize) -> Option<String> {
    let username = email.split('@').next()?;
    let part = username
        .split(['.', '_', '-'])
        .nth(index)
        .filter(|p| !p.is_empty())?;
    Some(capitalize(part))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::sub_from_id_token;

    #[test]
    fn credentials_accept_test_account_and_hmcts_domain() {
        assert!(validate_mock_credentials("test-cred@hmcts.org", ""));
        assert!(validate_mock_credentials("jane.doe@hmcts.org", "pw"));
        assert!(!validate_mock_credentials("jane.doe@hmcts.org", ""));
        assert!(!validate_mock_credentials("jane@example.com", "pw"));
    }

    #[test]
    fn mock_jwt_decodes_with_expected_claims() {
        let jwt = generate_mock_jwt("jane.doe@hmcts.org", "mock-user-1");
        assert_eq!(jwt.split('.').count(), 3);
        assert_eq!(sub_from_id_token(&jwt).unwrap(), "jane.doe@hmcts.org");
    }

    #[test]
    fn names_derive_from_the_email_local_part() {
        assert_eq!(extract_first_name("jane.doe@hmcts.org"), "Jane");
        assert_eq!(extract_last_name("jane.doe@hmcts.org"), "Doe");
        assert_eq!(extract_first_name("admin@hmcts.org"), "Admin");
        assert_eq!(extract_last_name("admin@hmcts.org"), "User");
    }

    #[test]
    fn capitalize_normalises_case() {
        assert_eq!(capitalize("jANE"), "Jane");
        assert_eq!(capitalize(""), "");
    }
}
