use axum::Router;
use axum::extract::{Query, Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};

use super::error::PageError;
use super::state::AppState;
use crate::error::Error;
use crate::oidc::AuthorizationParams;
use crate::pkce;
use crate::session::{AuthSession, SessionState, SessionStore};
use crate::tasklist;
use crate::token;
use crate::views::{DashboardView, HomeView, TaskGroupView, TaskItemView};

const DEFAULT_HOST: &str = "localhost:3100";

/// The citizen-facing application router.
///
/// Provider setup is lazy: a guard on the app surface runs discovery on
/// first use and forwards a setup failure instead of letting the request
/// through. `/logout` sits outside the guard so it still works in degraded
/// mode, and the operational endpoints never need the provider.
pub fn app_routes<S: SessionStore>(state: AppState<S>) -> Router {
    let guarded = Router::new()
        .route("/", get(home::<S>))
        .route("/login", get(login::<S>))
        .route("/oauth2/callback", get(callback::<S>))
        .route("/task-list-upload-dashboard", get(dashboard::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            ensure_provider::<S>,
        ));

    Router::new()
        .merge(guarded)
        .route("/logout", get(logout::<S>))
        .route("/health", get(health))
        .route("/info", get(info))
        .fallback(not_found)
        .with_state(state)
}

async fn ensure_provider<S: SessionStore>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Result<Response, PageError> {
    state.oidc.metadata().await?;
    Ok(next.run(request).await)
}

// ── Home ───────────────────────────────────────────────────────────

async fn home<S: SessionStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let (id, session) = state.sessions.load_or_create(&headers).await;
    let Some(user) = session.user().filter(|_| session.is_authenticated()) else {
        return Ok(login_redirect("/").into_response());
    };

    let view = HomeView {
        display_name: display_name(user),
    };
    let html = state.views.render("home", &view)?;
    let jar = state.sessions.issue_cookie(&id);
    Ok((jar, Html(html)).into_response())
}

fn display_name(user: &AuthSession) -> String {
    match (&user.given_name, &user.family_name) {
        (Some(given), Some(family)) => format!("{given} {family}"),
        _ => user
            .email
            .clone()
            .unwrap_or_else(|| user.subject.to_string()),
    }
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    return_to: Option<String>,
}

async fn login<S: SessionStore>(
    State(state): State<AppState<S>>,
    Query(params): Query<LoginParams>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    match initiate_login(&state, params, &headers).await {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::error!(error = %err, "Login error");
            Err(err.into_authentication("failed to initiate login").into())
        }
    }
}

async fn initiate_login<S: SessionStore>(
    state: &AppState<S>,
    params: LoginParams,
    headers: &HeaderMap,
) -> Result<Response, Error> {
    let metadata = state.oidc.metadata().await?;
    let (id, _) = state.sessions.load_or_create(headers).await;

    let code_verifier = pkce::generate_code_verifier();
    let code_challenge = pkce::generate_code_challenge(&code_verifier);
    // Providers that negotiate PKCE don't need a nonce on top of it.
    let nonce = (!metadata.supports_pkce()).then(pkce::generate_nonce);

    let auth_url = state.oidc.authorization_url(
        metadata,
        &AuthorizationParams {
            redirect_uri: build_redirect_uri(headers, state.oidc.config().callback_url()),
            code_challenge,
            nonce: nonce.clone(),
        },
    );

    state
        .sessions
        .save(
            &id,
            &SessionState::InProgress {
                code_verifier,
                nonce,
                return_to: params.return_to.and_then(safe_return_to),
            },
        )
        .await?;

    let jar = state.sessions.issue_cookie(&id);
    Ok((jar, Redirect::to(auth_url.as_str())).into_response())
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    #[allow(dead_code)]
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<S: SessionStore>(
    State(state): State<AppState<S>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let (id, session) = state.sessions.load_or_create(&headers).await;
    let was_in_progress = matches!(session, SessionState::InProgress { .. });

    match complete_login(&state, params, &headers, session).await {
        Ok((auth_session, return_to)) => {
            state
                .sessions
                .save(&id, &SessionState::Authenticated(auth_session))
                .await
                .map_err(|e| e.into_callback("failed to persist session"))?;

            let jar = state.sessions.issue_cookie(&id);
            Ok((jar, Redirect::to(&return_to)).into_response())
        }
        Err(err) => {
            tracing::error!(error = %err, "OIDC callback error");
            // Clear the in-progress verifier/nonce so they cannot be
            // replayed after a failed callback.
            if was_in_progress {
                if let Err(reset_err) = state.sessions.save(&id, &SessionState::Anonymous).await {
                    tracing::warn!(error = %reset_err, "Failed to reset session after callback error");
                }
            }
            Err(err.into_callback("authentication callback failed").into())
        }
    }
}

async fn complete_login<S: SessionStore>(
    state: &AppState<S>,
    params: CallbackParams,
    headers: &HeaderMap,
    session: SessionState,
) -> Result<(AuthSession, String), Error> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or("unknown error");
        return Err(Error::Callback(format!(
            "provider returned {error}: {description}"
        )));
    }

    let SessionState::InProgress {
        code_verifier,
        nonce,
        return_to,
    } = session
    else {
        return Err(Error::Callback("no login in progress".into()));
    };

    let code = params
        .code
        .ok_or_else(|| Error::Callback("no authorization code received".into()))?;

    let metadata = state.oidc.metadata().await?;
    let redirect_uri = build_redirect_uri(headers, state.oidc.config().callback_url());

    let tokens = state
        .oidc
        .exchange_code(metadata, &code, &redirect_uri, Some(&code_verifier))
        .await
        .map_err(|e| e.into_callback("token exchange failed"))?;

    let id_token = tokens
        .id_token
        .ok_or_else(|| Error::Callback("no ID token received from IDAM".into()))?;

    if let Some(expected) = &nonce {
        crate::oidc::OidcClient::validate_nonce(&id_token, expected)?;
    }

    let sub = token::sub_from_id_token(&id_token)?.into();
    let user_info = state
        .oidc
        .fetch_user_info(metadata, &tokens.access_token, &sub)
        .await
        .map_err(|e| e.into_callback("userinfo request failed"))?;

    let auth_session = AuthSession::from_user_info(
        user_info,
        tokens.access_token,
        id_token,
        tokens.refresh_token,
    );

    tracing::info!(subject = %auth_session.subject, "OIDC login successful");
    Ok((auth_session, return_to.unwrap_or_else(|| "/".into())))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Response {
    let (id, session) = state.sessions.load_or_create(&headers).await;

    // Degraded mode: discovery never completed, so there is no end-session
    // endpoint to send the browser to. Local sign-out only.
    let Some(metadata) = state.oidc.cached_metadata() else {
        destroy_logging_errors(&state, &id).await;
        return (state.sessions.clear_cookie(), Redirect::to("/")).into_response();
    };

    let id_token_hint = session.user().map(|u| u.id_token.as_str());
    let end_session = state
        .oidc
        .end_session_url(metadata, &request_origin(&headers), id_token_hint);

    destroy_logging_errors(&state, &id).await;

    let target = end_session
        .as_ref()
        .map_or("/", url::Url::as_str)
        .to_owned();
    (state.sessions.clear_cookie(), Redirect::to(&target)).into_response()
}

/// Session destroy failures must never block the logout redirect.
async fn destroy_logging_errors<S: SessionStore>(state: &AppState<S>, id: &crate::types::SessionId) {
    if let Err(err) = state.sessions.destroy(id).await {
        tracing::error!(error = %err, "Session destroy error on logout");
    }
}

// ── Task-list dashboard ────────────────────────────────────────────

async fn dashboard<S: SessionStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let (id, session) = state.sessions.load_or_create(&headers).await;
    if !session.is_authenticated() {
        return Ok(login_redirect("/task-list-upload-dashboard").into_response());
    }

    let case = tasklist::case_model();
    let hearing_date = tasklist::parse_hearing_date(&case.first_hearing_date)?;
    let items = tasklist::task_list_form_items(&case.form_type);

    let groups = items
        .by_offset()
        .iter()
        .map(|(offset, tasks)| TaskGroupView {
            due_date: tasklist::offset_date(hearing_date, *offset),
            tasks: tasks
                .iter()
                .map(|task| TaskItemView {
                    label: task.label.clone(),
                    status: tasklist::task_status(&task.file_name, &case.uploaded_documents)
                        .to_string(),
                })
                .collect(),
        })
        .collect();

    let view = DashboardView {
        hearing_date: format!(
            "{} {} {}",
            hearing_date.day(),
            hearing_date.month(),
            hearing_date.year()
        ),
        show_warning: tasklist::task_list_warning_message(hearing_date, &case.uploaded_documents),
        groups,
        divorce_case_url: case.divorce_case_url.clone(),
        help_email: case.getting_help.email.clone(),
        help_telephone: case.getting_help.telephone.clone(),
    };

    let html = state.views.render("task-list-upload-dashboard", &view)?;
    let jar = state.sessions.issue_cookie(&id);
    Ok((jar, Html(html)).into_response())
}

// ── Operational endpoints ──────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse { status: "UP" })
}

#[derive(Serialize)]
struct InfoResponse {
    name: &'static str,
    version: &'static str,
}

async fn info() -> axum::Json<InfoResponse> {
    axum::Json(InfoResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found() -> PageError {
    PageError::not_found()
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_redirect(return_to: &str) -> Redirect {
    Redirect::to(&format!("/login?return_to={}", urlencoding::encode(return_to)))
}

/// Only same-site paths may be used as a post-login destination.
fn safe_return_to(candidate: String) -> Option<String> {
    (candidate.starts_with('/') && !candidate.starts_with("//")).then_some(candidate)
}

/// Resolve the callback redirect URI. An absolute configured URL is used
/// verbatim; a path is resolved against the forwarded (or own) host because
/// the service sits behind a reverse proxy in production but binds directly
/// in local development.
fn build_redirect_uri(headers: &HeaderMap, configured: &str) -> String {
    if configured.starts_with("http://") || configured.starts_with("https://") {
        return configured.to_owned();
    }
    format!("{}{}", request_origin(headers), configured)
}

/// `scheme://host` for the incoming request, honouring proxy headers.
pub(crate) fn request_origin(headers: &HeaderMap) -> String {
    let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
    let host = header_str(headers, "x-forwarded-host")
        .or_else(|| header_str(headers, "host"))
        .unwrap_or(DEFAULT_HOST);
    format!("{proto}://{host}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn absolute_callback_url_is_used_verbatim() {
        let resolved = build_redirect_uri(
            &headers(&[("host", "proxy.example.com")]),
            "https://finrem.example.com/oauth2/callback",
        );
        assert_eq!(resolved, "https://finrem.example.com/oauth2/callback");
    }

    #[test]
    fn path_callback_resolves_against_forwarded_headers() {
        let resolved = build_redirect_uri(
            &headers(&[
                ("x-forwarded-proto", "https"),
                ("x-forwarded-host", "finrem.platform.hmcts.net"),
                ("host", "10.0.0.1:3100"),
            ]),
            "/oauth2/callback",
        );
        assert_eq!(
            resolved,
            "https://finrem.platform.hmcts.net/oauth2/callback"
        );
    }

    #[test]
    fn path_callback_falls_back_to_host_header() {
        let resolved = build_redirect_uri(&headers(&[("host", "myhost:8080")]), "/oauth2/callback");
        assert_eq!(resolved, "http://myhost:8080/oauth2/callback");
    }

    #[test]
    fn path_callback_defaults_host_when_absent() {
        let resolved = build_redirect_uri(&HeaderMap::new(), "/oauth2/callback");
        assert_eq!(resolved, "http://localhost:3100/oauth2/callback");
    }

    #[test]
    fn return_to_must_be_a_same_site_path() {
        assert_eq!(
            safe_return_to("/task-list-upload-dashboard".into()),
            Some("/task-list-upload-dashboard".into())
        );
        assert_eq!(safe_return_to("https://evil.example.com".into()), None);
        assert_eq!(safe_return_to("//evil.example.com".into()), None);
    }
}
