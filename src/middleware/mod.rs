//! HTTP layer: configuration, route handlers, and error mapping.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use finrem_citizen_ui::middleware::{AppConfig, build_router};
//! use finrem_citizen_ui::session::MemoryStore;
//!
//! let config = AppConfig::from_env()?;
//! let app = build_router(&config, MemoryStore::new())?;
//! axum::serve(listener, app).await?;
//! ```

mod config;
mod error;
mod routes;
mod state;

pub use config::AppConfig;
pub use error::PageError;
pub use routes::app_routes;
pub use state::AppState;

pub(crate) use routes::request_origin;

use axum::Router;

use crate::error::Error;
use crate::oidc::OidcClient;
use crate::session::{CookieSettings, SessionManager, SessionStore};
use crate::views::Views;

/// Assemble the full application router from configuration and a session
/// store.
///
/// # Errors
///
/// Returns [`Error::Template`] if the embedded templates fail to register.
pub fn build_router<S: SessionStore>(config: &AppConfig, store: S) -> Result<Router, Error> {
    let views = Views::new()?;
    let oidc = OidcClient::new(config.oidc.clone());
    let sessions = SessionManager::new(
        store,
        &config.session_secrets,
        CookieSettings {
            name: config.cookie_name.clone(),
            ttl: config.session_ttl,
            secure: config.secure_cookies,
        },
    );

    let state = AppState::new(oidc, sessions, views);
    let mock = config
        .use_mock_idam
        .then(|| crate::mock_idam::mock_idam_routes(state.views.clone()));

    let mut router = app_routes(state);
    if let Some(mock) = mock {
        router = router.merge(mock);
    }
    Ok(router)
}
