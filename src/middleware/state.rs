use std::sync::Arc;

use crate::oidc::OidcClient;
use crate::session::{SessionManager, SessionStore};
use crate::views::Views;

/// Shared state for the app's route handlers.
pub struct AppState<S> {
    pub(crate) oidc: Arc<OidcClient>,
    pub(crate) sessions: Arc<SessionManager<S>>,
    pub(crate) views: Arc<Views>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            oidc: self.oidc.clone(),
            sessions: self.sessions.clone(),
            views: self.views.clone(),
        }
    }
}

impl<S: SessionStore> AppState<S> {
    #[must_use]
    pub fn new(oidc: OidcClient, sessions: SessionManager<S>, views: Views) -> Self {
        Self {
            oidc: Arc::new(oidc),
            sessions: Arc::new(sessions),
            views: Arc::new(views),
        }
    }
}
