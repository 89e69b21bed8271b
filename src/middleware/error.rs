use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::error::Error;

/// HTTP-facing wrapper around classified errors.
///
/// Handlers return this so the boundary only ever deals with classified
/// errors; rendering is a generic error view (the error page itself is
/// static content).
#[derive(Debug)]
pub struct PageError {
    status: StatusCode,
    source: Option<Error>,
}

impl PageError {
    /// 404 for unmatched routes.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            source: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for PageError {
    fn from(source: Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            source: Some(source),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        if self.status == StatusCode::NOT_FOUND {
            return (
                StatusCode::NOT_FOUND,
                Html(include_str!("../../templates/not-found.hbs")),
            )
                .into_response();
        }

        if let Some(source) = &self.source {
            tracing::error!(error = %source, "Request failed");
        }
        (self.status, Html(include_str!("../../templates/error.hbs"))).into_response()
    }
}
