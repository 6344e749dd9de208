//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

// Errors

/// An error that fails a request before any of the response body is
/// sent. Defaults to a 500 when converted with `?`.
pub struct ApiError {
    status: StatusCode,
    err: anyhow::Error,
}

impl ApiError {
    pub fn new(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            err: err.into(),
        }
    }

    /// The relay itself is not configured to serve requests
    pub fn unavailable(err: impl Into<anyhow::Error>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, err)
    }

    /// The model provider refused or could not be reached
    pub fn bad_gateway(err: impl Into<anyhow::Error>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("{} {}", self.status, self.err);

        (self.status, format!("Something went wrong: {}", self.err)).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}
