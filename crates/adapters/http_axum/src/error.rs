//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hausbus_domain::error::{HausbusError, NotFoundError, UsageError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`HausbusError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(HausbusError);

impl From<HausbusError> for ApiError {
    fn from(err: HausbusError) -> Self {
        Self(err)
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        Self(err.into())
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HausbusError::Usage(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            HausbusError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            HausbusError::Bus(err) => {
                tracing::error!(error = %err, "bus error");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            HausbusError::Action(err) => {
                tracing::error!(error = %err, "action error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
