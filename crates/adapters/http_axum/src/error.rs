//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use wothub_domain::error::{DispatchError, NotFoundError, WotHubError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`WotHubError`] to an HTTP response with appropriate status code.
pub struct ApiError(WotHubError);

impl From<WotHubError> for ApiError {
    fn from(err: WotHubError) -> Self {
        Self(err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self(err.into())
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            WotHubError::Validation(_) | WotHubError::Dispatch(_) => {
                (StatusCode::BAD_REQUEST, self.0.detail())
            }
            WotHubError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.detail()),
            WotHubError::Handler(err) => {
                tracing::error!(error = %err, "handler error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
