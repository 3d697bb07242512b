use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status_code(),
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response();

        if let Some(challenge) = self.www_authenticate() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}

/// Errors returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Auth(e) => return e.into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
