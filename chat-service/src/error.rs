//! Failure taxonomy for the socket and REST surfaces.
//!
//! Socket-side failures never cross connections: they become one scoped
//! `error` event to the originating connection, whose text is the `Display`
//! impl here. REST-side failures map to HTTP statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jwt_common::AuthError;
use storage::StoreError;

/// A rejected socket event. The display string is exactly what the client
/// sees in the `error` frame.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Access denied")]
    AccessDenied,
    #[error("Message must be 1-1000 characters")]
    InvalidMessage,
    #[error("Failed to send message")]
    Persistence(#[from] StoreError),
}

/// REST failure; renders as the JSON error body the API has always served.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized(#[from] AuthError),
    #[error("access denied")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error")]
    Internal(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized(e) => {
                tracing::warn!(error = %e, "Rejected unauthenticated request");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Internal(e) => {
                tracing::error!(error = %e, "Request failed on the store");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
