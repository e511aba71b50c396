//! Bearer authentication for the REST surface.
//!
//! The extractor mirrors the socket gate: same token service, same claims,
//! rejected requests never reach a handler body.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use jwt_common::AuthError;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller of a REST endpoint.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized(AuthError::MissingCredential))?;

        let mut split = header_value.splitn(2, ' ');
        let token = match (split.next(), split.next()) {
            (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => return Err(ApiError::Unauthorized(AuthError::MissingCredential)),
        };

        let claims = state.tokens.validate(token)?;
        let user_id = claims.user_id()?;
        Ok(Self {
            user_id,
            username: claims.username,
        })
    }
}
