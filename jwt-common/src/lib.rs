//! Shared JWT token service.
//!
//! Both the WebSocket gate and the REST bearer extractor authenticate through
//! [`TokenService::validate`]; token minting exists for tests and tooling.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Authentication failure. Anything in here terminates the connection
/// attempt (socket) or maps to 401 (REST).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    InvalidToken,
    #[error("malformed subject claim")]
    MalformedSubject,
}

/// JWT claims carried by every issued token.
///
/// `sub` holds the numeric user id rendered as a string; `username` is the
/// display name stamped onto presence events server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

impl Claims {
    /// Claims for `user_id` expiring `ttl_secs` from now.
    pub fn new(user_id: i64, username: &str, ttl_secs: i64) -> Self {
        let expiration = Utc::now() + Duration::seconds(ttl_secs);
        Self {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: expiration.timestamp() as usize,
        }
    }

    /// Parse the subject back into the numeric user id.
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::MalformedSubject)
    }
}

/// HS256 token signer/verifier. Cheap to clone; construct once at startup
/// and hand it to whatever needs it.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Reads `JWT_SECRET`, falling back to a development-only secret.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using development secret");
            "dev-secret-change-me".to_string()
        });
        Self::new(&secret)
    }

    pub fn generate(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                _ => Err(AuthError::InvalidToken),
            },
        }
    }
}
