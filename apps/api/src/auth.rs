//! Bearer-token authentication.
//!
//! Callers present `Authorization: Bearer <jwt>`; the token's `sub` claim is
//! the caller's user id. The API only validates tokens; issuing is for the
//! identity provider and for local tooling and tests.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Token type accepted on booking routes.
const ACCESS: &str = "access";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Marketplace user id of the caller.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// Only `"access"` tokens are accepted.
    pub token_type: String,
}

/// HS256 signer/verifier for access tokens.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    /// Signs an access token for `uid`. Used by tooling and tests.
    pub fn generate_access_token(&self, uid: &str) -> Result<String, ApiError> {
        let issued = Utc::now();
        let claims = Claims {
            sub: uid.to_string(),
            iat: issued.timestamp(),
            exp: (issued + self.lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: ACCESS.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            ApiError::Engine(rental_engine::EngineError::Internal(format!(
                "Failed to generate token: {}",
                e
            )))
        })
    }

    /// Decodes `token` and checks it is an unexpired access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::Unauthenticated(format!("Invalid token: {}", e)))?;
        let claims = token_data.claims;

        if claims.token_type != ACCESS {
            return Err(ApiError::Unauthenticated("Expected access token".to_string()));
        }
        if claims.sub.trim().is_empty() {
            return Err(ApiError::Unauthenticated("Token has no subject".to_string()));
        }

        Ok(claims)
    }
}

/// `"Bearer abc"` → `Some("abc")`.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Extractor
// =============================================================================

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthenticated("Missing Authorization header".to_string()))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthenticated("Expected a bearer token".to_string()))?;

        let claims = state.jwt.validate_access_token(token)?;
        debug!(uid = %claims.sub, "Authenticated request");

        Ok(AuthUser { uid: claims.sub })
    }
}
