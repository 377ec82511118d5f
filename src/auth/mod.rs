/*!
 * # Customer Authentication
 *
 * Storefront requests may carry a bearer JWT identifying the customer.
 * A missing, expired or otherwise invalid token makes the request anonymous;
 * the wishlist flow then falls back to the signed cookie.
 */

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::entities::user;
use crate::errors::ServiceError;
use crate::AppState;

/// Claim structure for customer tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID)
    pub email: Option<String>, // User's email
    pub iat: i64,              // Issued at time
    pub exp: i64,              // Expiration time
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

/// Issues an HS256 token for the given customer
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    email: Option<String>,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenCreation(e.to_string()))
}

/// Validates a token and returns its claims
pub fn validate_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Extracts the raw bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the customer behind the request headers, if any
pub async fn resolve_user<C: ConnectionTrait>(
    conn: &C,
    secret: &str,
    headers: &HeaderMap,
) -> Result<Option<user::Model>, ServiceError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };

    let claims = match validate_token(secret, token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Ignoring bearer token: {}", e);
            return Ok(None);
        }
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        debug!("Ignoring bearer token with malformed subject");
        return Ok(None);
    };

    Ok(user::Entity::find_by_id(user_id).one(conn).await?)
}

/// The customer making the request, or `None` for anonymous visitors
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<user::Model>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_user(&*state.db, &state.config.jwt_secret, &parts.headers).await?;
        Ok(CurrentUser(user))
    }
}
