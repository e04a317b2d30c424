use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::user::Role;
use crate::services::access::Actor;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Signs an HS256 token for `user_id`. Tokens are minted by the identity
/// provider in production; this is used by tests and local tooling.
pub fn issue_token(user_id: Uuid, role: Role, secret: &str, ttl: Duration) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp().max(0) as usize,
        exp: (now + ttl).timestamp().max(0) as usize,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Validate a JWT token with the given secret.
/// Returns the decoded claims or an error.
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))?;
    Ok(data.claims)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates `token` and loads the caller's driver / customer profile.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Actor, ApiError> {
    let claims = validate_jwt(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized("invalid or expired token".to_string())
    })?;

    Ok(Actor::resolve(state.store.as_ref(), claims.sub, claims.role).await?)
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        authenticate(state, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let user = Uuid::new_v4();
        let token = issue_token(user, Role::Dispatcher, "secret", Duration::hours(1)).unwrap();
        let claims = validate_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Dispatcher);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::Admin, "secret", Duration::hours(1)).unwrap();
        assert!(validate_jwt(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(Uuid::new_v4(), Role::Driver, "secret", Duration::hours(-2)).unwrap();
        assert!(validate_jwt(&token, "secret").is_err());
    }

    #[test]
    fn test_bearer_parsing() {
        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(bearer_token(&parts), Some("abc.def"));

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Basic xyz")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
