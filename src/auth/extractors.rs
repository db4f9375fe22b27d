use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::error::ApiError;

/// Authenticated caller. Rejects with 401 when the bearer token is missing
/// or invalid.
pub struct AuthUser(pub Uuid);

/// Caller that may be anonymous. A present but invalid token is still a 401.
pub struct MaybeUser(pub Option<Uuid>);

fn bearer_user(parts: &Parts, keys: &JwtKeys) -> Result<Option<Uuid>, ApiError> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header".into()))?;

    let claims = keys.verify_as(token, TokenKind::Access).map_err(|e| {
        warn!(error = %e, "rejected bearer token");
        ApiError::Unauthorized("Invalid or expired token".into())
    })?;
    Ok(Some(claims.sub))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        bearer_user(parts, &keys)?
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeUser(bearer_user(parts, &keys)?))
    }
}
