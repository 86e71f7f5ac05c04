use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::claims::AuthClaim;
use super::jwt::TokenService;
use crate::error::AppError;

/// Extracts and validates the bearer token, yielding the caller's claim.
pub struct AuthUser(pub AuthClaim);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn TokenService>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthenticated("No token provided"))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated("No token provided"))?;

        let tokens = <Arc<dyn TokenService> as FromRef<S>>::from_ref(state);
        let claim = tokens.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthenticated("Invalid token")
        })?;

        Ok(AuthUser(claim))
    }
}
