//! Axum extractors for bearer authentication and role checks.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use super::errors::AuthError;
use crate::db::Role;
use crate::jwt::JwtConfig;

/// Trait for state types that expose the token codec to the extractors.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
}

/// Authenticated principal attached to a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
}

/// Extractor for endpoints that require a valid bearer access token.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::NotAuthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::NotAuthenticated)?;

        let claims = state.jwt().verify_access_token(token).map_err(|e| {
            debug!(error = %e, "Access token rejected");
            AuthError::InvalidToken
        })?;

        let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;

        Ok(Auth(AuthenticatedUser {
            user_id,
            role: claims.role,
        }))
    }
}

/// An allow-set of roles for the authorization step.
pub trait RoleSet {
    fn allows(role: Role) -> bool;
}

/// Admins and team members; viewers are refused.
pub struct StaffOnly;

impl RoleSet for StaffOnly {
    fn allows(role: Role) -> bool {
        matches!(role, Role::Admin | Role::Team)
    }
}

/// Extractor combining authentication with a role allow-set. Authentication
/// failures reject with 401; an authenticated principal outside the
/// allow-set rejects with 403.
pub struct RoleRestricted<R: RoleSet>(pub AuthenticatedUser, pub PhantomData<R>);

impl<S, R> FromRequestParts<S> for RoleRestricted<R>
where
    S: HasAuthState + Send + Sync,
    R: RoleSet + Send,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !R::allows(user.role) {
            return Err(AuthError::InsufficientRole);
        }

        Ok(RoleRestricted(user, PhantomData))
    }
}
