//! Authentication API endpoints.
//!
//! - POST `/register` - Create an account, issue tokens
//! - POST `/login` - Verify credentials, issue tokens
//! - POST `/auth/refresh` - Exchange a refresh token for a new pair
//! - POST `/auth/logout` - Revoke the presented refresh token
//! - POST `/auth/revoke-all` - Revoke every session for the caller
//!
//! Successful responses carry the access token in the body and the raw
//! refresh token only as an HTTP-only cookie scoped to `/api/auth`.

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    Auth, HasAuthState, REFRESH_COOKIE_NAME, build_refresh_cookie, clear_refresh_cookie,
    get_cookie,
};
use crate::db::{Database, Role};
use crate::jwt::JwtConfig;
use crate::password;
use crate::rate_limit::{
    RateLimitConfig, rate_limit_login, rate_limit_refresh, rate_limit_register,
};
use crate::sessions::{SessionError, SessionManager};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionManager,
    pub secure_cookies: bool,
    pub refresh_ttl_secs: i64,
}

impl HasAuthState for AuthState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }
}

pub fn router(state: AuthState, rate_limits: Arc<RateLimitConfig>) -> Router {
    let register_routes = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_limits.clone(),
            rate_limit_register,
        ));

    let login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_limits.clone(),
            rate_limit_login,
        ));

    let refresh_routes = Router::new()
        .route("/auth/refresh", post(refresh))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(rate_limits, rate_limit_refresh));

    let session_routes = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/revoke-all", post(revoke_all))
        .with_state(state);

    Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(refresh_routes)
        .merge(session_routes)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    #[serde(rename = "firstName")]
    first_name: String,
    #[serde(rename = "lastName")]
    last_name: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Mint an access token and pair it with a refresh cookie.
async fn issue_token_pair(
    state: &AuthState,
    user_id: i64,
    role: Role,
) -> Result<(String, String), ApiError> {
    let access_token = state.jwt.mint_access_token(user_id, role).map_err(|e| {
        error!(error = %e, "Failed to mint access token");
        ApiError::internal("Failed to generate token")
    })?;

    let issued = state
        .sessions
        .issue(user_id)
        .await
        .db_err("Failed to issue refresh token")?;

    let cookie = build_refresh_cookie(&issued.raw, state.refresh_ttl_secs, state.secure_cookies);
    Ok((access_token, cookie))
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();

    if !email.contains('@') || email.len() > 255 {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password should be at least 8 characters long",
        ));
    }

    let available = state
        .db
        .users()
        .is_email_available(email)
        .await
        .db_err("Failed to check email availability")?;
    if !available {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = password::hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create user")
    })?;

    let user_id = state
        .db
        .users()
        .create(
            email,
            payload.first_name.trim(),
            payload.last_name.trim(),
            &password_hash,
            Role::Viewer,
        )
        .await
        .db_err("Failed to create user")?;

    let (access_token, cookie) = issue_token_pair(&state, user_id, Role::Viewer).await?;

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(TokenResponse { access_token }),
    ))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // One generic message for unknown email and wrong password alike
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let user = state
        .db
        .users()
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(invalid)?;

    let valid = password::verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "Failed to verify password");
        ApiError::internal("Login failed")
    })?;
    if !valid {
        return Err(invalid());
    }

    let (access_token, cookie) = issue_token_pair(&state, user.id, user.role).await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(TokenResponse { access_token }),
    ))
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// Pull the raw refresh token from the cookie, falling back to the body.
async fn presented_refresh_token(request: Request) -> Option<String> {
    let (parts, body) = request.into_parts();

    if let Some(raw) = get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        if !raw.is_empty() {
            return Some(raw.to_string());
        }
    }

    let bytes = axum::body::to_bytes(body, 64 * 1024).await.ok()?;
    let payload: RefreshRequest = serde_json::from_slice(&bytes).ok()?;
    payload.refresh_token.filter(|t| !t.is_empty())
}

fn map_session_error(e: SessionError) -> ApiError {
    match e {
        // One generic message: callers must not learn whether the token
        // was forged, consumed, or merely stale
        SessionError::InvalidToken | SessionError::TokenRevoked | SessionError::TokenExpired => {
            debug!(error = %e, "Refresh token rejected");
            ApiError::unauthorized("Invalid refresh token")
        }
        SessionError::Store(e) => ApiError::db_error("Refresh token store failure", e),
    }
}

async fn refresh(
    State(state): State<AuthState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let raw = presented_refresh_token(request)
        .await
        .ok_or_else(|| ApiError::bad_request("No refresh token presented"))?;

    let rotated = state
        .sessions
        .rotate(&raw)
        .await
        .map_err(map_session_error)?;

    // A deleted owner cascades its tokens away; treat the miss like any
    // other unknown token
    let user = state
        .db
        .users()
        .get_by_id(rotated.user_id)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let access_token = state.jwt.mint_access_token(user.id, user.role).map_err(|e| {
        error!(error = %e, "Failed to mint access token");
        ApiError::internal("Failed to generate token")
    })?;

    let cookie = build_refresh_cookie(&rotated.raw, state.refresh_ttl_secs, state.secure_cookies);

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(TokenResponse { access_token }),
    ))
}

/// Logout always succeeds from the caller's perspective: the token is
/// revoked if present, and the cookie is cleared either way.
async fn logout(
    State(state): State<AuthState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(raw) = presented_refresh_token(request).await {
        if let Err(e) = state.sessions.revoke(&raw).await {
            warn!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))]),
    ))
}

/// Revoke every refresh token for the authenticated caller
/// ("log out everywhere").
async fn revoke_all(
    State(state): State<AuthState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .sessions
        .revoke_all(user.user_id)
        .await
        .db_err("Failed to revoke sessions")?;
    debug!(user_id = user.user_id, revoked, "Revoked all sessions");

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))]),
    ))
}
