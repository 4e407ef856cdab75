mod auth;
mod error;
mod users;

use axum::{Json, Router, routing::get};
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::sessions::SessionManager;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    sessions: SessionManager,
    secure_cookies: bool,
    refresh_ttl_secs: i64,
    rate_limits: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        sessions,
        secure_cookies,
        refresh_ttl_secs,
    };

    let users_state = users::UsersState { db, jwt };

    Router::new()
        .merge(auth::router(auth_state, rate_limits))
        .nest("/users", users::router(users_state))
        .route("/healthz", get(healthz))
}

/// Liveness probe.
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
