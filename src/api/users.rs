//! User listing API endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{HasAuthState, RoleRestricted, StaffOnly};
use crate::db::{Database, UserSummary};
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl HasAuthState for UsersState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }
}

pub fn router(state: UsersState) -> Router {
    Router::new().route("/", get(list_users)).with_state(state)
}

#[derive(Serialize)]
struct ListUsersResponse {
    users: Vec<UserSummary>,
}

/// List all users. Restricted to admin and team roles.
async fn list_users(
    State(state): State<UsersState>,
    RoleRestricted(_user, _): RoleRestricted<StaffOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;

    Ok((StatusCode::OK, Json(ListUsersResponse { users })))
}
