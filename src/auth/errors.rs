//! Authentication error responses.
//!
//! The response bodies stay generic on purpose: which specific check failed
//! (bad signature, expiry, unknown token) is logged but never exposed, so a
//! caller cannot probe for the difference between a revoked credential and
//! one that never existed.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Rejection for the authentication and authorization extractors.
#[derive(Debug)]
pub enum AuthError {
    /// No bearer credential presented
    NotAuthenticated,
    /// Credential present but failed verification
    InvalidToken,
    /// Authenticated, but the role is not in the allow-set
    InsufficientRole,
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotAuthenticated | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "Not authenticated",
            AuthError::InvalidToken => "Invalid or expired token",
            AuthError::InsufficientRole => "Forbidden",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
