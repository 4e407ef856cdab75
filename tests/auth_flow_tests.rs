//! End-to-end tests for the session credential flows.
//!
//! Covers registration and login token issuance, refresh token rotation and
//! replay rejection, logout and bulk revocation, and the bearer
//! authentication / role authorization boundary.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use fleetgate::db::Role;
use fleetgate::jwt::JwtConfig;
use std::time::Duration;

// =============================================================================
// Registration and Login
// =============================================================================

#[tokio::test]
async fn test_register_issues_access_token_and_refresh_cookie() {
    let (app, _db) = test_app().await;

    let response = send(
        &app,
        post_json(
            "/api/register",
            &serde_json::json!({
                "email": "alice@example.com",
                "firstName": "Alice",
                "lastName": "Smith",
                "password": "a-strong-password",
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let cookies = extract_set_cookies(&response);
    let refresh_cookie = cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .expect("No refresh cookie");
    assert!(refresh_cookie.contains("HttpOnly"));
    assert!(refresh_cookie.contains("SameSite=Strict"));
    assert!(refresh_cookie.contains("Path=/api/auth"));
    assert!(refresh_cookie.contains(&format!("Max-Age={}", REFRESH_TTL.as_secs())));

    // The access token verifies against the signing secret and carries the
    // default role
    let body = body_json(response).await;
    let access = body["accessToken"].as_str().expect("No access token");
    let jwt = JwtConfig::new(TEST_JWT_SECRET, ACCESS_TTL);
    let claims = jwt.verify_access_token(access).unwrap();
    assert_eq!(claims.role, Role::Viewer);
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() {
    let (app, _db) = test_app().await;

    register_user(&app, "alice@example.com").await;

    let response = send(
        &app,
        post_json(
            "/api/register",
            &serde_json::json!({
                "email": "alice@example.com",
                "firstName": "Other",
                "lastName": "Person",
                "password": "a-strong-password",
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let (app, _db) = test_app().await;

    let cases = [
        serde_json::json!({
            "email": "not-an-email", "firstName": "A", "lastName": "B",
            "password": "a-strong-password",
        }),
        serde_json::json!({
            "email": "a@example.com", "firstName": "A", "lastName": "B",
            "password": "short",
        }),
        serde_json::json!({
            "email": "a@example.com", "firstName": "", "lastName": "B",
            "password": "a-strong-password",
        }),
    ];

    for case in &cases {
        let response = send(&app, post_json("/api/register", case)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "case: {case}");
    }
}

#[tokio::test]
async fn test_login_returns_fresh_tokens() {
    let (app, _db) = test_app().await;
    let (_, refresh_at_register) = register_user(&app, "alice@example.com").await;

    let (access, refresh_at_login) = login_user(&app, "alice@example.com").await;

    assert!(!access.is_empty());
    assert_ne!(refresh_at_login, refresh_at_register);
}

#[tokio::test]
async fn test_login_bad_credentials_are_indistinguishable() {
    let (app, _db) = test_app().await;
    register_user(&app, "alice@example.com").await;

    let wrong_password = send(
        &app,
        post_json(
            "/api/login",
            &serde_json::json!({ "email": "alice@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let unknown_email = send(
        &app,
        post_json(
            "/api/login",
            &serde_json::json!({ "email": "nobody@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    // Same generic message for both failure modes
    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a["error"], b["error"]);
}

// =============================================================================
// Refresh and Rotation
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_token_and_rejects_predecessor() {
    let (app, _db) = test_app().await;
    let (_, old_refresh) = register_user(&app, "alice@example.com").await;

    let response = send(&app, refresh_request_with_cookie(&old_refresh)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    let new_refresh = refresh_cookie_value(&cookies).expect("No rotated cookie");
    assert_ne!(new_refresh, old_refresh);

    let body = body_json(response).await;
    assert!(body["accessToken"].as_str().is_some());

    // The consumed token is dead on arrival
    let replay = send(&app, refresh_request_with_cookie(&old_refresh)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_accepts_token_in_body() {
    let (app, _db) = test_app().await;
    let (_, refresh) = register_user(&app, "alice@example.com").await;

    let response = send(
        &app,
        post_json(
            "/api/auth/refresh",
            &serde_json::json!({ "refreshToken": refresh }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_token_is_bad_request() {
    let (app, _db) = test_app().await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/refresh")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_with_forged_token_unauthorized() {
    let (app, _db) = test_app().await;
    register_user(&app, "alice@example.com").await;

    let response = send(&app, refresh_request_with_cookie("forged-token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_refresh_token_rejected() {
    // Zero refresh TTL: every issued token is already at its expiry
    let (app, _db) = test_app_with_ttls(ACCESS_TTL, Duration::from_secs(0)).await;
    let (_, refresh) = register_user(&app, "alice@example.com").await;

    let response = send(&app, refresh_request_with_cookie(&refresh)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_replay_after_rotation_burns_lineage() {
    let (app, _db) = test_app().await;
    let (_, stolen) = register_user(&app, "alice@example.com").await;

    // Legitimate rotation
    let response = send(&app, refresh_request_with_cookie(&stolen)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let successor = refresh_cookie_value(&extract_set_cookies(&response)).unwrap();

    // Replay of the consumed token
    let replay = send(&app, refresh_request_with_cookie(&stolen)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // The replay revoked the successor too: neither branch survives
    let response = send(&app, refresh_request_with_cookie(&successor)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Logout and Bulk Revocation
// =============================================================================

#[tokio::test]
async fn test_logout_revokes_token_and_clears_cookie() {
    let (app, _db) = test_app().await;
    let (_, refresh) = register_user(&app, "alice@example.com").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .header("cookie", format!("refresh_token={}", refresh))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(has_cleared_refresh_cookie(&extract_set_cookies(&response)));

    let replay = send(&app, refresh_request_with_cookie(&refresh)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_token_still_succeeds() {
    let (app, _db) = test_app().await;

    for _ in 0..2 {
        let response = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn test_revoke_all_kills_every_session() {
    let (app, _db) = test_app().await;
    let (_, session1) = register_user(&app, "alice@example.com").await;
    let (access, session2) = login_user(&app, "alice@example.com").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/revoke-all")
            .header("authorization", format!("Bearer {}", access))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(has_cleared_refresh_cookie(&extract_set_cookies(&response)));

    for session in [&session1, &session2] {
        let replay = send(&app, refresh_request_with_cookie(session)).await;
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_revoke_all_requires_authentication() {
    let (app, _db) = test_app().await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/revoke-all")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoke_all_scoped_to_caller() {
    let (app, _db) = test_app().await;
    let (access, _) = register_user(&app, "alice@example.com").await;
    let (_, bob_refresh) = register_user(&app, "bob@example.com").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/revoke-all")
            .header("authorization", format!("Bearer {}", access))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Bob's session is untouched
    let response = send(&app, refresh_request_with_cookie(&bob_refresh)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Bearer Authentication and Role Authorization
// =============================================================================

fn get_users_request(bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/users");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_users_requires_bearer_token() {
    let (app, _db) = test_app().await;

    let response = send(&app, get_users_request(None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, get_users_request(Some("garbage"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong scheme
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/api/users")
            .header("authorization", "Token abc")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_users_forbidden_for_viewers() {
    let (app, _db) = test_app().await;
    let (access, _) = register_user(&app, "viewer@example.com").await;

    let response = send(&app, get_users_request(Some(&access))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_users_listed_for_staff_roles() {
    let (app, db) = test_app().await;
    register_user(&app, "viewer@example.com").await;

    let jwt = JwtConfig::new(TEST_JWT_SECRET, ACCESS_TTL);
    for (email, role) in [
        ("admin@example.com", Role::Admin),
        ("team@example.com", Role::Team),
    ] {
        let id = db
            .users()
            .create(email, "Staff", "Member", "x", role)
            .await
            .unwrap();
        let access = jwt.mint_access_token(id, role).unwrap();

        let response = send(&app, get_users_request(Some(&access))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let users = body["users"].as_array().expect("No users array");
        assert!(!users.is_empty());
        // Password hashes never leave the store
        assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
    }
}

#[tokio::test]
async fn test_tampered_bearer_token_rejected() {
    let (app, _db) = test_app().await;

    // Signed with a different secret
    let foreign_jwt = JwtConfig::new(b"some-other-secret-entirely-here!", ACCESS_TTL);
    let forged = foreign_jwt.mint_access_token(1, Role::Admin).unwrap();

    let response = send(&app, get_users_request(Some(&forged))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_healthz() {
    let (app, _db) = test_app().await;

    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/api/healthz")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
