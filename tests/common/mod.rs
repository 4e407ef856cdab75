#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use fleetgate::rate_limit::RateLimitConfig;
use fleetgate::{ServerConfig, create_app, db::Database};
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-for-testing-only";

pub const ACCESS_TTL: Duration = Duration::from_secs(900);
pub const REFRESH_TTL: Duration = Duration::from_secs(604_800);

/// Create a test app backed by an in-memory database.
pub async fn test_app() -> (Router, Database) {
    test_app_with_ttls(ACCESS_TTL, REFRESH_TTL).await
}

/// Create a test app with explicit token lifetimes.
pub async fn test_app_with_ttls(access_ttl: Duration, refresh_ttl: Duration) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        access_ttl,
        refresh_ttl,
        secure_cookies: false, // Tests run without HTTPS
        rate_limits: RateLimitConfig::relaxed(),
    };
    (create_app(&config), db)
}

/// Send a request through the app.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("Request failed")
}

/// Build a JSON POST request.
pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Extract Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Pull the refresh token value out of a Set-Cookie header list.
pub fn refresh_cookie_value(cookies: &[String]) -> Option<String> {
    cookies.iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';')?;
        let (name, value) = pair.split_once('=')?;
        if name == "refresh_token" && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Check if the cookie list clears the refresh token (Max-Age=0).
pub fn has_cleared_refresh_cookie(cookies: &[String]) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with("refresh_token=;") && c.contains("Max-Age=0"))
}

/// Register a user through the API. Returns (access_token, raw_refresh_token).
pub async fn register_user(app: &Router, email: &str) -> (String, String) {
    let response = send(
        app,
        post_json(
            "/api/register",
            &serde_json::json!({
                "email": email,
                "firstName": "Test",
                "lastName": "User",
                "password": "a-strong-password",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let cookies = extract_set_cookies(&response);
    let refresh = refresh_cookie_value(&cookies).expect("No refresh cookie set");
    let body = body_json(response).await;
    let access = body["accessToken"]
        .as_str()
        .expect("No access token in body")
        .to_string();
    (access, refresh)
}

/// Log a registered user in. Returns (access_token, raw_refresh_token).
pub async fn login_user(app: &Router, email: &str) -> (String, String) {
    let response = send(
        app,
        post_json(
            "/api/login",
            &serde_json::json!({
                "email": email,
                "password": "a-strong-password",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    let refresh = refresh_cookie_value(&cookies).expect("No refresh cookie set");
    let body = body_json(response).await;
    let access = body["accessToken"]
        .as_str()
        .expect("No access token in body")
        .to_string();
    (access, refresh)
}

/// POST to the refresh endpoint with the given raw token in the cookie.
pub fn refresh_request_with_cookie(raw_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/refresh")
        .header("cookie", format!("refresh_token={}", raw_token))
        .body(Body::empty())
        .expect("Failed to build request")
}
