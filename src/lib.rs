pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod sessions;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use sessions::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Process-wide configuration, built once at startup and read-only after.
pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Whether to set the Secure flag on cookies (true in production with HTTPS)
    pub secure_cookies: bool,
    /// Per-IP quotas for the auth endpoints
    pub rate_limits: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret, config.access_ttl));
    let sessions = SessionManager::new(config.db.clone(), config.refresh_ttl);

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        sessions,
        config.secure_cookies,
        config.refresh_ttl.as_secs() as i64,
        Arc::new(config.rate_limits.clone()),
    );

    Router::new().nest("/api", api_router)
}

/// Run cleanup tasks and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
