//! Refresh token lifecycle: issuance, rotation-on-use, revocation, and
//! replay detection.
//!
//! Raw refresh tokens are opaque random secrets handed to the client exactly
//! once; only their SHA-256 digest is persisted. Each token value is
//! single-use: rotation consumes the presented record and issues a successor
//! in one transactional step, so a given value can spawn at most one
//! successor no matter how many rotations race on it.

use std::time::Duration;

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::db::{Database, unix_now};

/// Length of the raw refresh token secret in bytes (256 bits).
const REFRESH_SECRET_LEN: usize = 32;

/// A freshly issued refresh token. `raw` is never derivable from stored
/// state again.
#[derive(Debug)]
pub struct IssuedToken {
    pub raw: String,
    pub expires_at: i64,
}

/// Result of a successful rotation.
#[derive(Debug)]
pub struct RotatedToken {
    pub user_id: i64,
    pub raw: String,
    pub expires_at: i64,
}

/// Outcomes of refresh token verification, kept internal: callers map all of
/// these to one generic unauthorized response so the API does not reveal
/// whether a token ever existed.
#[derive(Debug)]
pub enum SessionError {
    /// No record matches the presented token (forged or garbage)
    InvalidToken,
    /// The record was already consumed or logged out: the replay signal
    TokenRevoked,
    /// The record is past its expiry
    TokenExpired,
    /// Storage failure
    Store(sqlx::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidToken => write!(f, "Invalid refresh token"),
            SessionError::TokenRevoked => write!(f, "Refresh token revoked"),
            SessionError::TokenExpired => write!(f, "Refresh token expired"),
            SessionError::Store(e) => write!(f, "Token store error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Store(e)
    }
}

/// Orchestrates the refresh token lifecycle against the store.
///
/// Holds its database handle explicitly; construct one per process and pass
/// it into handler state.
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    refresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Database, refresh_ttl: Duration) -> Self {
        Self { db, refresh_ttl }
    }

    /// Issue a new refresh token for a user and return the raw secret.
    pub async fn issue(&self, user_id: i64) -> Result<IssuedToken, SessionError> {
        let raw = generate_secret();
        let expires_at = unix_now() + self.refresh_ttl.as_secs() as i64;

        // A digest collision trips the UNIQUE constraint and rejects the
        // issuance; with 256-bit secrets this is not a practical concern.
        self.db
            .refresh_tokens()
            .insert(user_id, &hash_token(&raw), expires_at)
            .await?;

        Ok(IssuedToken { raw, expires_at })
    }

    /// Verify a presented refresh token and rotate it.
    ///
    /// The presented record becomes unusable no later than its successor
    /// becomes usable; both effects commit together. Concurrent rotations of
    /// the same value: exactly one succeeds, the rest see `TokenRevoked`.
    ///
    /// A revoked token presented here is treated as a replayed credential:
    /// every outstanding session for the owning user is revoked before the
    /// error is returned, so a thief racing the legitimate client cannot keep
    /// either branch of the lineage alive.
    pub async fn rotate(&self, raw: &str) -> Result<RotatedToken, SessionError> {
        let store = self.db.refresh_tokens();

        let record = store
            .get_by_hash(&hash_token(raw))
            .await?
            .ok_or(SessionError::InvalidToken)?;

        if record.revoked {
            warn!(
                user_id = record.user_id,
                token_id = record.id,
                "Revoked refresh token presented again; revoking all sessions for user"
            );
            store.revoke_all_for_user(record.user_id).await?;
            return Err(SessionError::TokenRevoked);
        }

        let now = unix_now();
        if now >= record.expires_at {
            return Err(SessionError::TokenExpired);
        }

        let new_raw = generate_secret();
        let expires_at = now + self.refresh_ttl.as_secs() as i64;
        let rotated = store
            .rotate(record.id, record.user_id, &hash_token(&new_raw), expires_at)
            .await?;

        match rotated {
            Some(_) => Ok(RotatedToken {
                user_id: record.user_id,
                raw: new_raw,
                expires_at,
            }),
            // Lost the race: another rotation consumed the record between
            // our read and the conditional revoke.
            None => Err(SessionError::TokenRevoked),
        }
    }

    /// Revoke the presented token. Idempotent: unknown and already-revoked
    /// tokens succeed, so logout never fails from the caller's perspective.
    pub async fn revoke(&self, raw: &str) -> Result<(), SessionError> {
        self.db
            .refresh_tokens()
            .revoke_by_hash(&hash_token(raw))
            .await?;
        Ok(())
    }

    /// Revoke every outstanding refresh token for a user.
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, SessionError> {
        Ok(self.db.refresh_tokens().revoke_all_for_user(user_id).await?)
    }

    /// Whether the presented token matches a record that has been revoked.
    /// Diagnostic signal: distinguishes a replayed credential from one that
    /// never existed.
    pub async fn is_replayed(&self, raw: &str) -> Result<bool, SessionError> {
        let record = self.db.refresh_tokens().get_by_hash(&hash_token(raw)).await?;
        Ok(record.is_some_and(|r| r.revoked))
    }
}

/// Generate a raw refresh token secret: 256 bits of CSPRNG output,
/// base64url-encoded.
fn generate_secret() -> String {
    let mut secret = [0u8; REFRESH_SECRET_LEN];
    rand::rng().fill_bytes(&mut secret);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(secret)
}

/// One-way digest of a raw token secret, hex-encoded. This is the only form
/// that ever reaches storage or logs.
fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
