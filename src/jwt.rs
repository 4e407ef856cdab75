//! Access token signing and verification.
//!
//! Access tokens are stateless: validity is re-derived on every request from
//! the signature and the expiry claim alone. Nothing here touches storage.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::Role;

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID, as a string per JWT convention)
    pub sub: String,
    /// User role
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl AccessClaims {
    /// Parse the subject back into a user ID.
    pub fn user_id(&self) -> Result<i64, JwtError> {
        self.sub.parse().map_err(|_| JwtError::Malformed)
    }
}

/// Configuration for access token operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and token lifetime.
    pub fn new(secret: &[u8], access_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
        }
    }

    /// Sign a new access token for a user.
    pub fn mint_access_token(&self, user_id: i64, role: Role) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let claims = AccessClaims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now + self.access_ttl.as_secs(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify and decode an access token.
    ///
    /// Both the signature and the expiry are always checked, with zero clock
    /// skew tolerance: a token is valid at `exp - 1` and invalid at `exp`.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(
                |e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                    _ => JwtError::Malformed,
                },
            )?;

        // The library treats a token as live until exp has passed; the
        // contract here is exclusive: valid at exp - 1, invalid at exp.
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();
        if now >= token_data.claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(token_data.claims)
    }
}

/// Errors that can occur during access token operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Signature does not match (tampered or foreign token)
    InvalidSignature,
    /// Token is past its expiry
    Expired,
    /// Structurally invalid token or claims
    Malformed,
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::InvalidSignature => write!(f, "Invalid token signature"),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::Malformed => write!(f, "Malformed token"),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}
