//! JWT token utilities for the `x-token` header.
//!
//! Tokens are signed with HS256 using a shared secret. Claims carry the
//! numeric user id, the public user uuid and the username, plus an audience
//! that separates customer tokens (`web`) from operator tokens (`project`).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token audience mismatch")]
    WrongAudience,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Which API namespace a token is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// Customer API under `/web/*`.
    Web,
    /// Admin API under `/project/*`.
    Project,
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user (or operator) id
    pub id: i64,
    /// Public user uuid
    pub uuid: Uuid,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID (unique token identifier for revocation)
    pub jti: String,
    pub aud: Audience,
}

impl Claims {
    /// Seconds until the token expires, never negative.
    pub fn remaining_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// An issued token together with its revocation handle.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

/// Configuration for JWT token generation and validation.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Token lifetime in seconds
    pub expiry_secs: i64,
    /// Leeway in seconds for clock skew tolerance
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("expiry_secs", &self.expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Minimum secret length accepted for HS256.
const MIN_SECRET_LEN: usize = 32;

impl JwtConfig {
    /// Creates a new JwtConfig from a shared HS256 secret.
    pub fn new(secret: &str, expiry_secs: i64, leeway_secs: u64) -> Result<Self, JwtError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::InvalidKey(format!(
                "secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_secs,
            leeway_secs,
        })
    }

    /// Issues a token for the given identity and audience.
    pub fn issue(
        &self,
        id: i64,
        uuid: Uuid,
        username: &str,
        aud: Audience,
    ) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let exp = (now + Duration::seconds(self.expiry_secs)).timestamp();

        let claims = Claims {
            id,
            uuid,
            username: username.to_string(),
            exp,
            iat: now.timestamp(),
            jti: jti.clone(),
            aud,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at: exp,
        })
    }

    /// Validates a token and checks that it was issued for `expected`.
    pub fn validate(&self, token: &str, expected: Audience) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        // The audience is a custom enum claim, checked below.
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken,
            }
        })?;

        if data.claims.aud != expected {
            return Err(JwtError::WrongAudience);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config() -> JwtConfig {
        JwtConfig::new(SECRET, 3600, 0).unwrap()
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            JwtConfig::new("short", 3600, 0),
            Err(JwtError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_issue_and_validate() {
        let cfg = config();
        let uuid = Uuid::new_v4();
        let issued = cfg.issue(42, uuid, "alice", Audience::Web).unwrap();

        let claims = cfg.validate(&issued.token, Audience::Web).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.uuid, uuid);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.jti, issued.jti);
        assert!(claims.remaining_secs() > 3500);
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let cfg = config();
        let issued = cfg.issue(1, Uuid::new_v4(), "bob", Audience::Web).unwrap();
        assert!(matches!(
            cfg.validate(&issued.token, Audience::Project),
            Err(JwtError::WrongAudience)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let cfg = JwtConfig::new(SECRET, -120, 0).unwrap();
        let issued = cfg.issue(1, Uuid::new_v4(), "bob", Audience::Web).unwrap();
        assert!(matches!(
            cfg.validate(&issued.token, Audience::Web),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let cfg = config();
        let issued = cfg.issue(1, Uuid::new_v4(), "bob", Audience::Web).unwrap();
        let other = JwtConfig::new("ffffffffffffffffffffffffffffffff", 3600, 0).unwrap();
        assert!(matches!(
            other.validate(&issued.token, Audience::Web),
            Err(JwtError::InvalidToken)
        ));
    }
}
