//! Login, logout and the operator TOTP gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::models::user::{
    register_failed_login, AccountStatus, LoginRequest, LoginResponse, Operator, RegisterRequest,
    User,
};
use persistence::error::is_unique_violation;
use persistence::repositories::user::REFERRAL_CODE_CONSTRAINT;
use persistence::repositories::{
    NewUser, OperatorRepository, TokenBlacklistRepository, UserRepository,
};
use shared::jwt::{Audience, Claims, JwtConfig};
use shared::numbering::referral_code;
use shared::password::{hash_password, verify_password};
use shared::totp::{verify_code, TotpError};
use sqlx::PgPool;
use tracing::{info, warn};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::metrics::record_login;

const BAD_CREDENTIALS: &str = "Invalid username or password";
const REFERRAL_CODE_ATTEMPTS: u32 = 3;

/// Issues and revokes `x-token` sessions for both namespaces.
#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self { pool, jwt }
    }

    /// Creates a customer and signs them in. An unknown referral code is rejected
    /// rather than silently dropped.
    pub async fn register(&self, request: &RegisterRequest) -> Result<LoginResponse, ApiError> {
        request.validate()?;
        let repo = UserRepository::new(self.pool.clone());

        let referrer_id = match request.referral_code.as_deref() {
            Some(code) => Some(
                repo.find_by_referral_code(code)
                    .await?
                    .ok_or_else(|| ApiError::Validation("Unknown referral code".to_string()))?
                    .id,
            ),
            None => None,
        };

        let password_hash = hash_password(&request.password)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut attempt = 0;
        let user: User = loop {
            attempt += 1;
            let code = referral_code();
            let new_user = NewUser {
                username: &request.username,
                email: &request.email,
                phone: request.phone.as_deref(),
                password_hash: &password_hash,
                referral_code: &code,
                referrer_id,
            };
            match repo.create(&new_user).await {
                Ok(entity) => break entity.into(),
                Err(e)
                    if attempt < REFERRAL_CODE_ATTEMPTS
                        && is_unique_violation(&e, Some(REFERRAL_CODE_CONSTRAINT)) =>
                {
                    warn!(attempt, "Referral code collision, retrying");
                }
                Err(e) if is_unique_violation(&e, None) => {
                    return Err(ApiError::Conflict(
                        "Username, email or phone is already registered".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        };

        let issued = self
            .jwt
            .issue(user.id, user.uuid, &user.username, Audience::Web)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        info!(user_id = user.id, referrer_id = ?user.referrer_id, "User registered");

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user_id: user.id,
            username: user.username,
        })
    }

    /// Customer login with lockout after repeated failures.
    pub async fn web_login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        request.validate()?;
        let repo = UserRepository::new(self.pool.clone());
        let now = Utc::now();

        let Some(entity) = repo.find_by_username(&request.username).await? else {
            record_login("web", "failure");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
        };
        let mut user: User = entity.into();

        if user.lock_has_lapsed(now) {
            if let Some(unlocked) = repo.unlock(user.id).await? {
                user = unlocked.into();
            }
        }
        // Locked accounts are refused before the password is checked.
        if user.effective_status(now) == AccountStatus::Locked {
            record_login("web", "locked");
            user.ensure_active(now)?;
        }

        let matches = verify_password(&request.password, &user.password_hash)
            .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;

        if !matches {
            let failure = register_failed_login(user.failed_login_attempts, now);
            repo.record_login_failure(user.id, failure.attempts, failure.locked_until)
                .await?;
            if let Some(until) = failure.locked_until {
                warn!(user_id = user.id, locked_until = %until, "User locked after repeated login failures");
            }
            record_login("web", "failure");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }

        user.ensure_active(now)?;
        if user.failed_login_attempts > 0 {
            repo.reset_login_failures(user.id).await?;
        }

        let issued = self
            .jwt
            .issue(user.id, user.uuid, &user.username, Audience::Web)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        record_login("web", "success");
        info!(user_id = user.id, "User logged in");

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user_id: user.id,
            username: user.username,
        })
    }

    /// Operator login for the admin namespace.
    pub async fn project_login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        request.validate()?;

        let operator: Option<Operator> = OperatorRepository::new(self.pool.clone())
            .find_by_username(&request.username)
            .await?
            .map(Into::into);

        let Some(operator) = operator else {
            record_login("project", "failure");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
        };

        let matches = verify_password(&request.password, &operator.password_hash)
            .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
        if !matches {
            record_login("project", "failure");
            warn!(operator = %operator.username, "Operator login failed");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
        if !operator.enabled {
            return Err(ApiError::Forbidden("Operator account is disabled".to_string()));
        }

        let issued = self
            .jwt
            .issue(operator.id, operator.uuid, &operator.username, Audience::Project)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        record_login("project", "success");
        info!(operator_id = operator.id, "Operator logged in");

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user_id: operator.id,
            username: operator.username,
        })
    }

    /// Blacklists the token until its own expiry.
    pub async fn logout(&self, claims: &Claims) -> Result<(), ApiError> {
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        TokenBlacklistRepository::new(self.pool.clone())
            .revoke(&claims.jti, expires_at)
            .await?;
        info!(subject = claims.id, aud = ?claims.aud, "Token revoked");
        Ok(())
    }
}

/// Requires a current TOTP code from the operator before a sensitive action.
pub fn ensure_totp(operator: &Operator, code: Option<&str>) -> Result<(), ApiError> {
    let secret = operator.totp_secret.as_deref().ok_or_else(|| {
        ApiError::Forbidden("Two-factor authentication is not set up for this operator".to_string())
    })?;
    let code = code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("TOTP code is required".to_string()))?;

    match verify_code(secret, &operator.username, code) {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(operator_id = operator.id, "Rejected TOTP code");
            Err(ApiError::Forbidden("Invalid TOTP code".to_string()))
        }
        Err(TotpError::MalformedCode) => Err(ApiError::Validation(
            "TOTP code must be 6 digits".to_string(),
        )),
        Err(e @ TotpError::InvalidSecret(_)) => Err(ApiError::Internal(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::totp::{current_code, encode_secret};
    use uuid::Uuid;

    fn operator(secret: Option<String>) -> Operator {
        Operator {
            id: 1,
            uuid: Uuid::new_v4(),
            username: "ops".into(),
            nick_name: "Ops".into(),
            password_hash: String::new(),
            totp_secret: secret,
            enabled: true,
        }
    }

    fn secret() -> String {
        encode_secret(b"0123456789abcdef0123")
    }

    #[test]
    fn test_totp_accepts_current_code() {
        let secret = secret();
        let code = current_code(&secret, "ops").unwrap();
        assert!(ensure_totp(&operator(Some(secret)), Some(&code)).is_ok());
    }

    #[test]
    fn test_totp_requires_code() {
        let err = ensure_totp(&operator(Some(secret())), None).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_totp_rejects_malformed_code() {
        let err = ensure_totp(&operator(Some(secret())), Some("12ab")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_totp_without_secret_is_forbidden() {
        let err = ensure_totp(&operator(None), Some("123456")).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
