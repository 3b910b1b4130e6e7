//! `x-token` authentication extractors.
//!
//! Customer routes take [`WebUser`], admin routes take [`ProjectOperator`].
//! Both validate the JWT for their audience and reject revoked tokens.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use domain::models::user::{Operator, User};
use persistence::repositories::{OperatorRepository, TokenBlacklistRepository, UserRepository};
use shared::jwt::{Audience, Claims, JwtError};

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "x-token";

/// Token string from the `x-token` header. A `Bearer ` prefix is tolerated.
pub fn token_from_parts(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
}

async fn authenticate(
    parts: &Parts,
    state: &AppState,
    audience: Audience,
) -> Result<Claims, ApiError> {
    let token = token_from_parts(parts)
        .ok_or_else(|| ApiError::Unauthorized("Missing x-token header".to_string()))?;

    let claims = state.jwt.validate(token, audience).map_err(|e| match e {
        JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
        JwtError::WrongAudience => {
            ApiError::Unauthorized("Token is not valid for this API".to_string())
        }
        _ => ApiError::Unauthorized("Invalid token".to_string()),
    })?;

    let revoked = TokenBlacklistRepository::new(state.pool.clone())
        .is_revoked(&claims.jti)
        .await?;
    if revoked {
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }

    Ok(claims)
}

/// Authenticated customer, loaded fresh on every request.
#[derive(Debug, Clone)]
pub struct WebUser {
    pub user: User,
    pub claims: Claims,
}

impl WebUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for WebUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = authenticate(parts, state, Audience::Web).await?;
        let repo = UserRepository::new(state.pool.clone());

        let mut user: User = repo
            .find_by_id(claims.id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?
            .into();

        let now = Utc::now();
        if user.lock_has_lapsed(now) {
            if let Some(unlocked) = repo.unlock(user.id).await? {
                tracing::info!(user_id = user.id, "Lapsed login lock cleared");
                user = unlocked.into();
            }
        }
        user.ensure_active(now)?;

        Ok(WebUser { user, claims })
    }
}

/// Authenticated back-office operator.
#[derive(Debug, Clone)]
pub struct ProjectOperator {
    pub operator: Operator,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for ProjectOperator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = authenticate(parts, state, Audience::Project).await?;

        let operator: Operator = OperatorRepository::new(state.pool.clone())
            .find_by_id(claims.id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Operator no longer exists".to_string()))?
            .into();

        if !operator.enabled {
            return Err(ApiError::Forbidden("Operator account is disabled".to_string()));
        }

        Ok(ProjectOperator { operator, claims })
    }
}
