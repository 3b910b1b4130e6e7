//! First-operator bootstrap.
//!
//! The back office has no sign-up, so the first operator comes from
//! configuration (`AS__BOOTSTRAP__OPERATOR_USERNAME` / `..._PASSWORD`). Once any
//! operator row exists this is a no-op.

use persistence::repositories::OperatorRepository;
use shared::password::{hash_password, PasswordError};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::BootstrapConfig;

/// Error types for operator bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordError),
}

/// What a bootstrap call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    NotConfigured,
    AlreadyBootstrapped,
    Created(i64),
}

fn configured(config: &BootstrapConfig) -> bool {
    if config.operator_username.trim().is_empty() {
        return false;
    }
    if config.operator_password.is_empty() {
        warn!("bootstrap.operator_username is set but bootstrap.operator_password is empty - skipping bootstrap");
        return false;
    }
    true
}

/// Creates the configured operator if the operators table is empty.
///
/// Call after migrations on startup.
pub async fn bootstrap_operator(
    pool: &PgPool,
    config: &BootstrapConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    if !configured(config) {
        return Ok(BootstrapOutcome::NotConfigured);
    }

    let repo = OperatorRepository::new(pool.clone());
    if repo.any_exists().await? {
        info!("Operators already exist - skipping bootstrap");
        return Ok(BootstrapOutcome::AlreadyBootstrapped);
    }

    let password_hash = hash_password(&config.operator_password)?;
    let username = config.operator_username.trim();
    let operator = repo.create(username, username, &password_hash, None).await?;

    info!(operator_id = operator.id, username = %username, "Bootstrapped first operator");
    Ok(BootstrapOutcome::Created(operator.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(username: &str, password: &str) -> BootstrapConfig {
        BootstrapConfig {
            operator_username: username.to_string(),
            operator_password: password.to_string(),
        }
    }

    #[test]
    fn test_empty_username_is_not_configured() {
        assert!(!configured(&config("", "secret-password")));
        assert!(!configured(&config("   ", "secret-password")));
    }

    #[test]
    fn test_missing_password_is_not_configured() {
        assert!(!configured(&config("root", "")));
    }

    #[test]
    fn test_username_and_password_configured() {
        assert!(configured(&config("root", "secret-password")));
    }

    #[tokio::test]
    async fn test_unconfigured_bootstrap_skips_database() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let outcome = bootstrap_operator(&pool, &BootstrapConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::NotConfigured);
    }
}
