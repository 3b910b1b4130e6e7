//! Errors surfaced by repositories that do more than run SQL.

use domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<PersistenceError> for DomainError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Domain(e) => e,
            PersistenceError::Database(e) => DomainError::internal(e.to_string()),
        }
    }
}

/// Whether `err` is a unique-constraint violation, optionally on a named constraint.
pub fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match constraint {
            Some(name) => db.constraint() == Some(name),
            None => true,
        },
        _ => false,
    }
}
