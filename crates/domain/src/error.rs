//! Domain error taxonomy.
//!
//! Every component surface returns `DomainResult`. The API layer maps each
//! kind to a distinct HTTP status; only `ExternalDependency` is retryable.

use thiserror::Error;

/// Errors produced by business rules and application services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-key collision, duplicate in-flight work or an illegal state transition.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A quota was exhausted; the message is shown to the end user.
    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("External dependency failed: {0}")]
    ExternalDependency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Illegal state-machine transition.
    pub fn illegal_transition(entity: &str, from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::Conflict(format!("{} cannot move from {} to {}", entity, from, to))
    }

    /// Whether an idempotent operation may be retried once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalDependency(_))
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();
        DomainError::InvalidInput(messages.join("; "))
    }
}

impl From<shared::cipher::CipherError> for DomainError {
    fn from(err: shared::cipher::CipherError) -> Self {
        DomainError::Internal(format!("Credential cipher: {}", err))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message_is_verbatim() {
        let err = DomainError::QuotaExceeded("今日下载次数已用完，请明天再试".into());
        assert_eq!(err.to_string(), "今日下载次数已用完，请明天再试");
    }

    #[test]
    fn test_illegal_transition_is_conflict() {
        let err = DomainError::illegal_transition("Order", "paid", "cancelled");
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(err.to_string(), "Conflict: Order cannot move from paid to cancelled");
    }

    #[test]
    fn test_only_external_dependency_retryable() {
        assert!(DomainError::ExternalDependency("oss".into()).is_retryable());
        assert!(!DomainError::Internal("x".into()).is_retryable());
        assert!(!DomainError::Conflict("x".into()).is_retryable());
    }
}
