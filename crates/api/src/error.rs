use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use persistence::PersistenceError;
use serde::Serialize;
use thiserror::Error;

use crate::response::FAILURE_CODE;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Message is shown to the end user as-is.
    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Failure envelope: `{ code: 7, data: null, msg }`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: i32,
    data: Option<()>,
    msg: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::QuotaExceeded(_) | ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PreconditionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Validation(msg)
            | ApiError::QuotaExceeded(msg)
            | ApiError::PreconditionFailed(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::RateLimited => "Too many requests. Please try again later.".into(),
            ApiError::Upstream(msg) => {
                tracing::warn!("Upstream dependency failed: {}", msg);
                "A dependent service is unavailable, please retry".into()
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".into()
            }
        };

        let body = ErrorBody {
            code: FAILURE_CODE,
            data: None,
            msg,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidInput(msg) => ApiError::Validation(msg),
            DomainError::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            DomainError::Unauthorized(msg) => ApiError::Forbidden(msg),
            DomainError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::QuotaExceeded(msg) => ApiError::QuotaExceeded(msg),
            DomainError::PreconditionFailed(msg) => ApiError::PreconditionFailed(msg),
            DomainError::ExternalDependency(msg) => ApiError::Upstream(msg),
            DomainError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Database(e) => e.into(),
            PersistenceError::Domain(e) => e.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::QuotaExceeded("x".into()).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::PreconditionFailed("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::ServiceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let (status, body) = body_json(ApiError::Conflict("already exists".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 7);
        assert!(body["data"].is_null());
        assert_eq!(body["msg"], "already exists");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (_, body) = body_json(ApiError::Internal("connection refused".into())).await;
        assert_eq!(body["msg"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_quota_message_is_passed_through() {
        let err: ApiError = DomainError::QuotaExceeded("今日下载次数已用完，请明天再试".into()).into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["msg"], "今日下载次数已用完，请明天再试");
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Unauthorized("test".to_string())),
            "Unauthorized: test"
        );
        assert_eq!(
            format!("{}", ApiError::Validation("test".to_string())),
            "Validation error: test"
        );
        assert_eq!(format!("{}", ApiError::QuotaExceeded("test".to_string())), "test");
        assert_eq!(format!("{}", ApiError::RateLimited), "Rate limited");
        assert_eq!(
            format!("{}", ApiError::PreconditionFailed("test".to_string())),
            "Precondition failed: test"
        );
    }

    #[test]
    fn test_from_domain_error() {
        assert!(matches!(
            ApiError::from(DomainError::invalid("bad")),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(DomainError::Unauthenticated("sig".into())),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(DomainError::Unauthorized("locked".into())),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(DomainError::illegal_transition("Order", "paid", "cancelled")),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(DomainError::precondition("tier")),
            ApiError::PreconditionFailed(_)
        ));
        assert!(matches!(
            ApiError::from(DomainError::ExternalDependency("oss".into())),
            ApiError::Upstream(_)
        ));
        match ApiError::from(DomainError::not_found("Order 7")) {
            ApiError::NotFound(msg) => assert_eq!(msg, "Order 7 not found"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_from_persistence_error() {
        let err: ApiError = PersistenceError::Domain(DomainError::conflict("sold")).into();
        assert!(matches!(err, ApiError::Conflict(_)));

        let err: ApiError = PersistenceError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        match error {
            ApiError::NotFound(msg) => assert_eq!(msg, "Resource not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_from_validation_errors() {
        use validator::Validate;

        let request = domain::models::user::LoginRequest {
            username: String::new(),
            password: "secret".into(),
        };
        let err: ApiError = request.validate().unwrap_err().into();
        match err {
            ApiError::Validation(msg) => assert_eq!(msg, "Username is required"),
            other => panic!("Expected Validation, got {:?}", other),
        }
    }
}
