//! Success envelope shared by every JSON endpoint.

use axum::Json;
use serde::Serialize;

use crate::error::ApiError;

/// `code` on success.
pub const SUCCESS_CODE: i32 = 0;

/// `code` on any failure.
pub const FAILURE_CODE: i32 = 7;

/// `{ code, data, msg }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub data: T,
    pub msg: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Self::with_msg(data, "success")
    }

    pub fn with_msg(data: T, msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: SUCCESS_CODE,
            data,
            msg: msg.into(),
        })
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope() {
        let Json(body) = ApiResponse::ok(vec![1, 2]);
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["code"], 0);
        assert_eq!(value["data"], serde_json::json!([1, 2]));
        assert_eq!(value["msg"], "success");
    }

    #[test]
    fn test_unit_data_serializes_as_null() {
        let Json(body) = ApiResponse::with_msg((), "logged out");
        let value = serde_json::to_value(body).unwrap();
        assert!(value["data"].is_null());
        assert_eq!(value["msg"], "logged out");
    }
}
