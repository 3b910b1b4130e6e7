//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub storage: StorageHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
    pub pool_size: u32,
    pub idle_connections: usize,
}

/// Object store wiring. Signing is local, so only the provider is reported.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageHealth {
    pub provider: String,
    pub bucket: String,
}

/// Simple status response for liveness and readiness checks.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let start = std::time::Instant::now();
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    let response = HealthResponse {
        status: if db_connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected: db_connected,
            latency_ms: db_connected.then_some(latency_ms),
            pool_size: state.pool.size(),
            idle_connections: state.pool.num_idle(),
        },
        storage: StorageHealth {
            provider: state.config.storage.provider.clone(),
            bucket: state.config.storage.bucket.clone(),
        },
    };

    if db_connected {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Liveness check endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness check endpoint.
///
/// Returns 200 OK if the service can accept traffic (database connected).
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    if db_connected {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(connected: bool) -> HealthResponse {
        HealthResponse {
            status: if connected { "healthy" } else { "unhealthy" }.to_string(),
            version: "0.1.0".to_string(),
            database: DatabaseHealth {
                connected,
                latency_ms: connected.then_some(5),
                pool_size: 2,
                idle_connections: 1,
            },
            storage: StorageHealth {
                provider: "mock".to_string(),
                bucket: "apps".to_string(),
            },
        }
    }

    #[test]
    fn test_health_response_serialization() {
        let json = serde_json::to_value(response(true)).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"]["latency_ms"], 5);
        assert_eq!(json["database"]["pool_size"], 2);
        assert_eq!(json["storage"]["provider"], "mock");
    }

    #[test]
    fn test_unhealthy_has_no_latency() {
        let json = serde_json::to_value(response(false)).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert!(json["database"]["latency_ms"].is_null());
    }

    #[tokio::test]
    async fn test_live() {
        let Json(body) = live().await;
        assert_eq!(body.status, "alive");
    }
}
