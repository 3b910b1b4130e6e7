use axum::{middleware, routing::get, Router};
use domain::services::calendar::BusinessCalendar;
use domain::services::ports::{AccountCipher, CallbackVerifier, HmacCallbackVerifier, ObjectStore};
use shared::cipher::{CipherError, CredentialCipher};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    login_rate_limit, metrics_handler, metrics_middleware, security_headers_middleware, trace_id,
    RateLimiterState,
};
use crate::routes::{
    app_accounts, applications, auth, commission, downloads, health, memberships, orders, packages,
    payments, plans, refunds, sys_config, withdrawals,
};
use crate::services::object_store::build_object_store;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub object_store: Arc<dyn ObjectStore>,
    pub cipher: Arc<dyn AccountCipher>,
    pub verifier: Arc<dyn CallbackVerifier>,
    pub calendar: BusinessCalendar,
    pub login_limiter: Option<Arc<RateLimiterState>>,
}

/// Failures while turning configuration into live collaborators.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),

    #[error("invalid account cipher key: {0}")]
    Cipher(#[from] CipherError),

    #[error("utc offset {0}s is out of range")]
    Calendar(i32),
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Result<Self, StartupError> {
        let jwt = JwtConfig::new(
            &config.jwt.secret,
            config.jwt.expiry_secs,
            config.jwt.leeway_secs,
        )?;
        let cipher = CredentialCipher::from_base64_key(&config.crypto.account_cipher_key)?;
        let calendar = BusinessCalendar::new(config.jobs.utc_offset_secs)
            .ok_or(StartupError::Calendar(config.jobs.utc_offset_secs))?;

        // Login throttling is disabled when the quota is 0
        let login_limiter = (config.security.login_rate_limit_per_minute > 0).then(|| {
            Arc::new(RateLimiterState::new(
                config.security.login_rate_limit_per_minute,
            ))
        });

        Ok(Self {
            pool,
            object_store: build_object_store(&config.storage),
            jwt: Arc::new(jwt),
            cipher: Arc::new(cipher),
            verifier: Arc::new(HmacCallbackVerifier),
            calendar,
            login_limiter,
            config: Arc::new(config),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Login endpoints are throttled per client IP
    let mut login_routes = auth::login_router();
    if let Some(limiter) = state.login_limiter.clone() {
        login_routes =
            login_routes.route_layer(middleware::from_fn_with_state(limiter, login_rate_limit));
    }

    // Customer API (x-token with the web audience)
    let web_routes = Router::new()
        .merge(auth::web_router())
        .merge(downloads::router())
        .merge(memberships::router())
        .merge(plans::web_router())
        .merge(orders::web_router())
        .merge(commission::web_router())
        .merge(withdrawals::web_router());

    // Back-office API (x-token with the project audience)
    let project_routes = Router::new()
        .merge(auth::project_router())
        .merge(plans::project_router())
        .merge(applications::router())
        .merge(packages::router())
        .merge(app_accounts::router())
        .merge(orders::project_router())
        .merge(payments::project_router())
        .merge(refunds::router())
        .merge(commission::project_router())
        .merge(withdrawals::project_router())
        .merge(sys_config::router());

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .merge(payments::callback_router());

    Router::new()
        .merge(public_routes)
        .merge(login_routes)
        .nest("/web", web_routes)
        .nest("/project", project_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
