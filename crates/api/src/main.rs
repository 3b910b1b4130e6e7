use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use app_shop_api::app::{create_app, AppState};
use app_shop_api::config::Config;
use app_shop_api::jobs::build_scheduler;
use app_shop_api::middleware::{init_metrics, logging::init_logging};
use app_shop_api::services::bootstrap::bootstrap_operator;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;

    init_logging(&config.logging).context("failed to initialize logging")?;
    init_metrics().context("failed to install metrics recorder")?;

    info!("Starting App Shop API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.pool_config()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    bootstrap_operator(&pool, &config.bootstrap)
        .await
        .context("failed to bootstrap operator")?;

    let addr = config.socket_addr()?;
    let jobs_enabled = config.jobs.enabled;
    let state = AppState::new(config, pool)?;

    let mut scheduler = jobs_enabled.then(|| build_scheduler(&state));
    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.start();
    }

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
