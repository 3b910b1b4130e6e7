//! Logging initialization.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
///
/// sqlx statement logging is capped at `warn` unless `RUST_LOG` says otherwise.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.level)))
}

/// Installs the global subscriber. `json` for production, `pretty` or
/// `compact` for local runs.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(build_filter(config));

    match config.format.as_str() {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        "compact" => subscriber
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
        _ => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(true),
            )
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_uses_configured_level() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "debug".into(),
            format: "json".into(),
        };
        let filter = build_filter(&config).to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("sqlx=warn"));
    }
}
