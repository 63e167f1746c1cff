//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a configured level is given.
const DEFAULT_FILTER: &str = "info,trafficctl=debug";

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `level`. Output is JSON when
/// `RUST_ENV=production`, pretty otherwise.
pub fn init_logging(level: Option<&str>) -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_FILTER)))
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid log filter: {e}")))?;

    let is_production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let result = if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    tracing::info!(
        format = if is_production { "json" } else { "pretty" },
        "Logging initialized"
    );
    Ok(())
}
