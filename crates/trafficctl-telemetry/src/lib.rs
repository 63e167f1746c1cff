//! Prometheus metrics and structured logging for the traffic controller console.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus counters/gauges for polling, staleness, and command dispatch

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
