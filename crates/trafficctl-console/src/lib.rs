//! Traffic signal controller console.
//!
//! Orchestrates the synchronization layer for an operator:
//! - `monitor`: status, camera, and analytics polling with change logging
//! - one-shot status and analytics reports
//! - start / stop / manual override dispatch
//! - optional Prometheus `/metrics` endpoint

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics_server;
pub mod render;

pub use app::Application;
pub use cli::{Args, Command};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
