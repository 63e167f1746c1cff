//! Traffic signal controller console - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use trafficctl_console::{AppConfig, Application, Args};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config before logging: the file may set the log level.
    let config_path = args.config_path();
    let (mut config, found) = AppConfig::load_or_default(&config_path)?;
    if let Some(base_url) = args.controller.clone() {
        config.controller.base_url = base_url;
    }

    trafficctl_telemetry::init_logging(config.telemetry.log_level.as_deref())?;
    info!("Starting trafficctl v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Configuration file not found, using defaults");
    }

    let app = Application::new(config)?;
    app.run(args.command).await?;

    Ok(())
}
