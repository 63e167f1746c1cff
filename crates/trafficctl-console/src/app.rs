//! Console application: one-shot commands and the monitor loop.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use trafficctl_client::{DynControllerApi, HttpControllerApi};
use trafficctl_core::ControlCommand;
use trafficctl_sync::{
    AnalyticsSynchronizer, CommandDispatcher, ControllerSession, Notification, StatusHandle,
};

use crate::cli::{override_states, Command};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::metrics_server::run_metrics_server;
use crate::render;

/// Main application.
pub struct Application {
    config: AppConfig,
    api: DynControllerApi,
}

impl Application {
    /// Create an application talking HTTP to `config.controller`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let api = Arc::new(HttpControllerApi::new(&config.controller)?);
        info!(controller = %api.base_url(), "Controller client ready");
        Ok(Self::with_api(config, api))
    }

    pub fn with_api(config: AppConfig, api: DynControllerApi) -> Self {
        Self { config, api }
    }

    /// Run one CLI command to completion.
    pub async fn run(&self, command: Command) -> AppResult<()> {
        match command {
            Command::Monitor => {
                let shutdown = CancellationToken::new();
                let on_signal = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Shutdown signal received");
                    }
                    on_signal.cancel();
                });
                self.monitor(shutdown).await
            }
            Command::Status => print_lines(&self.status_report().await?),
            Command::Start => self.print_dispatch(ControlCommand::Start).await,
            Command::Stop => self.print_dispatch(ControlCommand::Stop).await,
            Command::Override { off, states } => {
                let command = ControlCommand::manual_override(!off, override_states(&states)?);
                self.print_dispatch(command).await
            }
            Command::Analytics => print_lines(&self.analytics_report().await?),
        }
    }

    /// Status handle owned by a one-shot command.
    fn one_shot_status(&self, token: &CancellationToken) -> StatusHandle {
        StatusHandle::new(self.api.clone(), &self.config.polling, token.clone())
    }

    /// Fetch status once and render it.
    pub async fn status_report(&self) -> AppResult<Vec<String>> {
        let token = CancellationToken::new();
        let status = self.one_shot_status(&token);
        status.refresh().await;

        let current = status.current().ok_or_else(|| unavailable(&status))?;
        Ok(render::status_report(&current))
    }

    /// Dispatch `command` after reading status, so a no-op is recognised.
    pub async fn execute(&self, command: ControlCommand) -> AppResult<Notification> {
        let token = CancellationToken::new();
        let status = self.one_shot_status(&token);
        status.refresh().await;

        let dispatcher = CommandDispatcher::new(self.api.clone(), status);
        let report = dispatcher.dispatch(command).await?;
        token.cancel();

        let notification = report.notification();
        if notification.is_error() {
            return Err(AppError::Dispatch(notification.message()));
        }
        Ok(notification)
    }

    async fn print_dispatch(&self, command: ControlCommand) -> AppResult<()> {
        let notification = self.execute(command).await?;
        println!("{}", notification.message());
        Ok(())
    }

    /// Fetch analytics once and render it.
    pub async fn analytics_report(&self) -> AppResult<Vec<String>> {
        let analytics = AnalyticsSynchronizer::new(
            self.api.clone(),
            &self.config.polling,
            CancellationToken::new(),
        );
        analytics.refresh().await;

        let snapshot = analytics.current().ok_or_else(|| {
            AppError::Unavailable(
                analytics
                    .freshness()
                    .last_error
                    .unwrap_or_else(|| "no analytics".to_string()),
            )
        })?;
        Ok(render::analytics_report(&snapshot))
    }

    /// Run every synchronizer and log changes until `shutdown` fires.
    pub async fn monitor(&self, shutdown: CancellationToken) -> AppResult<()> {
        let mut session = ControllerSession::new(self.api.clone(), &self.config.polling)?;

        if let Some(port) = self.config.telemetry.metrics_port {
            let token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = run_metrics_server(port, token).await {
                    error!(error = %e, port, "Metrics server failed");
                }
            });
        }

        session.start();
        info!("Monitoring controller");

        let status = session.status();
        let mut status_rx = status.subscribe();
        let mut feeds_rx = session.cameras().subscribe();
        let mut analytics_rx = session.analytics().subscribe();
        let mut health = tokio::time::interval(self.config.polling.status_interval());
        let mut offline: Option<bool> = None;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,

                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status_rx.borrow_and_update().clone();
                    if let Some(current) = current {
                        info!(status = %render::status_summary(&current), "Status changed");
                    }
                }

                changed = feeds_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let feeds = feeds_rx.borrow_and_update().clone();
                    debug!(feeds = feeds.len(), "Camera cycle complete");
                    for feed in feeds.iter() {
                        trace!(feed = %render::feed_line(feed));
                    }
                }

                changed = analytics_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = analytics_rx.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        let derived = snapshot.derived();
                        info!(
                            period = %snapshot.current_period,
                            peak_hour = ?derived.peak_hour,
                            busiest_direction = ?derived.busiest_direction,
                            total_vehicles = derived.total_vehicles,
                            "Analytics refreshed"
                        );
                    }
                }

                _ = health.tick() => {
                    let freshness = status.freshness();
                    let polled = freshness.last_updated.is_some() || freshness.consecutive_failures > 0;
                    let now_offline = status.is_offline();
                    if polled && offline != Some(now_offline) {
                        if now_offline {
                            warn!(
                                freshness = %render::freshness_label(&freshness, true, Utc::now()),
                                last_error = ?freshness.last_error,
                                "Controller offline"
                            );
                        } else {
                            info!("Controller online");
                        }
                        offline = Some(now_offline);
                    }
                }
            }
        }

        shutdown.cancel();
        session.shutdown();
        Ok(())
    }
}

fn unavailable(status: &StatusHandle) -> AppError {
    AppError::Unavailable(
        status
            .freshness()
            .last_error
            .unwrap_or_else(|| "no status".to_string()),
    )
}

fn print_lines(lines: &[String]) -> AppResult<()> {
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
