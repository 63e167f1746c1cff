//! Analytics synchronizer.
//!
//! Polls `GET /api/analytics` once on start and then on a slow interval.
//! Derived metrics are computed on read from whichever snapshot is held.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trafficctl_client::{DynControllerApi, Endpoint};
use trafficctl_core::{AnalyticsSnapshot, DerivedMetrics};

use crate::config::PollingConfig;
use crate::snapshot::{Freshness, RefreshOutcome, SnapshotCell};

struct AnalyticsInner {
    api: DynControllerApi,
    cell: SnapshotCell<AnalyticsSnapshot>,
}

impl AnalyticsInner {
    async fn refresh(&self, token: &CancellationToken) -> RefreshOutcome {
        let outcome = self.cell.poll(token, self.api.fetch_analytics()).await;
        if outcome == RefreshOutcome::Applied {
            if let Some(snapshot) = self.cell.current() {
                let derived = snapshot.derived();
                debug!(
                    period = %snapshot.current_period,
                    peak_hour = ?derived.peak_hour,
                    busiest_direction = ?derived.busiest_direction,
                    total_vehicles = derived.total_vehicles,
                    "Analytics updated"
                );
            }
        }
        outcome
    }
}

pub struct AnalyticsSynchronizer {
    inner: Arc<AnalyticsInner>,
    token: CancellationToken,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl AnalyticsSynchronizer {
    pub fn new(api: DynControllerApi, config: &PollingConfig, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(AnalyticsInner {
                api,
                cell: SnapshotCell::new(Endpoint::Analytics.label(), config.offline_after_failures),
            }),
            token,
            interval: config.analytics_interval(),
            task: None,
        }
    }

    /// Spawn the polling task. The first poll fires immediately.
    pub fn start(&mut self) {
        if self.task.is_some() || self.token.is_cancelled() {
            return;
        }
        info!(interval_ms = self.interval.as_millis() as u64, "Starting analytics polling");
        self.task = Some(tokio::spawn(run(
            self.inner.clone(),
            self.token.clone(),
            self.interval,
        )));
    }

    /// Poll analytics once, out of band.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.inner.refresh(&self.token).await
    }

    pub fn current(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.inner.cell.current()
    }

    /// Derived metrics for the held snapshot; unavailable before the first
    /// successful poll.
    pub fn derived(&self) -> DerivedMetrics {
        self.current()
            .map(|snapshot| snapshot.derived())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AnalyticsSnapshot>>> {
        self.inner.cell.subscribe()
    }

    pub fn freshness(&self) -> Freshness {
        self.inner.cell.freshness()
    }

    pub fn is_offline(&self) -> bool {
        self.inner.cell.is_offline()
    }

    pub fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Analytics polling stopped");
        }
    }
}

impl Drop for AnalyticsSynchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(inner: Arc<AnalyticsInner>, token: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                inner.refresh(&token).await;
            }
        }
    }
}
