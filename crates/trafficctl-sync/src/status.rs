//! Status synchronizer.
//!
//! Polls `GET /api/status` on a fixed interval and holds the authoritative
//! [`SystemStatus`]. Each tick spawns its own request, so a slow response
//! never delays the next poll; the [`SequenceGate`](crate::SequenceGate)
//! inside the snapshot cell drops whichever response comes back late.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trafficctl_client::{DynControllerApi, Endpoint};
use trafficctl_core::SystemStatus;
use trafficctl_telemetry::Metrics;

use crate::config::PollingConfig;
use crate::snapshot::{Freshness, RefreshOutcome, SnapshotCell};

struct StatusInner {
    api: DynControllerApi,
    cell: SnapshotCell<SystemStatus>,
}

/// Cloneable view of the held status plus the ability to force a poll.
///
/// Shares the synchronizer's cancellation token: once the synchronizer is
/// shut down, forced refreshes return [`RefreshOutcome::Cancelled`] and
/// responses still in flight are dropped.
#[derive(Clone)]
pub struct StatusHandle {
    inner: Arc<StatusInner>,
    token: CancellationToken,
}

impl StatusHandle {
    pub fn new(api: DynControllerApi, config: &PollingConfig, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(StatusInner {
                api,
                cell: SnapshotCell::new(Endpoint::Status.label(), config.offline_after_failures),
            }),
            token,
        }
    }

    /// Latest applied status.
    pub fn current(&self) -> Option<Arc<SystemStatus>> {
        self.inner.cell.current()
    }

    /// Receiver woken on every status change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SystemStatus>>> {
        self.inner.cell.subscribe()
    }

    pub fn freshness(&self) -> Freshness {
        self.inner.cell.freshness()
    }

    pub fn is_offline(&self) -> bool {
        self.inner.cell.is_offline()
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled when the owning synchronizer shuts down.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Poll status once, out of band.
    pub async fn refresh(&self) -> RefreshOutcome {
        let outcome = self
            .inner
            .cell
            .poll(&self.token, self.inner.api.fetch_status())
            .await;
        if outcome == RefreshOutcome::Applied {
            if let Some(status) = self.current() {
                Metrics::controller_mode(status.running, status.manual_override);
            }
        }
        outcome
    }
}

/// Owns the status polling task.
pub struct StatusSynchronizer {
    handle: StatusHandle,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl StatusSynchronizer {
    pub fn new(api: DynControllerApi, config: &PollingConfig, token: CancellationToken) -> Self {
        Self {
            handle: StatusHandle::new(api, config, token),
            interval: config.status_interval(),
            task: None,
        }
    }

    /// Spawn the polling task. The first poll fires immediately.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        if self.handle.is_shut_down() {
            warn!("Status synchronizer already shut down, not starting");
            return;
        }
        info!(interval_ms = self.interval.as_millis() as u64, "Starting status polling");
        self.task = Some(tokio::spawn(run(self.handle.clone(), self.interval)));
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn handle(&self) -> StatusHandle {
        self.handle.clone()
    }

    pub fn current_status(&self) -> Option<Arc<SystemStatus>> {
        self.handle.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SystemStatus>>> {
        self.handle.subscribe()
    }

    /// Cancel the timer and every in-flight request.
    pub fn shutdown(&mut self) {
        self.handle.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Status polling stopped");
        }
    }
}

impl Drop for StatusSynchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(handle: StatusHandle, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            () = handle.token.cancelled() => break,
            _ = ticker.tick() => {
                let poll = handle.clone();
                in_flight.spawn(async move {
                    poll.refresh().await;
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    in_flight.abort_all();
}
