//! Camera feed aggregator.
//!
//! A supervisor task watches the status snapshot. While the controller is
//! running it keeps a polling task alive that fetches every camera each
//! cycle, joins the frames with the status current at join time, and swaps
//! the whole feed set in one write. When `running` goes false the polling
//! task is cancelled and the published set is cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use trafficctl_client::{DynControllerApi, Endpoint};
use trafficctl_core::CameraFeed;
use trafficctl_telemetry::Metrics;

use crate::config::PollingConfig;
use crate::status::StatusHandle;

/// The feed set published after each cycle.
pub type FeedSet = Arc<Vec<CameraFeed>>;

#[derive(Clone)]
struct CameraContext {
    api: DynControllerApi,
    status: StatusHandle,
    feeds: Arc<watch::Sender<FeedSet>>,
    polling: Arc<AtomicBool>,
    interval: Duration,
    camera_count: usize,
}

impl CameraContext {
    fn set_polling(&self, active: bool) {
        if self.polling.swap(active, Ordering::SeqCst) != active {
            Metrics::camera_polling(active);
            if active {
                info!(cameras = self.camera_count, "Controller running, camera polling started");
            } else {
                info!("Camera polling stopped");
            }
        }
    }

    /// Publish `feeds` unless `token` was cancelled first.
    ///
    /// The check runs under the channel's write lock, so a cycle that
    /// finishes after its period ended cannot overwrite the cleared set.
    fn publish(&self, token: &CancellationToken, feeds: Vec<CameraFeed>) -> bool {
        let count = feeds.len();
        let published = self.feeds.send_if_modified(|held| {
            if token.is_cancelled() {
                return false;
            }
            *held = Arc::new(feeds);
            true
        });
        if published {
            Metrics::camera_feeds(count);
        }
        published
    }

    fn clear(&self) {
        self.feeds.send_if_modified(|held| {
            if held.is_empty() {
                return false;
            }
            *held = Arc::new(Vec::new());
            true
        });
        Metrics::camera_feeds(0);
    }
}

/// Polls the per-camera endpoints while the controller is running.
pub struct CameraFeedAggregator {
    ctx: CameraContext,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CameraFeedAggregator {
    pub fn new(
        api: DynControllerApi,
        status: StatusHandle,
        config: &PollingConfig,
        token: CancellationToken,
    ) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            ctx: CameraContext {
                api,
                status,
                feeds: Arc::new(tx),
                polling: Arc::new(AtomicBool::new(false)),
                interval: config.camera_interval(),
                camera_count: config.camera_count,
            },
            token,
            task: None,
        }
    }

    /// Spawn the supervisor. Polling itself waits for `running`.
    pub fn start(&mut self) {
        if self.task.is_some() || self.token.is_cancelled() {
            return;
        }
        self.task = Some(tokio::spawn(supervise(self.ctx.clone(), self.token.clone())));
    }

    /// Feeds from the latest completed cycle (empty while stopped).
    pub fn feeds(&self) -> FeedSet {
        self.ctx.feeds.borrow().clone()
    }

    /// Receiver woken whenever a new feed set is published.
    pub fn subscribe(&self) -> watch::Receiver<FeedSet> {
        self.ctx.feeds.subscribe()
    }

    /// Whether camera timers are currently active.
    pub fn is_polling(&self) -> bool {
        self.ctx.polling.load(Ordering::SeqCst)
    }

    pub fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.ctx.set_polling(false);
    }
}

impl Drop for CameraFeedAggregator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn supervise(ctx: CameraContext, token: CancellationToken) {
    let mut status_rx = ctx.status.subscribe();
    let mut period: Option<(CancellationToken, JoinHandle<()>)> = None;

    loop {
        let running = status_rx
            .borrow_and_update()
            .as_ref()
            .is_some_and(|status| status.running);

        match (running, period.is_some()) {
            (true, false) => {
                let child = token.child_token();
                let task = tokio::spawn(poll_cameras(ctx.clone(), child.clone()));
                period = Some((child, task));
                ctx.set_polling(true);
            }
            (false, true) => {
                if let Some((child, task)) = period.take() {
                    child.cancel();
                    task.abort();
                }
                ctx.clear();
                ctx.set_polling(false);
            }
            _ => {}
        }

        tokio::select! {
            () = token.cancelled() => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    debug!("Status channel closed, camera supervisor exiting");
                    break;
                }
            }
        }
    }

    if let Some((child, task)) = period.take() {
        child.cancel();
        task.abort();
    }
    ctx.set_polling(false);
}

async fn poll_cameras(ctx: CameraContext, token: CancellationToken) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let feeds = tokio::select! {
            () = token.cancelled() => break,
            feeds = collect_cycle(&ctx) => feeds,
        };
        if !ctx.publish(&token, feeds) {
            trace!("Discarding camera cycle finished after polling stopped");
            break;
        }
    }
}

/// Fetch every camera concurrently, then join against the current status.
async fn collect_cycle(ctx: &CameraContext) -> Vec<CameraFeed> {
    let fetches = (0..ctx.camera_count).map(|index| {
        let api = ctx.api.clone();
        async move {
            let label = Endpoint::Camera(index).label();
            let started = Instant::now();
            let frame = api.fetch_camera(index).await;
            match &frame {
                Ok(_) => Metrics::poll_ok(label, started.elapsed().as_secs_f64() * 1000.0),
                Err(_) => Metrics::poll_failed(label),
            }
            (index, frame)
        }
    });
    let frames = join_all(fetches).await;

    let Some(status) = ctx.status.current() else {
        return Vec::new();
    };

    frames
        .into_iter()
        .filter_map(|(index, frame)| match frame {
            Ok(Some(image)) => CameraFeed::join(index, image, &status),
            Ok(None) => {
                trace!(camera = index, "Camera returned no image");
                None
            }
            Err(e) => {
                warn!(camera = index, error = %e, "Camera fetch failed");
                None
            }
        })
        .collect()
}
