//! All four synchronization streams under one cancellation token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use trafficctl_client::DynControllerApi;

use crate::analytics::AnalyticsSynchronizer;
use crate::camera::CameraFeedAggregator;
use crate::config::PollingConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::SyncResult;
use crate::status::{StatusHandle, StatusSynchronizer};

/// Status, camera, analytics, and dispatch for one controller.
///
/// Each component gets a child of the session token, so [`shutdown`]
/// tears everything down while components can still be stopped alone.
///
/// [`shutdown`]: ControllerSession::shutdown
pub struct ControllerSession {
    token: CancellationToken,
    status: StatusSynchronizer,
    cameras: CameraFeedAggregator,
    analytics: AnalyticsSynchronizer,
    dispatcher: Arc<CommandDispatcher>,
}

impl ControllerSession {
    pub fn new(api: DynControllerApi, config: &PollingConfig) -> SyncResult<Self> {
        config.validate()?;
        let token = CancellationToken::new();

        let status = StatusSynchronizer::new(api.clone(), config, token.child_token());
        let cameras =
            CameraFeedAggregator::new(api.clone(), status.handle(), config, token.child_token());
        let analytics = AnalyticsSynchronizer::new(api.clone(), config, token.child_token());
        let dispatcher = Arc::new(CommandDispatcher::new(api, status.handle()));

        Ok(Self {
            token,
            status,
            cameras,
            analytics,
            dispatcher,
        })
    }

    /// Start status, camera, and analytics polling.
    pub fn start(&mut self) {
        self.status.start();
        self.cameras.start();
        self.analytics.start();
    }

    pub fn status(&self) -> StatusHandle {
        self.status.handle()
    }

    pub fn cameras(&self) -> &CameraFeedAggregator {
        &self.cameras
    }

    pub fn analytics(&self) -> &AnalyticsSynchronizer {
        &self.analytics
    }

    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        self.dispatcher.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel every timer and in-flight request.
    pub fn shutdown(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.status.shutdown();
        self.cameras.shutdown();
        self.analytics.shutdown();
        info!("Controller session shut down");
    }
}

impl Drop for ControllerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
