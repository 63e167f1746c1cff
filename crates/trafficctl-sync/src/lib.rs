//! State synchronization and command dispatch for the traffic controller.
//!
//! Four independent streams keep the local view in step with the controller:
//! - [`StatusSynchronizer`]: status every second, through the [`SequenceGate`]
//! - [`CameraFeedAggregator`]: camera frames every second while running
//! - [`AnalyticsSynchronizer`]: analytics every thirty seconds
//! - [`CommandDispatcher`]: one forced status refresh after each command
//!
//! [`ControllerSession`] wires all four to one cancellation token.

pub mod analytics;
pub mod camera;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod sequence;
pub mod session;
pub mod snapshot;
pub mod status;

pub use analytics::AnalyticsSynchronizer;
pub use camera::CameraFeedAggregator;
pub use config::PollingConfig;
pub use dispatcher::{
    CommandDispatcher, ControlAvailability, DispatchOutcome, DispatchReport, Notification,
};
pub use error::{SyncError, SyncResult};
pub use sequence::SequenceGate;
pub use session::ControllerSession;
pub use snapshot::{Freshness, RefreshOutcome, SnapshotCell};
pub use status::{StatusHandle, StatusSynchronizer};

#[cfg(test)]
pub(crate) mod test_util {
    use std::time::Duration;
    use trafficctl_core::{SignalState, SystemStatus};

    /// Four-way status with distinct per-direction counts.
    pub fn status(running: bool) -> SystemStatus {
        SystemStatus {
            running,
            manual_override: false,
            current_states: [
                SignalState::Green,
                SignalState::Red,
                SignalState::Red,
                SignalState::Red,
            ],
            vehicle_counts: [5, 1, 7, 2],
            extra_counts: vec![0, 0, 0, 0],
            current_direction: Some(0),
            remaining_time: 12,
            direction_names: ["North", "East", "South", "West"].map(String::from),
        }
    }

    /// Poll `cond` every few milliseconds until it holds or `timeout` passes.
    pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if cond() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
