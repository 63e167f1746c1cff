//! Command dispatcher.
//!
//! Sends operator commands and re-reads status afterwards. Nothing is
//! applied locally ahead of the controller: the forced refresh is the only
//! way a command's effect becomes visible.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use trafficctl_client::DynControllerApi;
use trafficctl_core::{ControlCommand, SignalState, SystemStatus, DIRECTION_COUNT};
use trafficctl_telemetry::Metrics;

use crate::error::{SyncError, SyncResult};
use crate::snapshot::RefreshOutcome;
use crate::status::StatusHandle;

const NOTIFICATION_CAPACITY: usize = 64;

/// Result of one dispatch as seen by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Controller accepted the command. `confirmed` is set when the
    /// refreshed status already shows its effect.
    Dispatched { confirmed: bool },
    /// The requested state held before and after dispatch.
    AlreadyInState,
    /// The control request failed.
    Failed(String),
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched { .. } => "dispatched",
            Self::AlreadyInState => "already_in_state",
            Self::Failed(_) => "failed",
        }
    }
}

/// Everything known after a dispatch completes.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub command: ControlCommand,
    pub outcome: DispatchOutcome,
    /// What happened to the forced status refresh.
    pub refresh: RefreshOutcome,
    /// Status held once the refresh finished.
    pub status: Option<Arc<SystemStatus>>,
}

impl DispatchReport {
    /// The notification broadcast for this dispatch.
    pub fn notification(&self) -> Notification {
        Notification::from_outcome(self.command, &self.outcome)
    }
}

/// User-visible notification emitted for each dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Dispatched { command: ControlCommand, confirmed: bool },
    AlreadyInState { command: ControlCommand },
    DispatchFailed { command: ControlCommand, reason: String },
}

impl Notification {
    fn from_outcome(command: ControlCommand, outcome: &DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Dispatched { confirmed } => Self::Dispatched {
                command,
                confirmed: *confirmed,
            },
            DispatchOutcome::AlreadyInState => Self::AlreadyInState { command },
            DispatchOutcome::Failed(reason) => Self::DispatchFailed {
                command,
                reason: reason.clone(),
            },
        }
    }

    /// One-line message for the operator.
    pub fn message(&self) -> String {
        match self {
            Self::Dispatched {
                command,
                confirmed: true,
            } => format!("{command} applied"),
            Self::Dispatched {
                command,
                confirmed: false,
            } => format!("{command} sent, waiting for controller"),
            Self::AlreadyInState { command } => {
                format!("{command}: controller already in requested state")
            }
            Self::DispatchFailed { command, reason } => format!("{command} failed: {reason}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::DispatchFailed { .. })
    }
}

/// Which controls make sense for the current status.
///
/// Advisory only. The dispatcher still sends e.g. `Stop` while stopped and
/// reports it as [`DispatchOutcome::AlreadyInState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlAvailability {
    pub start: bool,
    pub stop: bool,
    pub manual_override: bool,
}

impl ControlAvailability {
    pub fn from_status(status: Option<&SystemStatus>, dispatching: bool) -> Self {
        let Some(status) = status else {
            return Self::default();
        };
        let idle = !dispatching;
        Self {
            start: idle && !status.running,
            stop: idle && status.running,
            manual_override: idle && status.running,
        }
    }
}

/// Clears the busy flag on every exit path, including cancellation.
struct BusyGuard<'a> {
    busy: &'a watch::Sender<bool>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.send_replace(false);
    }
}

/// Sends start/stop/override and forces a status refresh after each.
pub struct CommandDispatcher {
    api: DynControllerApi,
    status: StatusHandle,
    busy: watch::Sender<bool>,
    notifications: broadcast::Sender<Notification>,
}

impl CommandDispatcher {
    pub fn new(api: DynControllerApi, status: StatusHandle) -> Self {
        let (busy, _) = watch::channel(false);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            api,
            status,
            busy,
            notifications,
        }
    }

    pub async fn start(&self) -> SyncResult<DispatchReport> {
        self.dispatch(ControlCommand::Start).await
    }

    pub async fn stop(&self) -> SyncResult<DispatchReport> {
        self.dispatch(ControlCommand::Stop).await
    }

    /// Enable or disable manual override. States default to all red.
    pub async fn set_manual_override(
        &self,
        enabled: bool,
        states: Option<[SignalState; DIRECTION_COUNT]>,
    ) -> SyncResult<DispatchReport> {
        self.dispatch(ControlCommand::manual_override(enabled, states))
            .await
    }

    /// Whether a command is in flight.
    pub fn is_dispatching(&self) -> bool {
        *self.busy.borrow()
    }

    /// Receiver for the busy flag.
    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    /// Receiver for operator notifications.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn availability(&self) -> ControlAvailability {
        ControlAvailability::from_status(self.status.current().as_deref(), self.is_dispatching())
    }

    /// Send `command`, then force a status refresh whatever the result.
    ///
    /// Only one command may be in flight; a second call while busy returns
    /// [`SyncError::DispatchInProgress`] without touching the controller.
    pub async fn dispatch(&self, command: ControlCommand) -> SyncResult<DispatchReport> {
        if self.status.is_shut_down() {
            return Err(SyncError::ShutDown);
        }

        let acquired = self.busy.send_if_modified(|busy| {
            if *busy {
                return false;
            }
            *busy = true;
            true
        });
        if !acquired {
            warn!(%command, "Dispatch rejected, another command is in flight");
            return Err(SyncError::DispatchInProgress);
        }
        let _busy = BusyGuard { busy: &self.busy };

        let held_before = self
            .status
            .current()
            .is_some_and(|status| command.is_satisfied_by(&status));

        info!(%command, "Dispatching command");
        let sent = tokio::select! {
            () = self.status.token().cancelled() => return Err(SyncError::ShutDown),
            sent = self.api.send_command(command) => sent,
        };

        let refresh = self.status.refresh().await;
        let status = self.status.current();
        let holds_after = status
            .as_deref()
            .is_some_and(|status| command.is_satisfied_by(status));

        let outcome = match sent {
            Ok(()) if held_before && holds_after => DispatchOutcome::AlreadyInState,
            Ok(()) => DispatchOutcome::Dispatched {
                confirmed: holds_after,
            },
            Err(e) => DispatchOutcome::Failed(e.to_string()),
        };

        Metrics::dispatch(command.action(), outcome.as_str());
        match &outcome {
            DispatchOutcome::Failed(reason) => {
                warn!(%command, reason = %reason, refresh = refresh.as_str(), "Command dispatch failed")
            }
            _ => info!(
                %command,
                outcome = outcome.as_str(),
                refresh = refresh.as_str(),
                "Command dispatched"
            ),
        }

        // Err only means nobody is listening.
        let _ = self
            .notifications
            .send(Notification::from_outcome(command, &outcome));

        Ok(DispatchReport {
            command,
            outcome,
            refresh,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollingConfig;
    use crate::test_util::status;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use trafficctl_client::MockControllerApi;

    async fn setup(running: bool) -> (Arc<MockControllerApi>, Arc<CommandDispatcher>, StatusHandle) {
        let mock = Arc::new(MockControllerApi::with_status(status(running)));
        let handle = StatusHandle::new(mock.clone(), &PollingConfig::default(), CancellationToken::new());
        handle.refresh().await;
        let dispatcher = Arc::new(CommandDispatcher::new(mock.clone(), handle.clone()));
        (mock, dispatcher, handle)
    }

    #[tokio::test]
    async fn test_stop_while_stopped_is_already_in_state() {
        let (mock, dispatcher, handle) = setup(false).await;
        let mut notifications = dispatcher.notifications();

        let report = dispatcher.stop().await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::AlreadyInState);
        assert_eq!(report.refresh, RefreshOutcome::Applied);
        assert!(!handle.current().unwrap().running);
        assert_eq!(mock.commands(), vec![ControlCommand::Stop]);

        let notification = notifications.recv().await.unwrap();
        assert_eq!(
            notification,
            Notification::AlreadyInState {
                command: ControlCommand::Stop
            }
        );
        assert!(!notification.is_error());
        assert!(!dispatcher.is_dispatching());
    }

    #[tokio::test]
    async fn test_start_refreshes_status() {
        let (mock, dispatcher, handle) = setup(false).await;
        let calls = mock.status_calls();

        let report = dispatcher.start().await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Dispatched { confirmed: true });
        assert_eq!(mock.status_calls(), calls + 1);
        assert!(handle.current().unwrap().running);
        assert!(report.status.unwrap().running);
    }

    #[tokio::test]
    async fn test_failed_dispatch_still_refreshes() {
        let (mock, dispatcher, _handle) = setup(false).await;
        mock.set_control_failure(Some("connection reset"));
        let mut notifications = dispatcher.notifications();
        let calls = mock.status_calls();

        let report = dispatcher.start().await.unwrap();
        assert!(matches!(report.outcome, DispatchOutcome::Failed(_)));
        assert_eq!(mock.status_calls(), calls + 1);
        assert!(!report.status.unwrap().running);
        assert!(!dispatcher.is_dispatching());

        let notification = notifications.recv().await.unwrap();
        assert!(notification.is_error());
        assert!(notification.message().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_second_dispatch_while_busy_is_rejected() {
        let (mock, dispatcher, _handle) = setup(true).await;
        mock.push_status(Duration::from_millis(80), Ok(status(false)));
        let mut busy = dispatcher.subscribe_busy();

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.stop().await })
        };
        busy.changed().await.unwrap();
        assert!(dispatcher.is_dispatching());

        assert!(matches!(
            dispatcher.start().await,
            Err(SyncError::DispatchInProgress)
        ));

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Dispatched { confirmed: true });
        assert!(!dispatcher.is_dispatching());
        assert_eq!(mock.commands(), vec![ControlCommand::Stop]);
    }

    #[tokio::test]
    async fn test_manual_override_defaults_to_all_red() {
        let (mock, dispatcher, handle) = setup(true).await;

        let report = dispatcher.set_manual_override(true, None).await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Dispatched { confirmed: true });
        let held = handle.current().unwrap();
        assert!(held.manual_override);
        assert_eq!(held.current_states, [SignalState::Red; DIRECTION_COUNT]);
        assert_eq!(
            mock.commands(),
            vec![ControlCommand::manual_override(true, None)]
        );
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown() {
        let (mock, dispatcher, handle) = setup(true).await;
        handle.token().cancel();

        assert!(matches!(dispatcher.stop().await, Err(SyncError::ShutDown)));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_availability() {
        let stopped = status(false);
        let running = status(true);

        let idle = ControlAvailability::from_status(Some(&stopped), false);
        assert!(idle.start && !idle.stop && !idle.manual_override);

        let live = ControlAvailability::from_status(Some(&running), false);
        assert!(!live.start && live.stop && live.manual_override);

        let busy = ControlAvailability::from_status(Some(&running), true);
        assert_eq!(busy, ControlAvailability::default());
        assert_eq!(ControlAvailability::from_status(None, false), ControlAvailability::default());
    }
}
