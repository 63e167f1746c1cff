//! Scripted controller for tests.
//!
//! Behaves like a tiny controller: it holds a status that control commands
//! mutate, serves per-camera frames, and can be told to fail or to answer
//! specific status requests late.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use trafficctl_core::{AnalyticsSnapshot, CameraImage, ControlCommand, SystemStatus};

use crate::api::{BoxFuture, ControllerApi};
use crate::error::{ClientError, ClientResult};

/// Scripted answer for one camera index.
#[derive(Debug, Clone)]
enum CameraScript {
    Frame(Option<String>),
    Fail(String),
}

/// One scripted status answer: delay, then payload or failure message.
type ScriptedStatus = (Duration, Result<SystemStatus, String>);

/// Mock controller implementing [`ControllerApi`].
#[derive(Default)]
pub struct MockControllerApi {
    status: Mutex<Option<SystemStatus>>,
    status_script: Mutex<VecDeque<ScriptedStatus>>,
    status_failure: Mutex<Option<String>>,
    cameras: Mutex<HashMap<usize, CameraScript>>,
    analytics: Mutex<Option<Result<AnalyticsSnapshot, String>>>,
    control_failure: Mutex<Option<String>>,
    commands: Mutex<Vec<ControlCommand>>,
    status_calls: AtomicUsize,
    camera_calls: AtomicUsize,
    analytics_calls: AtomicUsize,
}

impl MockControllerApi {
    /// Create a mock with no status, no frames, and no analytics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock serving `status`.
    pub fn with_status(status: SystemStatus) -> Self {
        let mock = Self::new();
        mock.set_status(status);
        mock
    }

    /// Replace the controller-side status.
    pub fn set_status(&self, status: SystemStatus) {
        *self.status.lock() = Some(status);
    }

    /// Mutate the controller-side status in place.
    pub fn update_status(&self, f: impl FnOnce(&mut SystemStatus)) {
        if let Some(status) = self.status.lock().as_mut() {
            f(status);
        }
    }

    /// Controller-side status as it stands.
    pub fn status(&self) -> Option<SystemStatus> {
        self.status.lock().clone()
    }

    /// Queue a status answer that takes precedence over the held status.
    pub fn push_status(&self, delay: Duration, result: Result<SystemStatus, String>) {
        self.status_script.lock().push_back((delay, result));
    }

    /// Make unscripted status requests fail (`None` clears).
    pub fn set_status_failure(&self, message: Option<&str>) {
        *self.status_failure.lock() = message.map(str::to_string);
    }

    /// Serve `image` (or an explicit null image) for camera `index`.
    pub fn set_camera(&self, index: usize, image: Option<&str>) {
        self.cameras
            .lock()
            .insert(index, CameraScript::Frame(image.map(str::to_string)));
    }

    /// Make camera `index` fail.
    pub fn fail_camera(&self, index: usize, message: &str) {
        self.cameras
            .lock()
            .insert(index, CameraScript::Fail(message.to_string()));
    }

    /// Serve `snapshot` from the analytics endpoint.
    pub fn set_analytics(&self, snapshot: AnalyticsSnapshot) {
        *self.analytics.lock() = Some(Ok(snapshot));
    }

    /// Make the analytics endpoint fail.
    pub fn fail_analytics(&self, message: &str) {
        *self.analytics.lock() = Some(Err(message.to_string()));
    }

    /// Make control requests fail (`None` clears).
    pub fn set_control_failure(&self, message: Option<&str>) {
        *self.control_failure.lock() = message.map(str::to_string);
    }

    /// Commands received so far.
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.commands.lock().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn camera_calls(&self) -> usize {
        self.camera_calls.load(Ordering::SeqCst)
    }

    pub fn analytics_calls(&self) -> usize {
        self.analytics_calls.load(Ordering::SeqCst)
    }

    fn apply(&self, command: ControlCommand) {
        self.update_status(|status| match command {
            ControlCommand::Start => status.running = true,
            ControlCommand::Stop => status.running = false,
            ControlCommand::ManualOverride { enabled, states } => {
                status.manual_override = enabled;
                if enabled {
                    status.current_states = states;
                }
            }
        });
    }
}

impl ControllerApi for MockControllerApi {
    fn fetch_status(&self) -> BoxFuture<'_, ClientResult<SystemStatus>> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);

            let scripted = self.status_script.lock().pop_front();
            if let Some((delay, result)) = scripted {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                return result.map_err(ClientError::Http);
            }

            if let Some(message) = self.status_failure.lock().clone() {
                return Err(ClientError::Http(message));
            }
            self.status()
                .ok_or_else(|| ClientError::Http("connection refused".to_string()))
        })
    }

    fn fetch_camera(&self, index: usize) -> BoxFuture<'_, ClientResult<Option<CameraImage>>> {
        Box::pin(async move {
            self.camera_calls.fetch_add(1, Ordering::SeqCst);
            let script = self.cameras.lock().get(&index).cloned();
            match script {
                Some(CameraScript::Frame(image)) => Ok(CameraImage::from_payload(image)),
                Some(CameraScript::Fail(message)) => Err(ClientError::Http(message)),
                None => Err(ClientError::Status {
                    status: 400,
                    message: "Invalid camera ID".to_string(),
                }),
            }
        })
    }

    fn fetch_analytics(&self) -> BoxFuture<'_, ClientResult<AnalyticsSnapshot>> {
        Box::pin(async move {
            self.analytics_calls.fetch_add(1, Ordering::SeqCst);
            match self.analytics.lock().clone() {
                Some(Ok(snapshot)) => Ok(snapshot),
                Some(Err(message)) => Err(ClientError::Http(message)),
                None => Err(ClientError::Status {
                    status: 404,
                    message: "No data available".to_string(),
                }),
            }
        })
    }

    fn send_command(&self, command: ControlCommand) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            self.commands.lock().push(command);
            if let Some(message) = self.control_failure.lock().clone() {
                return Err(ClientError::Http(message));
            }
            self.apply(command);
            Ok(())
        })
    }
}
