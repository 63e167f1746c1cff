//! Controller API trait.
//!
//! Abstracts the four controller endpoints so synchronizers can be driven by
//! the real HTTP transport or by a scripted mock.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use trafficctl_core::{AnalyticsSnapshot, CameraImage, ControlCommand, SystemStatus};

use crate::error::ClientResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Controller endpoint, used for URLs, log fields, and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Status,
    Camera(usize),
    Analytics,
    Control,
}

impl Endpoint {
    /// Request path relative to the controller origin.
    pub fn path(&self) -> String {
        match self {
            Self::Status => "/api/status".to_string(),
            Self::Camera(index) => format!("/api/camera/{index}"),
            Self::Analytics => "/api/analytics".to_string(),
            Self::Control => "/api/control".to_string(),
        }
    }

    /// Low-cardinality label (camera indices collapse to `camera`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Camera(_) => "camera",
            Self::Analytics => "analytics",
            Self::Control => "control",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Access to the traffic signal controller.
///
/// Every call is one request; retries are the caller's business (in practice
/// the next timer tick).
pub trait ControllerApi: Send + Sync {
    /// `GET /api/status`, validated.
    fn fetch_status(&self) -> BoxFuture<'_, ClientResult<SystemStatus>>;

    /// `GET /api/camera/{index}`. `Ok(None)` when the controller has no frame.
    fn fetch_camera(&self, index: usize) -> BoxFuture<'_, ClientResult<Option<CameraImage>>>;

    /// `GET /api/analytics`, validated.
    fn fetch_analytics(&self) -> BoxFuture<'_, ClientResult<AnalyticsSnapshot>>;

    /// `POST /api/control`. Only success/failure is reported.
    fn send_command(&self, command: ControlCommand) -> BoxFuture<'_, ClientResult<()>>;
}

/// Arc wrapper for ControllerApi trait objects.
pub type DynControllerApi = Arc<dyn ControllerApi>;
