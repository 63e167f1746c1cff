//! Core domain types for the traffic signal controller console.
//!
//! Everything here is a plain value: snapshots received from the controller,
//! commands sent to it, and the metrics derived from its analytics counters.
//! Wire payloads are validated on the way in so that malformed responses are
//! rejected instead of propagated.

pub mod analytics;
pub mod camera;
pub mod command;
pub mod error;
pub mod status;

pub use analytics::{AnalyticsSnapshot, DerivedMetrics, DirectionCounts, HourlyRecord, Period};
pub use camera::{CameraFeed, CameraImage, CameraResponse};
pub use command::ControlCommand;
pub use error::{CoreError, CoreResult};
pub use status::{SignalState, SystemStatus, DIRECTION_COUNT};
