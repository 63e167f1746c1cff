//! Camera feed types.
//!
//! The controller serves one annotated frame per camera as a `data:` URL.
//! A `CameraFeed` joins such a frame with the per-direction fields of the
//! status snapshot that was current when the frame was assembled.

use crate::status::{SignalState, SystemStatus};
use serde::{Deserialize, Serialize};

/// Body of `GET /api/camera/{index}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraResponse {
    #[serde(default)]
    pub image: Option<String>,
}

/// Opaque encoded camera frame (usually `data:image/jpeg;base64,...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraImage(String);

impl CameraImage {
    /// Wrap a payload, rejecting absent or empty images.
    pub fn from_payload(payload: Option<String>) -> Option<Self> {
        payload
            .filter(|p| !p.trim().is_empty())
            .map(Self)
    }

    /// The encoded payload as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Media type of a `data:` URL payload (e.g. `image/jpeg`).
    pub fn media_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let end = rest.find(|c: char| c == ';' || c == ',')?;
        Some(&rest[..end]).filter(|m| !m.is_empty())
    }
}

impl CameraResponse {
    /// The frame, if the controller returned a non-empty one.
    pub fn into_image(self) -> Option<CameraImage> {
        CameraImage::from_payload(self.image)
    }
}

/// One camera tile, valid for a single aggregation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraFeed {
    pub id: usize,
    pub image: CameraImage,
    pub direction: String,
    pub state: SignalState,
    pub count: u32,
    pub remaining_time: u32,
}

impl CameraFeed {
    /// Join a fetched frame with the status snapshot current at join time.
    ///
    /// Returns `None` when `id` does not name a primary direction.
    pub fn join(id: usize, image: CameraImage, status: &SystemStatus) -> Option<Self> {
        Some(Self {
            id,
            image,
            direction: status.direction_names.get(id)?.clone(),
            state: *status.current_states.get(id)?,
            count: *status.vehicle_counts.get(id)?,
            remaining_time: status.remaining_time,
        })
    }

    /// Overlay label: `"GREEN (12s)"`, or just `"RED"` while red.
    pub fn signal_label(&self) -> String {
        match self.state {
            SignalState::Red => self.state.to_string(),
            state => format!("{state} ({}s)", self.remaining_time),
        }
    }
}
