//! Controller status snapshot.
//!
//! `SystemStatus` is the authoritative view of the intersection as reported by
//! `GET /api/status`. It is never patched locally: each successful poll yields
//! a fresh value that replaces the previous one wholesale.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of signal-controlled approaches (and cameras) at the intersection.
pub const DIRECTION_COUNT: usize = 4;

/// Signal head state for one approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalState {
    #[default]
    Red,
    Yellow,
    Green,
}

impl SignalState {
    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalState {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RED" => Ok(Self::Red),
            "YELLOW" => Ok(Self::Yellow),
            "GREEN" => Ok(Self::Green),
            other => Err(CoreError::InvalidSignalState(other.to_string())),
        }
    }
}

/// Status payload as it arrives on the wire, before shape validation.
#[derive(Debug, Deserialize)]
struct RawSystemStatus {
    running: bool,
    manual_override: bool,
    current_states: Vec<SignalState>,
    vehicle_counts: Vec<u32>,
    #[serde(default)]
    extra_counts: Vec<u32>,
    #[serde(default)]
    current_direction: Option<usize>,
    remaining_time: u32,
    direction_names: Vec<String>,
}

/// Authoritative controller status.
///
/// The per-direction fields are fixed-size arrays, so index alignment between
/// states, counts, and names holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSystemStatus")]
pub struct SystemStatus {
    /// Whether the controller's signal cycle is running.
    pub running: bool,
    /// Whether an operator override is suspending automatic control.
    pub manual_override: bool,
    /// Signal state per direction.
    pub current_states: [SignalState; DIRECTION_COUNT],
    /// Detected vehicles per direction.
    pub vehicle_counts: [u32; DIRECTION_COUNT],
    /// Counts from secondary intersections. Not aligned with the directions.
    pub extra_counts: Vec<u32>,
    /// Index of the direction currently being served.
    pub current_direction: Option<usize>,
    /// Seconds left in the current phase.
    pub remaining_time: u32,
    /// Display name per direction.
    pub direction_names: [String; DIRECTION_COUNT],
}

fn fixed<T, const N: usize>(field: &str, values: Vec<T>) -> CoreResult<[T; N]> {
    let len = values.len();
    values
        .try_into()
        .map_err(|_| CoreError::InvalidStatus(format!("{field} has {len} entries, expected {N}")))
}

impl TryFrom<RawSystemStatus> for SystemStatus {
    type Error = CoreError;

    fn try_from(raw: RawSystemStatus) -> CoreResult<Self> {
        let current_states = fixed("current_states", raw.current_states)?;
        let vehicle_counts = fixed("vehicle_counts", raw.vehicle_counts)?;
        let direction_names = fixed("direction_names", raw.direction_names)?;

        if let Some(idx) = raw.current_direction {
            if idx >= DIRECTION_COUNT {
                return Err(CoreError::InvalidStatus(format!(
                    "current_direction {idx} out of range"
                )));
            }
        }

        Ok(Self {
            running: raw.running,
            manual_override: raw.manual_override,
            current_states,
            vehicle_counts,
            extra_counts: raw.extra_counts,
            current_direction: raw.current_direction,
            remaining_time: raw.remaining_time,
            direction_names,
        })
    }
}

impl SystemStatus {
    /// Parse and validate a status body.
    pub fn from_json(body: &str) -> CoreResult<Self> {
        serde_json::from_str(body).map_err(|e| CoreError::InvalidStatus(e.to_string()))
    }

    /// Total vehicles across the four primary directions.
    pub fn total_vehicles(&self) -> u64 {
        self.vehicle_counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Total vehicles across the secondary intersections.
    pub fn extra_vehicles(&self) -> u64 {
        self.extra_counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Name of the direction currently being served, if any.
    pub fn active_direction_name(&self) -> Option<&str> {
        self.current_direction
            .and_then(|idx| self.direction_names.get(idx))
            .map(String::as_str)
    }

    /// "Manual" while overridden, "Automatic" otherwise.
    pub fn mode_label(&self) -> &'static str {
        if self.manual_override {
            "Manual"
        } else {
            "Automatic"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "running": true,
            "manual_override": false,
            "current_states": ["GREEN", "RED", "RED", "RED"],
            "vehicle_counts": [3, 7, 0, 2],
            "extra_counts": [1, 1, 4, 0],
            "current_direction": 0,
            "remaining_time": 42,
            "direction_names": ["North", "East", "South", "West"]
        }"#
    }

    #[test]
    fn test_parse_valid_status() {
        let status = SystemStatus::from_json(sample_json()).unwrap();
        assert!(status.running);
        assert_eq!(status.current_states[0], SignalState::Green);
        assert_eq!(status.vehicle_counts, [3, 7, 0, 2]);
        assert_eq!(status.active_direction_name(), Some("North"));
        assert_eq!(status.total_vehicles(), 12);
        assert_eq!(status.extra_vehicles(), 6);
        assert_eq!(status.mode_label(), "Automatic");
    }

    #[test]
    fn test_rejects_short_direction_list() {
        let body = sample_json().replace(r#""South", "West""#, r#""South""#);
        let err = SystemStatus::from_json(&body).unwrap_err();
        assert!(err.to_string().contains("direction_names"));
    }

    #[test]
    fn test_rejects_out_of_range_direction() {
        let body = sample_json().replace(r#""current_direction": 0"#, r#""current_direction": 4"#);
        assert!(SystemStatus::from_json(&body).is_err());
    }

    #[test]
    fn test_rejects_unknown_signal_state() {
        let body = sample_json().replace("GREEN", "BLUE");
        assert!(SystemStatus::from_json(&body).is_err());
    }

    #[test]
    fn test_missing_direction_and_extra_counts() {
        let body = r#"{
            "running": false,
            "manual_override": true,
            "current_states": ["RED", "RED", "RED", "RED"],
            "vehicle_counts": [0, 0, 0, 0],
            "current_direction": null,
            "remaining_time": 0,
            "direction_names": ["North", "East", "South", "West"]
        }"#;
        let status = SystemStatus::from_json(body).unwrap();
        assert_eq!(status.active_direction_name(), None);
        assert!(status.extra_counts.is_empty());
        assert_eq!(status.mode_label(), "Manual");
    }

    #[test]
    fn test_signal_state_from_str() {
        assert_eq!("green".parse::<SignalState>().unwrap(), SignalState::Green);
        assert_eq!(" RED ".parse::<SignalState>().unwrap(), SignalState::Red);
        assert!("amber".parse::<SignalState>().is_err());
    }

    #[test]
    fn test_serialized_status_parses_back() {
        let status = SystemStatus::from_json(sample_json()).unwrap();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""current_states":["GREEN","RED","RED","RED"]"#));
        assert_eq!(SystemStatus::from_json(&json).unwrap(), status);
    }
}
