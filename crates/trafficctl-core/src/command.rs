//! Operator commands for `POST /api/control`.

use crate::status::{SignalState, SystemStatus, DIRECTION_COUNT};
use serde::Serialize;
use std::fmt;

/// Control command. Constructed per dispatch, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    Start,
    Stop,
    ManualOverride {
        enabled: bool,
        states: [SignalState; DIRECTION_COUNT],
    },
}

impl ControlCommand {
    /// Manual override command; states default to all red.
    pub fn manual_override(enabled: bool, states: Option<[SignalState; DIRECTION_COUNT]>) -> Self {
        Self::ManualOverride {
            enabled,
            states: states.unwrap_or([SignalState::Red; DIRECTION_COUNT]),
        }
    }

    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::ManualOverride { .. } => "manual_override",
        }
    }

    /// Whether `status` already reflects what this command asks for.
    ///
    /// The controller only applies override states when enabling, so states
    /// are compared only in that case.
    pub fn is_satisfied_by(&self, status: &SystemStatus) -> bool {
        match self {
            Self::Start => status.running,
            Self::Stop => !status.running,
            Self::ManualOverride { enabled, states } => {
                status.manual_override == *enabled
                    && (!*enabled || status.current_states == *states)
            }
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManualOverride { enabled, states } => {
                let states: Vec<&str> = states.iter().map(SignalState::as_str).collect();
                write!(f, "manual_override(enabled={enabled}, states=[{}])", states.join(","))
            }
            other => f.write_str(other.action()),
        }
    }
}
