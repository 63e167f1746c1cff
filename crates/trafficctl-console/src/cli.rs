//! Command-line interface.

use clap::{Parser, Subcommand};
use trafficctl_core::{SignalState, DIRECTION_COUNT};

use crate::error::{AppError, AppResult};

/// Monitor and control a traffic signal controller
#[derive(Parser, Debug)]
#[command(name = "trafficctl", version, about, long_about = None)]
pub struct Args {
    /// Configuration file path (can also be set via TRAFFICCTL_CONFIG env var)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Controller origin, overriding `controller.base_url`
    #[arg(long)]
    pub controller: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll status, cameras, and analytics until Ctrl-C
    Monitor,
    /// Print the controller status once
    Status,
    /// Start the signal cycle
    Start,
    /// Stop the signal cycle
    Stop,
    /// Enable (or with --off, disable) manual override
    Override {
        /// Disable manual override instead of enabling it
        #[arg(long)]
        off: bool,
        /// Four signal states, one per direction (default: all RED)
        #[arg(value_name = "STATE")]
        states: Vec<SignalState>,
    },
    /// Print analytics and derived metrics once
    Analytics,
}

impl Args {
    /// Config path: CLI arg > TRAFFICCTL_CONFIG > `config/default.toml`.
    pub fn config_path(&self) -> String {
        self.config
            .clone()
            .or_else(|| std::env::var("TRAFFICCTL_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string())
    }
}

/// Validate override states: none (all red) or exactly one per direction.
pub fn override_states(
    states: &[SignalState],
) -> AppResult<Option<[SignalState; DIRECTION_COUNT]>> {
    if states.is_empty() {
        return Ok(None);
    }
    let states: [SignalState; DIRECTION_COUNT] = states.try_into().map_err(|_| {
        AppError::Usage(format!(
            "override takes {DIRECTION_COUNT} states, got {}",
            states.len()
        ))
    })?;
    Ok(Some(states))
}
