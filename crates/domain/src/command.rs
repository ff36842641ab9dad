//! Commands accepted by components.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{PressDuration, StateId};

/// A request to change a component.
///
/// Components accept the subset matching their capabilities and reject the
/// rest with [`UsageError::CommandNotSupported`](crate::error::UsageError).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    TurnOn,
    TurnOff,
    Toggle,
    SetState { state: StateId },
    NextState,
    MoveUp,
    MoveDown,
    Stop,
    Press {
        #[serde(default)]
        duration: PressDuration,
    },
    Reset,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TurnOn => f.write_str("turn_on"),
            Self::TurnOff => f.write_str("turn_off"),
            Self::Toggle => f.write_str("toggle"),
            Self::SetState { state } => write!(f, "set_state({state})"),
            Self::NextState => f.write_str("next_state"),
            Self::MoveUp => f.write_str("move_up"),
            Self::MoveDown => f.write_str("move_down"),
            Self::Stop => f.write_str("stop"),
            Self::Press { duration } => write!(f, "press({duration:?})"),
            Self::Reset => f.write_str("reset"),
        }
    }
}
