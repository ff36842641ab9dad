//! Common error types used across the workspace.
//!
//! Each failure family has its own typed error; [`HausbusError`] is the
//! umbrella type returned by fallible operations and converts from every
//! family through `#[from]`.

use crate::address::I2cAddress;

/// Top-level error for hausbus operations.
#[derive(Debug, thiserror::Error)]
pub enum HausbusError {
    /// The caller misused an API (programming or configuration error).
    #[error("usage error")]
    Usage(#[from] UsageError),

    /// A bus transaction failed.
    #[error("bus error")]
    Bus(#[from] BusError),

    /// A looked-up object does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An action body failed for a reason outside the engine.
    #[error("action failed")]
    Action(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HausbusError {
    /// Wrap an arbitrary error raised by an action body.
    pub fn action(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Action(err.into())
    }
}

/// Misuse of the engine, reported when components are wired together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("schedule '{0}' is already registered")]
    DuplicateSchedule(String),

    #[error("state '{0}' is already defined")]
    DuplicateState(String),

    #[error("state '{0}' is not defined")]
    UnknownState(String),

    #[error("state machine has no states")]
    NoStates,

    #[error("component '{0}' is already registered")]
    DuplicateComponent(String),

    #[error("area '{0}' is already registered")]
    DuplicateArea(String),

    #[error("pin {pin} is outside a register of {width} bits")]
    InvalidPin { pin: u8, width: u8 },

    #[error("register size {0} is not between 1 and 4 bytes")]
    InvalidRegisterSize(usize),

    #[error("command '{command}' is not supported by '{component}'")]
    CommandNotSupported { component: String, command: String },

    #[error("port {pin} is not available as {direction} on this board")]
    PortNotAvailable { pin: u8, direction: &'static str },
}

/// Failure of a single bus transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("no device acknowledged at {0}")]
    NoAcknowledge(I2cAddress),

    #[error("transfer with {address} failed: {reason}")]
    Transfer { address: I2cAddress, reason: String },

    #[error("expected {expected} bytes from {address}, got {actual}")]
    ShortRead {
        address: I2cAddress,
        expected: usize,
        actual: usize,
    },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{id}' not found")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub id: String,
}
