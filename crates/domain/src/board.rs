//! I/O boards and the ports they expose.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;

/// Supported CCTools I/O boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// Five relays and three open-collector outputs on a PCF8574.
    Hsrel5,
    /// Eight outputs on a PCF8574.
    Hspe8OutputOnly,
    /// Eight inputs with pull-ups on a PCF8574.
    Hspe8InputOnly,
    /// Sixteen inputs with pull-ups on a MAX7311.
    Hspe16InputOnly,
    /// Sixteen outputs on a MAX7311.
    Hspe16OutputOnly,
}

impl BoardKind {
    /// Register size in bytes.
    #[must_use]
    pub fn register_size(self) -> usize {
        match self {
            Self::Hsrel5 | Self::Hspe8OutputOnly | Self::Hspe8InputOnly => 1,
            Self::Hspe16InputOnly | Self::Hspe16OutputOnly => 2,
        }
    }

    #[must_use]
    pub fn has_inputs(self) -> bool {
        matches!(self, Self::Hspe8InputOnly | Self::Hspe16InputOnly)
    }

    #[must_use]
    pub fn has_outputs(self) -> bool {
        !self.has_inputs()
    }

    /// Whether the logical level of `pin` is the inverse of the wire level.
    ///
    /// Relays of the HSREL5 are driven active-low; the inputs boards use
    /// pull-ups so a closed contact reads low.
    #[must_use]
    pub fn is_inverted(self, pin: u8) -> bool {
        match self {
            Self::Hsrel5 => pin <= 4,
            Self::Hspe8InputOnly | Self::Hspe16InputOnly => true,
            Self::Hspe8OutputOnly | Self::Hspe16OutputOnly => false,
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hsrel5 => f.write_str("HSREL5"),
            Self::Hspe8OutputOnly => f.write_str("HSPE8 (output)"),
            Self::Hspe8InputOnly => f.write_str("HSPE8 (input)"),
            Self::Hspe16InputOnly => f.write_str("HSPE16 (input)"),
            Self::Hspe16OutputOnly => f.write_str("HSPE16 (output)"),
        }
    }
}

/// One bit of a board's register, with the polarity it is viewed through.
///
/// Several ports may alias the same physical bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryPort {
    pub device: DeviceId,
    pub pin: u8,
    pub inverted: bool,
}

impl fmt::Display for BinaryPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.pin)?;
        if self.inverted {
            f.write_str(" (inverted)")?;
        }
        Ok(())
    }
}
