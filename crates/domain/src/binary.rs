//! Binary signal level of a single port.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Level of one bit as seen by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryState {
    #[default]
    Low,
    High,
}

impl BinaryState {
    #[must_use]
    pub fn invert(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }

    /// Invert the level only when `inverted` is set.
    #[must_use]
    pub fn invert_if(self, inverted: bool) -> Self {
        if inverted { self.invert() } else { self }
    }

    #[must_use]
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

impl From<bool> for BinaryState {
    fn from(value: bool) -> Self {
        if value { Self::High } else { Self::Low }
    }
}

impl From<BinaryState> for bool {
    fn from(value: BinaryState) -> Self {
        value.is_high()
    }
}

impl fmt::Display for BinaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Write a binary level immediately or stage it for a later commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Commit,
    Stage,
}
