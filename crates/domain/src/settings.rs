//! Runtime-adjustable settings of components and automations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings of a turn-on-and-off automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    pub is_enabled: bool,
    /// Delay between the end of a detection (or a manual press) and the
    /// automatic turn-off.
    pub duration: Duration,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            duration: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDetectorSettings {
    pub is_enabled: bool,
}

impl Default for MotionDetectorSettings {
    fn default() -> Self {
        Self { is_enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    pub is_enabled: bool,
    /// How long a button must be held before it counts as a long press.
    pub pressed_long_duration: Duration,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            pressed_long_duration: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollerShutterSettings {
    /// Movement is stopped after this long even without a stop command.
    pub auto_off_timeout: Duration,
    /// Travel time from fully open to fully closed, in milliseconds.
    pub max_position: u32,
}

impl Default for RollerShutterSettings {
    fn default() -> Self {
        Self {
            auto_off_timeout: Duration::from_secs(22),
            max_position: 20_000,
        }
    }
}
