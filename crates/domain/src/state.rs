//! Component states and status snapshots.
//!
//! A component reports its status as a set of [`FeatureState`]s, one per
//! capability it exposes: a lamp reports power, a roller shutter reports
//! power, movement and position, a state machine reports its current state
//! id and derived power.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalMovingState {
    Stopped,
    MovingUp,
    MovingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Released,
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionDetectionState {
    Idle,
    MotionDetected,
    Disabled,
}

/// How long a button was held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressDuration {
    #[default]
    Short,
    Long,
}

/// Name of a state machine state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    pub const OFF: &'static str = "Off";
    pub const ON: &'static str = "On";

    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn off() -> Self {
        Self::new(Self::OFF)
    }

    #[must_use]
    pub fn on() -> Self {
        Self::new(Self::ON)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_off(&self) -> bool {
        self.0 == Self::OFF
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One facet of a component's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "feature", content = "value", rename_all = "snake_case")]
pub enum FeatureState {
    Power(PowerState),
    VerticalMoving(VerticalMovingState),
    Button(ButtonState),
    MotionDetection(MotionDetectionState),
    State(StateId),
    Position(u32),
}

impl From<PowerState> for FeatureState {
    fn from(value: PowerState) -> Self {
        Self::Power(value)
    }
}

impl From<VerticalMovingState> for FeatureState {
    fn from(value: VerticalMovingState) -> Self {
        Self::VerticalMoving(value)
    }
}

impl From<ButtonState> for FeatureState {
    fn from(value: ButtonState) -> Self {
        Self::Button(value)
    }
}

impl From<MotionDetectionState> for FeatureState {
    fn from(value: MotionDetectionState) -> Self {
        Self::MotionDetection(value)
    }
}

impl From<StateId> for FeatureState {
    fn from(value: StateId) -> Self {
        Self::State(value)
    }
}

/// Snapshot of every feature state a component currently reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentStatus(Vec<FeatureState>);

impl ComponentStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the facet of the same kind.
    #[must_use]
    pub fn with(mut self, state: impl Into<FeatureState>) -> Self {
        let state = state.into();
        let kind = std::mem::discriminant(&state);
        self.0.retain(|existing| std::mem::discriminant(existing) != kind);
        self.0.push(state);
        self
    }

    /// Whether the snapshot contains exactly this facet value.
    #[must_use]
    pub fn has(&self, state: impl Into<FeatureState>) -> bool {
        let state = state.into();
        self.0.contains(&state)
    }

    #[must_use]
    pub fn power(&self) -> Option<PowerState> {
        self.0.iter().find_map(|state| match state {
            FeatureState::Power(power) => Some(*power),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureState> {
        self.0.iter()
    }
}
