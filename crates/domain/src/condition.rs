//! Outcome and combination of conditions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionState {
    Fulfilled,
    NotFulfilled,
}

impl ConditionState {
    #[must_use]
    pub fn is_fulfilled(self) -> bool {
        self == Self::Fulfilled
    }

    #[must_use]
    pub fn invert(self) -> Self {
        match self {
            Self::Fulfilled => Self::NotFulfilled,
            Self::NotFulfilled => Self::Fulfilled,
        }
    }
}

impl From<bool> for ConditionState {
    fn from(value: bool) -> Self {
        if value {
            Self::Fulfilled
        } else {
            Self::NotFulfilled
        }
    }
}

/// How a condition joins the result accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionRelation {
    And,
    Or,
}

impl ConditionRelation {
    /// Combine the accumulated result with the next one.
    #[must_use]
    pub fn combine(self, accumulated: ConditionState, next: ConditionState) -> ConditionState {
        match self {
            Self::And => ConditionState::from(accumulated.is_fulfilled() && next.is_fulfilled()),
            Self::Or => ConditionState::from(accumulated.is_fulfilled() || next.is_fulfilled()),
        }
    }
}
