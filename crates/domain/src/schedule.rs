//! Schedule bookkeeping visible outside the scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    #[default]
    Idle,
    Running,
    Faulted,
}

/// Point-in-time view of one registered schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub name: String,
    /// `None` for one-shot delayed actions.
    pub interval: Option<Duration>,
    pub status: ScheduleStatus,
    pub next_execution: Timestamp,
    pub last_execution: Option<Timestamp>,
    pub last_duration: Option<Duration>,
    pub last_error: Option<String>,
}

impl ScheduleSnapshot {
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.interval.is_some()
    }
}
