//! Event: an immutable record of something that happened.
//!
//! Events are published on the in-process bus when a component's status
//! changes, when an input pin of a board toggles, and when a scheduled task
//! faults.

use serde::{Deserialize, Serialize};

use crate::binary::BinaryState;
use crate::id::{ComponentId, DeviceId};
use crate::state::ComponentStatus;
use crate::time::{self, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Record `kind` as happening now.
    #[must_use]
    pub fn now(kind: EventKind) -> Self {
        Self::at(time::now(), kind)
    }

    #[must_use]
    pub fn at(timestamp: Timestamp, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ComponentStatusChanged {
        component_id: ComponentId,
        old: ComponentStatus,
        new: ComponentStatus,
    },
    PinChanged {
        device_id: DeviceId,
        pin: u8,
        old: BinaryState,
        new: BinaryState,
    },
    ScheduleFaulted {
        name: String,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PowerState;

    #[test]
    fn should_serialize_kind_inline_with_type_tag() {
        let event = Event::now(EventKind::ComponentStatusChanged {
            component_id: ComponentId::new("hall.lamp").unwrap(),
            old: ComponentStatus::new().with(PowerState::Off),
            new: ComponentStatus::new().with(PowerState::On),
        });

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "component_status_changed");
        assert_eq!(json["component_id"], "hall.lamp");
        assert!(json["timestamp"].is_string());
    }
}
