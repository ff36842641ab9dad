//! Components and the capability traits they implement.
//!
//! A component is a plain struct that implements the capabilities it
//! supports: [`Stateful`] when it reports a status, [`Commandable`] when it
//! accepts [`Command`]s. Anything implementing both is a
//! [`ManagedComponent`] and can be put into the
//! [`ComponentRegistry`](crate::registry::ComponentRegistry).

pub mod button;
pub mod motion_detector;
pub mod roller_shutter;
pub mod state_machine;

use std::sync::Arc;

use hausbus_domain::command::Command;
use hausbus_domain::error::{HausbusError, UsageError};
use hausbus_domain::id::ComponentId;
use hausbus_domain::state::ComponentStatus;

use crate::subscription::{Listeners, Subscription};

pub use button::Button;
pub use motion_detector::MotionDetector;
pub use roller_shutter::{PortBasedRollerShutterAdapter, RollerShutter, RollerShutterAdapter};
pub use state_machine::{StateMachine, StateMachineState};

/// Receives `(old, new)` after a component's status changed.
pub type StatusListener = dyn Fn(&ComponentStatus, &ComponentStatus) + Send + Sync;

pub trait Component: Send + Sync {
    fn id(&self) -> &ComponentId;

    /// Short lowercase name of the component type, e.g. `"button"`.
    fn kind(&self) -> &'static str;
}

pub trait Stateful: Component {
    fn status(&self) -> ComponentStatus;

    fn on_status_changed(&self, listener: Arc<StatusListener>) -> Subscription;
}

pub trait Commandable: Component {
    /// # Errors
    ///
    /// Returns [`UsageError::CommandNotSupported`] for commands outside the
    /// component's capabilities, or the error raised while applying it.
    fn execute(&self, command: &Command) -> Result<(), HausbusError>;
}

/// A component the registry can list and command.
pub trait ManagedComponent: Stateful + Commandable {}

impl<T: Stateful + Commandable> ManagedComponent for T {}

pub(crate) fn unsupported(id: &ComponentId, command: &Command) -> HausbusError {
    UsageError::CommandNotSupported {
        component: id.to_string(),
        command: command.to_string(),
    }
    .into()
}

/// Notify `listeners` when `old` and `new` differ.
pub(crate) fn publish_status(
    listeners: &Listeners<StatusListener>,
    old: &ComponentStatus,
    new: &ComponentStatus,
) {
    if old == new {
        return;
    }
    for listener in listeners.snapshot() {
        listener(old, new);
    }
}
