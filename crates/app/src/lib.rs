//! # hausbus-app
//!
//! Application layer: the reactive engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `I2cBus`: transactions against one I2C bus
//!   - `EventPublisher`: publish domain events
//!   - `DaylightSource`: today's sunrise and sunset
//! - Provide the engine itself:
//!   - `Clock` and `Scheduler`: the only time source, delayed actions and
//!     recurring schedules
//!   - `Trigger`, `Condition` and `ConditionsValidator`: event sources and
//!     predicates automations are built from
//!   - `IoBoard`: register cache and diff/commit protocol of port-expander
//!     boards, with the CCTools board presets
//!   - components (`StateMachine`, `Button`, `MotionDetector`,
//!     `RollerShutter`) and automations (`TurnOnAndOffAutomation`,
//!     `ConditionalOnAutomation`)
//!   - `ComponentRegistry`: lookup by id and status events on the bus
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `hausbus-domain` only (plus `tokio` for channels and the clock
//! loop). Never imports adapter crates. Adapters depend on *this* crate, not
//! the reverse.

pub mod automation;
pub mod binary_io;
pub mod clock;
pub mod component;
pub mod condition;
pub mod event_bus;
pub mod hardware;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod settings;
pub mod subscription;
pub mod trigger;

mod guard;
mod sync;

#[cfg(test)]
mod testing;
