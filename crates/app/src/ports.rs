//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the engine and the outside world.
//! They are defined here (in `app`) so that both the engine and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod daylight;
pub mod event_bus;
pub mod i2c;

pub use daylight::{DaylightSource, FixedDaylight};
pub use event_bus::EventPublisher;
pub use i2c::{I2cBus, I2cTransaction};
