//! I2C port-expander boards: drivers, the register cache with its diff/commit
//! protocol, per-pin views and the CCTools board catalogue.

pub mod board;
pub mod cctools;
pub mod driver;
pub mod port;

pub use board::{BoardOptions, IoBoard, PinListener};
pub use cctools::CcToolsBoard;
pub use driver::{Pcf8574Driver, PortExpanderDriver, Register16Driver};
pub use port::BoardPort;
