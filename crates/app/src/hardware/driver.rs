//! Port-expander drivers: how a register block travels over the bus.

use std::sync::Arc;

use hausbus_domain::address::I2cAddress;
use hausbus_domain::error::BusError;
use hausbus_domain::register::RegisterState;

use crate::ports::I2cBus;

/// Reads and writes the whole port register block of one expander chip.
pub trait PortExpanderDriver: Send + Sync {
    fn address(&self) -> I2cAddress;

    /// Size of the register block in bytes.
    fn register_size(&self) -> usize;

    /// # Errors
    ///
    /// Returns [`BusError`] when the transfer fails.
    fn read(&self) -> Result<RegisterState, BusError>;

    /// # Errors
    ///
    /// Returns [`BusError`] when the transfer fails.
    fn write(&self, state: &RegisterState) -> Result<(), BusError>;
}

fn to_register(address: I2cAddress, bytes: &[u8]) -> Result<RegisterState, BusError> {
    RegisterState::from_bytes(bytes).map_err(|err| BusError::Transfer {
        address,
        reason: err.to_string(),
    })
}

/// Eight quasi-bidirectional ports; the chip has no registers, every read and
/// write transfers the port byte directly.
pub struct Pcf8574Driver {
    address: I2cAddress,
    bus: Arc<dyn I2cBus>,
}

impl Pcf8574Driver {
    pub fn new(address: I2cAddress, bus: Arc<dyn I2cBus>) -> Self {
        Self { address, bus }
    }
}

impl PortExpanderDriver for Pcf8574Driver {
    fn address(&self) -> I2cAddress {
        self.address
    }

    fn register_size(&self) -> usize {
        1
    }

    fn read(&self) -> Result<RegisterState, BusError> {
        let mut buffer = [0u8; 1];
        self.bus
            .execute(self.address, &mut |device| device.read(&mut buffer), true)?;
        to_register(self.address, &buffer)
    }

    fn write(&self, state: &RegisterState) -> Result<(), BusError> {
        let bytes = state.to_bytes();
        self.bus
            .execute(self.address, &mut |device| device.write(&bytes), true)
    }
}

const INPUT_PORT_0: u8 = 0x00;
const OUTPUT_PORT_0: u8 = 0x02;
const CONFIGURATION_PORT_0: u8 = 0x06;

/// Sixteen ports behind a command-byte register map (input `0x00`, output
/// `0x02`, configuration `0x06`), shared by the MAX7311 and the PCA9555.
pub struct Register16Driver {
    chip: &'static str,
    address: I2cAddress,
    bus: Arc<dyn I2cBus>,
}

impl Register16Driver {
    pub fn max7311(address: I2cAddress, bus: Arc<dyn I2cBus>) -> Self {
        Self {
            chip: "MAX7311",
            address,
            bus,
        }
    }

    pub fn pca9555(address: I2cAddress, bus: Arc<dyn I2cBus>) -> Self {
        Self {
            chip: "PCA9555",
            address,
            bus,
        }
    }

    #[must_use]
    pub fn chip(&self) -> &'static str {
        self.chip
    }

    /// Configure port directions; a set bit makes the port an input.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the transfer fails.
    pub fn configure_inputs(&self, input_mask: u16) -> Result<(), BusError> {
        let [low, high] = input_mask.to_le_bytes();
        self.bus.execute(
            self.address,
            &mut |device| device.write(&[CONFIGURATION_PORT_0, low, high]),
            true,
        )
    }
}

impl PortExpanderDriver for Register16Driver {
    fn address(&self) -> I2cAddress {
        self.address
    }

    fn register_size(&self) -> usize {
        2
    }

    fn read(&self) -> Result<RegisterState, BusError> {
        let mut buffer = [0u8; 2];
        self.bus.execute(
            self.address,
            &mut |device| device.write_read(&[INPUT_PORT_0], &mut buffer),
            true,
        )?;
        to_register(self.address, &buffer)
    }

    fn write(&self, state: &RegisterState) -> Result<(), BusError> {
        let mut bytes = vec![OUTPUT_PORT_0];
        bytes.extend(state.to_bytes());
        self.bus
            .execute(self.address, &mut |device| device.write(&bytes), true)
    }
}
