//! I2C bus port.
//!
//! Board drivers describe what to do with a device as a closure over an
//! [`I2cTransaction`]; the bus adapter decides how the transfer reaches the
//! hardware. Implementations serialize access to the bus.

use hausbus_domain::address::I2cAddress;
use hausbus_domain::error::BusError;

/// Transfers available on one device while the bus is held.
pub trait I2cTransaction {
    /// # Errors
    ///
    /// Returns [`BusError`] when the device does not acknowledge the transfer.
    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    /// Fill `buffer` completely from the device.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the transfer fails or is short.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError>;

    /// Write `bytes` then read into `buffer` without releasing the bus.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when either half of the transfer fails.
    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<(), BusError> {
        self.write(bytes)?;
        self.read(buffer)
    }
}

/// Shared access to an I2C bus.
pub trait I2cBus: Send + Sync {
    /// Run `action` against the device at `address` with exclusive access to
    /// the bus. With `use_cache`, the adapter may keep the device handle open
    /// between calls.
    ///
    /// # Errors
    ///
    /// Returns the [`BusError`] raised by the adapter or by `action`.
    fn execute(
        &self,
        address: I2cAddress,
        action: &mut dyn FnMut(&mut dyn I2cTransaction) -> Result<(), BusError>,
        use_cache: bool,
    ) -> Result<(), BusError>;
}
