//! # hausbus-adapter-i2c-virtual
//!
//! Virtual I2C bus with simulated devices, for tests and demonstration
//! setups without hardware.
//!
//! Every attached device answers reads with its configured input bytes and
//! records the bytes written to it. Reads start at the first input byte
//! regardless of any register pointer written before, which matches how the
//! port-expander drivers use the bus.
//!
//! ## Dependency rule
//!
//! Depends on `hausbus-app` (port traits) and `hausbus-domain` only.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hausbus_app::ports::{I2cBus, I2cTransaction};
use hausbus_domain::address::I2cAddress;
use hausbus_domain::error::BusError;

#[derive(Debug, Default)]
struct VirtualDevice {
    input: Vec<u8>,
    writes: Vec<Vec<u8>>,
    failing: bool,
}

#[derive(Debug, Default)]
struct BusState {
    devices: HashMap<I2cAddress, VirtualDevice>,
    last_used_address: Option<I2cAddress>,
}

/// Simulated I2C bus.
///
/// Transactions are serialized by one lock, like a real bus adapter holding
/// the bus for the duration of an action.
#[derive(Debug, Default)]
pub struct VirtualI2cBus {
    state: Mutex<BusState>,
}

impl VirtualI2cBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device answering reads with `input`.
    pub fn attach(&self, address: I2cAddress, input: Vec<u8>) {
        tracing::debug!(%address, "virtual device attached");
        self.lock().devices.insert(
            address,
            VirtualDevice {
                input,
                ..VirtualDevice::default()
            },
        );
    }

    /// Change what the device at `address` answers. Returns `false` when no
    /// device is attached there.
    pub fn set_input(&self, address: I2cAddress, input: Vec<u8>) -> bool {
        match self.lock().devices.get_mut(&address) {
            Some(device) => {
                device.input = input;
                true
            }
            None => false,
        }
    }

    /// Make every transaction with `address` fail until reset.
    pub fn set_failing(&self, address: I2cAddress, failing: bool) {
        if let Some(device) = self.lock().devices.get_mut(&address) {
            device.failing = failing;
        }
    }

    #[must_use]
    pub fn last_written(&self, address: I2cAddress) -> Option<Vec<u8>> {
        self.lock()
            .devices
            .get(&address)
            .and_then(|device| device.writes.last().cloned())
    }

    #[must_use]
    pub fn writes(&self, address: I2cAddress) -> Vec<Vec<u8>> {
        self.lock()
            .devices
            .get(&address)
            .map(|device| device.writes.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn write_count(&self, address: I2cAddress) -> usize {
        self.lock()
            .devices
            .get(&address)
            .map_or(0, |device| device.writes.len())
    }

    /// Address of the most recent transaction, successful or not.
    #[must_use]
    pub fn last_used_address(&self) -> Option<I2cAddress> {
        self.lock().last_used_address
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Transaction<'a> {
    address: I2cAddress,
    device: &'a mut VirtualDevice,
}

impl I2cTransaction for Transaction<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        tracing::trace!(address = %self.address, ?bytes, "virtual write");
        self.device.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        let input = &self.device.input;
        if input.len() < buffer.len() {
            return Err(BusError::ShortRead {
                address: self.address,
                expected: buffer.len(),
                actual: input.len(),
            });
        }
        buffer.copy_from_slice(&input[..buffer.len()]);
        Ok(())
    }
}

impl I2cBus for VirtualI2cBus {
    fn execute(
        &self,
        address: I2cAddress,
        action: &mut dyn FnMut(&mut dyn I2cTransaction) -> Result<(), BusError>,
        _use_cache: bool,
    ) -> Result<(), BusError> {
        let mut state = self.lock();
        state.last_used_address = Some(address);
        let Some(device) = state.devices.get_mut(&address) else {
            return Err(BusError::NoAcknowledge(address));
        };
        if device.failing {
            return Err(BusError::Transfer {
                address,
                reason: "simulated failure".into(),
            });
        }
        action(&mut Transaction { address, device })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hausbus_app::hardware::{BoardOptions, IoBoard, Pcf8574Driver, Register16Driver};
    use hausbus_domain::binary::BinaryState;
    use hausbus_domain::id::DeviceId;

    use super::*;

    const ADDRESS: I2cAddress = I2cAddress::new(0x20);

    #[test]
    fn should_not_acknowledge_unknown_address() {
        let bus = VirtualI2cBus::new();

        let result = bus.execute(ADDRESS, &mut |device| device.write(&[0x00]), true);

        assert_eq!(result, Err(BusError::NoAcknowledge(ADDRESS)));
        assert_eq!(bus.last_used_address(), Some(ADDRESS));
    }

    #[test]
    fn should_record_writes_and_answer_reads() {
        let bus = VirtualI2cBus::new();
        bus.attach(ADDRESS, vec![0xAB, 0xCD]);
        let mut buffer = [0u8; 2];

        bus.execute(ADDRESS, &mut |device| device.write_read(&[0x00], &mut buffer), true)
            .unwrap();

        assert_eq!(buffer, [0xAB, 0xCD]);
        assert_eq!(bus.last_written(ADDRESS), Some(vec![0x00]));
        assert_eq!(bus.write_count(ADDRESS), 1);
    }

    #[test]
    fn should_fail_short_read() {
        let bus = VirtualI2cBus::new();
        bus.attach(ADDRESS, vec![0x01]);
        let mut buffer = [0u8; 2];

        let result = bus.execute(ADDRESS, &mut |device| device.read(&mut buffer), false);

        assert!(matches!(result, Err(BusError::ShortRead { expected: 2, actual: 1, .. })));
    }

    #[test]
    fn should_fail_while_marked_failing() {
        let bus = VirtualI2cBus::new();
        bus.attach(ADDRESS, vec![0x00]);
        bus.set_failing(ADDRESS, true);

        let result = bus.execute(ADDRESS, &mut |device| device.write(&[0x01]), true);

        assert!(matches!(result, Err(BusError::Transfer { .. })));
        assert_eq!(bus.write_count(ADDRESS), 0);
    }

    #[test]
    fn should_drive_pcf8574_board() {
        let bus = Arc::new(VirtualI2cBus::new());
        bus.attach(ADDRESS, vec![0xFF]);
        let board = IoBoard::new(
            DeviceId::new("relays").unwrap(),
            Pcf8574Driver::new(ADDRESS, bus.clone()),
            BoardOptions::default(),
        )
        .unwrap();

        board.set_port_state(3, BinaryState::High, true).unwrap();

        assert_eq!(bus.last_written(ADDRESS), Some(vec![0b0000_1000]));
    }

    #[test]
    fn should_report_input_changes_to_board() {
        let bus = Arc::new(VirtualI2cBus::new());
        bus.attach(ADDRESS, vec![0x00, 0x00]);
        let board = IoBoard::new(
            DeviceId::new("inputs").unwrap(),
            Register16Driver::max7311(ADDRESS, bus.clone()),
            BoardOptions::default(),
        )
        .unwrap();

        assert!(bus.set_input(ADDRESS, vec![0x04, 0x00]));
        let changed = board.fetch_state().unwrap();

        assert_eq!(changed, 1);
        assert_eq!(board.port_state(2).unwrap(), BinaryState::High);
    }
}
