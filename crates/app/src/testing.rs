//! In-memory doubles shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use hausbus_domain::address::I2cAddress;
use hausbus_domain::binary::{BinaryState, WriteMode};
use hausbus_domain::error::BusError;

use crate::binary_io::{BinaryInput, BinaryOutput, BinaryStateChange, BinaryStateListener};
use crate::clock::Clock;
use crate::ports::{I2cBus, I2cTransaction};
use crate::subscription::{Listeners, Subscription};

pub(crate) fn clock() -> Clock {
    Clock::new(Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap())
}

#[derive(Default)]
struct FakeDevice {
    response: Vec<u8>,
    writes: Vec<Vec<u8>>,
    failing: bool,
}

/// Bus answering every read with a configured response and recording writes.
#[derive(Default)]
pub(crate) struct FakeBus {
    devices: Mutex<HashMap<I2cAddress, FakeDevice>>,
}

impl FakeBus {
    pub(crate) fn set_response(&self, address: I2cAddress, bytes: Vec<u8>) {
        self.devices.lock().unwrap().entry(address).or_default().response = bytes;
    }

    pub(crate) fn writes(&self, address: I2cAddress) -> Vec<Vec<u8>> {
        self.devices
            .lock()
            .unwrap()
            .get(&address)
            .map(|device| device.writes.clone())
            .unwrap_or_default()
    }

    pub(crate) fn last_write(&self, address: I2cAddress) -> Option<Vec<u8>> {
        self.writes(address).pop()
    }

    pub(crate) fn fail(&self, address: I2cAddress) {
        self.devices.lock().unwrap().entry(address).or_default().failing = true;
    }

    pub(crate) fn recover(&self, address: I2cAddress) {
        self.devices.lock().unwrap().entry(address).or_default().failing = false;
    }
}

struct FakeTransaction<'a> {
    address: I2cAddress,
    device: &'a mut FakeDevice,
}

impl I2cTransaction for FakeTransaction<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.device.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        if self.device.response.len() < buffer.len() {
            return Err(BusError::ShortRead {
                address: self.address,
                expected: buffer.len(),
                actual: self.device.response.len(),
            });
        }
        buffer.copy_from_slice(&self.device.response[..buffer.len()]);
        Ok(())
    }
}

impl I2cBus for FakeBus {
    fn execute(
        &self,
        address: I2cAddress,
        action: &mut dyn FnMut(&mut dyn I2cTransaction) -> Result<(), BusError>,
        _use_cache: bool,
    ) -> Result<(), BusError> {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.entry(address).or_default();
        if device.failing {
            return Err(BusError::NoAcknowledge(address));
        }
        action(&mut FakeTransaction { address, device })
    }
}

/// Input whose level is set by the test.
#[derive(Default)]
pub(crate) struct FakeInput {
    state: Mutex<BinaryState>,
    listeners: Listeners<BinaryStateListener>,
}

impl FakeInput {
    pub(crate) fn set(&self, new: BinaryState) {
        let old = std::mem::replace(&mut *self.state.lock().unwrap(), new);
        if old != new {
            for listener in self.listeners.snapshot() {
                listener(BinaryStateChange { old, new });
            }
        }
    }
}

impl BinaryInput for FakeInput {
    fn read(&self) -> BinaryState {
        *self.state.lock().unwrap()
    }

    fn on_state_changed(&self, listener: Arc<BinaryStateListener>) -> Subscription {
        self.listeners.add(listener)
    }
}

/// Output remembering every write.
#[derive(Default)]
pub(crate) struct RecordingOutput {
    writes: Mutex<Vec<(BinaryState, WriteMode)>>,
    commits: Mutex<usize>,
}

impl RecordingOutput {
    pub(crate) fn writes(&self) -> Vec<(BinaryState, WriteMode)> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn commits(&self) -> usize {
        *self.commits.lock().unwrap()
    }
}

impl BinaryOutput for RecordingOutput {
    fn read(&self) -> BinaryState {
        self.writes
            .lock()
            .unwrap()
            .last()
            .map_or(BinaryState::Low, |(state, _)| *state)
    }

    fn write(&self, state: BinaryState, mode: WriteMode) {
        self.writes.lock().unwrap().push((state, mode));
    }

    fn commit(&self) {
        *self.commits.lock().unwrap() += 1;
    }
}
