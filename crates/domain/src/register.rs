//! Fixed-width register state of a port expander.
//!
//! A register holds between one and four bytes. Byte `n` carries pins
//! `8n..8n+8`, least significant bit first, which is the order the
//! expanders put on the wire.

use std::fmt;

use crate::binary::BinaryState;
use crate::error::UsageError;

const MAX_SIZE: usize = 4;

/// Bit pattern of an expander's port registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterState {
    bits: u32,
    size: u8,
}

impl RegisterState {
    /// An all-low register of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidRegisterSize`] unless `size` is 1–4.
    pub fn zeroed(size: usize) -> Result<Self, UsageError> {
        if size == 0 || size > MAX_SIZE {
            return Err(UsageError::InvalidRegisterSize(size));
        }
        Ok(Self {
            bits: 0,
            size: u8::try_from(size).map_err(|_| UsageError::InvalidRegisterSize(size))?,
        })
    }

    /// Build a register from the bytes read off the bus.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidRegisterSize`] unless there are 1–4 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UsageError> {
        let mut state = Self::zeroed(bytes.len())?;
        state.bits = bytes
            .iter()
            .enumerate()
            .fold(0, |acc, (index, byte)| acc | (u32::from(*byte) << (8 * index)));
        Ok(state)
    }

    /// A register of `size` bytes with every pin high.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidRegisterSize`] unless `size` is 1–4.
    pub fn all_high(size: usize) -> Result<Self, UsageError> {
        let mut state = Self::zeroed(size)?;
        state.bits = state.mask();
        Ok(state)
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.to_le_bytes()[..self.size()].to_vec()
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        usize::from(self.size)
    }

    /// Number of addressable pins.
    #[must_use]
    pub fn width(&self) -> u8 {
        self.size * 8
    }

    /// # Errors
    ///
    /// Returns [`UsageError::InvalidPin`] when `pin` is out of range.
    pub fn get(&self, pin: u8) -> Result<BinaryState, UsageError> {
        self.check_pin(pin)?;
        Ok(BinaryState::from(self.bits & (1 << pin) != 0))
    }

    /// # Errors
    ///
    /// Returns [`UsageError::InvalidPin`] when `pin` is out of range.
    pub fn set(&mut self, pin: u8, state: BinaryState) -> Result<(), UsageError> {
        self.check_pin(pin)?;
        match state {
            BinaryState::High => self.bits |= 1 << pin,
            BinaryState::Low => self.bits &= !(1 << pin),
        }
        Ok(())
    }

    /// Pins whose level differs between `self` and `newer`, lowest first.
    ///
    /// Registers of different sizes are compared over the narrower width.
    #[must_use]
    pub fn changes(&self, newer: &Self) -> PinChanges {
        let mask = self.mask() & newer.mask();
        PinChanges {
            old: self.bits,
            new: newer.bits,
            remaining: (self.bits ^ newer.bits) & mask,
        }
    }

    fn mask(&self) -> u32 {
        if self.size() == MAX_SIZE {
            u32::MAX
        } else {
            (1 << self.width()) - 1
        }
    }

    fn check_pin(&self, pin: u8) -> Result<(), UsageError> {
        if pin >= self.width() {
            return Err(UsageError::InvalidPin {
                pin,
                width: self.width(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RegisterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        for (index, byte) in bytes.iter().rev().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:08b}")?;
        }
        Ok(())
    }
}

/// Level change of one pin between two register snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinChange {
    pub pin: u8,
    pub old: BinaryState,
    pub new: BinaryState,
}

/// Iterator over the differing bits of two registers.
#[derive(Debug, Clone)]
pub struct PinChanges {
    old: u32,
    new: u32,
    remaining: u32,
}

impl Iterator for PinChanges {
    type Item = PinChange;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pin = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1;
        let bit = 1 << pin;
        Some(PinChange {
            pin: u8::try_from(pin).ok()?,
            old: BinaryState::from(self.old & bit != 0),
            new: BinaryState::from(self.new & bit != 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_empty_register() {
        assert_eq!(
            RegisterState::zeroed(0),
            Err(UsageError::InvalidRegisterSize(0))
        );
    }

    #[test]
    fn should_reject_register_wider_than_four_bytes() {
        let result = RegisterState::from_bytes(&[0; 5]);
        assert_eq!(result, Err(UsageError::InvalidRegisterSize(5)));
    }

    #[test]
    fn should_map_second_byte_to_upper_pins() {
        let state = RegisterState::from_bytes(&[0x00, 0x80]).unwrap();
        assert_eq!(state.get(15).unwrap(), BinaryState::High);
        assert_eq!(state.get(7).unwrap(), BinaryState::Low);
    }

    #[test]
    fn should_return_bytes_in_wire_order() {
        let mut state = RegisterState::zeroed(2).unwrap();
        state.set(0, BinaryState::High).unwrap();
        state.set(9, BinaryState::High).unwrap();
        assert_eq!(state.to_bytes(), vec![0x01, 0x02]);
    }

    #[test]
    fn should_reject_pin_outside_register() {
        let mut state = RegisterState::zeroed(1).unwrap();
        assert_eq!(
            state.set(8, BinaryState::High),
            Err(UsageError::InvalidPin { pin: 8, width: 8 })
        );
    }

    #[test]
    fn should_fill_all_pins_when_all_high() {
        let state = RegisterState::all_high(4).unwrap();
        assert_eq!(state.to_bytes(), vec![0xFF; 4]);
    }

    #[test]
    fn should_report_no_changes_for_equal_registers() {
        let state = RegisterState::from_bytes(&[0xA5]).unwrap();
        assert_eq!(state.changes(&state).count(), 0);
    }

    #[test]
    fn should_report_each_changed_pin_in_ascending_order() {
        let old = RegisterState::from_bytes(&[0b0000_0001, 0x00]).unwrap();
        let new = RegisterState::from_bytes(&[0b0000_0100, 0x80]).unwrap();

        let changes: Vec<_> = old.changes(&new).collect();

        assert_eq!(
            changes,
            vec![
                PinChange {
                    pin: 0,
                    old: BinaryState::High,
                    new: BinaryState::Low,
                },
                PinChange {
                    pin: 2,
                    old: BinaryState::Low,
                    new: BinaryState::High,
                },
                PinChange {
                    pin: 15,
                    old: BinaryState::Low,
                    new: BinaryState::High,
                },
            ]
        );
    }

    #[test]
    fn should_display_most_significant_byte_first() {
        let state = RegisterState::from_bytes(&[0x01, 0x80]).unwrap();
        assert_eq!(state.to_string(), "10000000 00000001");
    }
}
