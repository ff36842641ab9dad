//! I2C slave addresses and the address schemes of the supported expanders.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 7-bit I2C slave address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct I2cAddress(u8);

impl I2cAddress {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value & 0x7F)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Level of one of the hardware address-select pins (A0–A2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressPin {
    Gnd,
    Vdd,
}

/// Compute the address of a PCA9555 from its A0, A1 and A2 straps.
///
/// The base address is `0x20`; each strap tied to VDD sets one of the three
/// low bits, so the reachable range is `0x20..=0x27`.
#[must_use]
pub fn pca9555_address(a0: AddressPin, a1: AddressPin, a2: AddressPin) -> I2cAddress {
    let bit = |pin: AddressPin, shift: u8| match pin {
        AddressPin::Gnd => 0,
        AddressPin::Vdd => 1 << shift,
    };
    I2cAddress::new(0x20 | bit(a0, 0) | bit(a1, 1) | bit(a2, 2))
}
