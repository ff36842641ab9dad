//! CCTools I/O boards: which driver, initial state and port polarity each
//! board kind uses.

use std::sync::Arc;

use hausbus_domain::address::I2cAddress;
use hausbus_domain::board::BoardKind;
use hausbus_domain::error::{HausbusError, UsageError};
use hausbus_domain::id::DeviceId;
use hausbus_domain::register::RegisterState;

use crate::hardware::board::{BoardOptions, IoBoard};
use crate::hardware::driver::{Pcf8574Driver, Register16Driver};
use crate::hardware::port::BoardPort;
use crate::ports::I2cBus;

/// A CCTools board with its kind-specific setup applied.
#[derive(Clone, Debug)]
pub struct CcToolsBoard {
    kind: BoardKind,
    board: IoBoard,
}

impl CcToolsBoard {
    /// Create the board and bring the hardware into its initial state.
    ///
    /// Bus failures during setup are logged; the board stays usable and
    /// recovers on the next successful poll or commit.
    ///
    /// # Errors
    ///
    /// Returns [`HausbusError::Usage`] only for programming errors.
    pub fn new(
        kind: BoardKind,
        id: DeviceId,
        address: I2cAddress,
        bus: Arc<dyn I2cBus>,
        options: BoardOptions,
    ) -> Result<Self, HausbusError> {
        let board = match kind {
            BoardKind::Hsrel5 => {
                let board = IoBoard::new(id, Pcf8574Driver::new(address, bus), options)?;
                // Relays are active-low: all bits high switches everything off.
                board.set_state(RegisterState::all_high(1)?, false)?;
                if let Err(err) = board.commit_changes(true) {
                    tracing::warn!(device = %board.id(), %err, "initializing relays failed");
                }
                board
            }
            BoardKind::Hspe8OutputOnly => {
                let board = IoBoard::new(id, Pcf8574Driver::new(address, bus), options)?;
                board.poll();
                board
            }
            BoardKind::Hspe8InputOnly => {
                let board = IoBoard::new(id, Pcf8574Driver::new(address, bus), options)?;
                // Quasi-bidirectional ports read as inputs once driven high.
                board.set_state(RegisterState::all_high(1)?, false)?;
                if let Err(err) = board.commit_changes(true) {
                    tracing::warn!(device = %board.id(), %err, "configuring inputs failed");
                }
                board.poll();
                board
            }
            BoardKind::Hspe16InputOnly => {
                let driver = Register16Driver::max7311(address, bus);
                if let Err(err) = driver.configure_inputs(0xFFFF) {
                    tracing::warn!(device = %id, %err, "configuring inputs failed");
                }
                let board = IoBoard::new(id, driver, options)?;
                board.poll();
                board
            }
            BoardKind::Hspe16OutputOnly => {
                let driver = Register16Driver::max7311(address, bus);
                if let Err(err) = driver.configure_inputs(0x0000) {
                    tracing::warn!(device = %id, %err, "configuring outputs failed");
                }
                let board = IoBoard::new(id, driver, options)?;
                board.poll();
                board
            }
        };
        tracing::info!(device = %board.id(), %kind, %address, "board initialized");
        Ok(Self { kind, board })
    }

    #[must_use]
    pub fn kind(&self) -> BoardKind {
        self.kind
    }

    #[must_use]
    pub fn board(&self) -> &IoBoard {
        &self.board
    }

    /// Output `pin`, already inverted where the hardware is active-low.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError`] for input-only boards or out-of-range pins.
    pub fn output(&self, pin: u8) -> Result<BoardPort, UsageError> {
        if !self.kind.has_outputs() {
            return Err(UsageError::PortNotAvailable {
                pin,
                direction: "output",
            });
        }
        self.polarized(pin)
    }

    /// Input `pin`, inverted for the pull-up wiring.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError`] for output-only boards or out-of-range pins.
    pub fn input(&self, pin: u8) -> Result<BoardPort, UsageError> {
        if !self.kind.has_inputs() {
            return Err(UsageError::PortNotAvailable {
                pin,
                direction: "input",
            });
        }
        self.polarized(pin)
    }

    fn polarized(&self, pin: u8) -> Result<BoardPort, UsageError> {
        let port = self.board.port(pin)?;
        Ok(if self.kind.is_inverted(pin) {
            port.with_inverted_state()
        } else {
            port
        })
    }
}
