//! Register cache of one I/O board and its diff/commit protocol.
//!
//! The board keeps two copies of the register block: `state`, which local
//! readers see and writers modify, and `committed`, the last value written
//! to the bus. A commit transfers `state` only when it differs from
//! `committed`. Fetching reads the block, and when it differs from the cache
//! raises one event per changed pin.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hausbus_domain::binary::BinaryState;
use hausbus_domain::board::BinaryPort;
use hausbus_domain::error::{BusError, HausbusError, UsageError};
use hausbus_domain::id::DeviceId;
use hausbus_domain::register::{PinChange, RegisterState};

use crate::hardware::driver::PortExpanderDriver;
use crate::hardware::port::BoardPort;
use crate::scheduler::Scheduler;
use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;
use crate::trigger::Trigger;

pub type PinListener = dyn Fn(&PinChange) + Send + Sync;

/// Tuning of a board's polling behaviour.
#[derive(Debug, Clone, Copy)]
pub struct BoardOptions {
    /// A fetch slower than this is logged as a warning.
    pub slow_fetch_threshold: Duration,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            slow_fetch_threshold: Duration::from_millis(25),
        }
    }
}

#[derive(Debug)]
struct Registers {
    state: RegisterState,
    committed: RegisterState,
}

struct BoardInner {
    id: DeviceId,
    driver: Box<dyn PortExpanderDriver>,
    options: BoardOptions,
    /// Serializes whole fetch cycles so pin events keep their order.
    fetching: Mutex<()>,
    registers: Mutex<Registers>,
    listeners: Listeners<PinListener>,
}

/// Shared handle to one port-expander board.
#[derive(Clone)]
pub struct IoBoard {
    inner: Arc<BoardInner>,
}

impl IoBoard {
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidRegisterSize`] when the driver reports an
    /// unsupported register size.
    pub fn new(
        id: DeviceId,
        driver: impl PortExpanderDriver + 'static,
        options: BoardOptions,
    ) -> Result<Self, UsageError> {
        let empty = RegisterState::zeroed(driver.register_size())?;
        Ok(Self {
            inner: Arc::new(BoardInner {
                id,
                driver: Box::new(driver),
                options,
                fetching: Mutex::new(()),
                registers: Mutex::new(Registers {
                    state: empty,
                    committed: empty,
                }),
                listeners: Listeners::new(),
            }),
        })
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.inner.id
    }

    /// Number of pins on the board.
    #[must_use]
    pub fn width(&self) -> u8 {
        lock(&self.inner.registers).state.width()
    }

    /// Current (possibly uncommitted) register state.
    #[must_use]
    pub fn state(&self) -> RegisterState {
        lock(&self.inner.registers).state
    }

    /// Last register state written to or read from the bus.
    #[must_use]
    pub fn committed_state(&self) -> RegisterState {
        lock(&self.inner.registers).committed
    }

    /// Read the register block and raise an event for every changed pin.
    ///
    /// Returns the number of changed pins. On failure the cache is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the read fails.
    pub fn fetch_state(&self) -> Result<usize, BusError> {
        let _cycle = lock(&self.inner.fetching);
        let started = Instant::now();
        let changes: Vec<PinChange> = {
            let mut registers = lock(&self.inner.registers);
            let fetched = self.inner.driver.read()?;
            if fetched == registers.state {
                Vec::new()
            } else {
                let changes = registers.state.changes(&fetched).collect();
                tracing::info!(
                    device = %self.inner.id,
                    old = %registers.state,
                    new = %fetched,
                    "fetched different state"
                );
                registers.state = fetched;
                registers.committed = fetched;
                changes
            }
        };
        let elapsed = started.elapsed();
        if elapsed > self.inner.options.slow_fetch_threshold {
            tracing::warn!(device = %self.inner.id, ?elapsed, "polling board took longer than expected");
        }

        let listeners = self.inner.listeners.snapshot();
        for change in &changes {
            for listener in &listeners {
                listener(change);
            }
        }
        Ok(changes.len())
    }

    /// Fetch, logging bus failures instead of returning them.
    pub fn poll(&self) {
        if let Err(err) = self.fetch_state() {
            tracing::warn!(device = %self.inner.id, %err, "fetching board state failed");
        }
    }

    /// Register a recurring poll of this board on `scheduler`.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateSchedule`] when the board is already
    /// polled.
    pub fn register_polling(&self, scheduler: &Scheduler, interval: Duration) -> Result<(), HausbusError> {
        let board = self.clone();
        scheduler.register_schedule(format!("poll:{}", self.inner.id), interval, move || {
            board.poll();
            Ok(())
        })
    }

    /// Fetch immediately whenever `interrupt` fires, outside the poll cadence.
    pub fn refresh_on(&self, interrupt: &Trigger) -> Subscription {
        let board = self.clone();
        interrupt.attach(move || {
            board.poll();
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns [`UsageError::InvalidPin`] when `pin` is out of range.
    pub fn port_state(&self, pin: u8) -> Result<BinaryState, UsageError> {
        lock(&self.inner.registers).state.get(pin)
    }

    /// Set one pin; with `commit` the register is written when it changed.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidPin`] for an out-of-range pin or
    /// [`BusError`] when the commit fails.
    pub fn set_port_state(&self, pin: u8, state: BinaryState, commit: bool) -> Result<(), HausbusError> {
        let mut registers = lock(&self.inner.registers);
        registers.state.set(pin, state)?;
        if commit {
            self.commit_locked(&mut registers, false)?;
        }
        Ok(())
    }

    /// Replace the whole register state.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidRegisterSize`] when `state` has the wrong
    /// size or [`BusError`] when the commit fails.
    pub fn set_state(&self, state: RegisterState, commit: bool) -> Result<(), HausbusError> {
        let mut registers = lock(&self.inner.registers);
        if state.size() != registers.state.size() {
            return Err(UsageError::InvalidRegisterSize(state.size()).into());
        }
        registers.state = state;
        if commit {
            self.commit_locked(&mut registers, false)?;
        }
        Ok(())
    }

    /// Write pending changes to the bus. With `force` the register is
    /// written even when nothing changed.
    ///
    /// Returns whether a bus write happened.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the write fails; the pending state is kept.
    pub fn commit_changes(&self, force: bool) -> Result<bool, BusError> {
        let mut registers = lock(&self.inner.registers);
        self.commit_locked(&mut registers, force)
    }

    fn commit_locked(&self, registers: &mut Registers, force: bool) -> Result<bool, BusError> {
        if !force && registers.state == registers.committed {
            return Ok(false);
        }
        self.inner.driver.write(&registers.state)?;
        registers.committed = registers.state;
        tracing::trace!(device = %self.inner.id, state = %registers.state, "committed state");
        Ok(true)
    }

    /// Listen to pin changes detected by [`IoBoard::fetch_state`].
    pub fn on_pin_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PinChange) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// View of one pin as a binary input/output, at wire polarity.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::InvalidPin`] when `pin` is out of range.
    pub fn port(&self, pin: u8) -> Result<BoardPort, UsageError> {
        let width = self.width();
        if pin >= width {
            return Err(UsageError::InvalidPin { pin, width });
        }
        Ok(BoardPort::new(
            self.clone(),
            BinaryPort {
                device: self.inner.id.clone(),
                pin,
                inverted: false,
            },
        ))
    }
}

impl std::fmt::Debug for IoBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoBoard")
            .field("id", &self.inner.id)
            .field("address", &self.inner.driver.address())
            .finish_non_exhaustive()
    }
}
