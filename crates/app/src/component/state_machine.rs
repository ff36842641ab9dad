//! Named states, each driving a set of binary outputs.
//!
//! Lamps and sockets are state machines with the two states `Off` and `On`;
//! a multi-speed fan is `Off` plus one state per level.

use std::sync::{Arc, Mutex};

use hausbus_domain::binary::{BinaryState, WriteMode};
use hausbus_domain::command::Command;
use hausbus_domain::error::{HausbusError, UsageError};
use hausbus_domain::id::ComponentId;
use hausbus_domain::state::{ComponentStatus, PowerState, StateId};

use crate::binary_io::BinaryOutput;
use crate::component::{
    Commandable, Component, StatusListener, Stateful, publish_status, unsupported,
};
use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;

/// One state and the output levels it applies, in order.
#[derive(Clone)]
pub struct StateMachineState {
    id: StateId,
    outputs: Vec<(Arc<dyn BinaryOutput>, BinaryState)>,
}

impl StateMachineState {
    pub fn new(id: impl Into<StateId>) -> Self {
        Self {
            id: id.into(),
            outputs: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &StateId {
        &self.id
    }

    #[must_use]
    pub fn with_output(mut self, output: Arc<dyn BinaryOutput>, state: BinaryState) -> Self {
        self.outputs.push((output, state));
        self
    }

    #[must_use]
    pub fn with_high_output(self, output: Arc<dyn BinaryOutput>) -> Self {
        self.with_output(output, BinaryState::High)
    }

    #[must_use]
    pub fn with_low_output(self, output: Arc<dyn BinaryOutput>) -> Self {
        self.with_output(output, BinaryState::Low)
    }

    /// Stage every level first, then commit, so outputs sharing a board
    /// reach the hardware in one write.
    fn apply(&self) {
        for (output, state) in &self.outputs {
            output.write(*state, WriteMode::Stage);
        }
        for (output, _) in &self.outputs {
            output.commit();
        }
    }
}

impl std::fmt::Debug for StateMachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineState")
            .field("id", &self.id)
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[derive(Default)]
struct Machine {
    states: Vec<StateMachineState>,
    current: Option<StateId>,
}

impl Machine {
    fn find(&self, id: &StateId) -> Option<&StateMachineState> {
        self.states.iter().find(|state| &state.id == id)
    }

    fn status(&self) -> ComponentStatus {
        match &self.current {
            None => ComponentStatus::new(),
            Some(id) => {
                let power = if id.is_off() {
                    PowerState::Off
                } else {
                    PowerState::On
                };
                ComponentStatus::new().with(id.clone()).with(power)
            }
        }
    }
}

/// Receives the `(old, new)` state ids of every transition.
pub type StateChangedListener = dyn Fn(&StateId, &StateId) + Send + Sync;

/// Named states over binary outputs.
///
/// The first registered state is current until the first transition; it is
/// not applied to the hardware until [`StateMachine::reset`] or a change.
pub struct StateMachine {
    id: ComponentId,
    machine: Mutex<Machine>,
    listeners: Listeners<StatusListener>,
    state_listeners: Listeners<StateChangedListener>,
}

impl StateMachine {
    #[must_use]
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            machine: Mutex::new(Machine::default()),
            listeners: Listeners::new(),
            state_listeners: Listeners::new(),
        }
    }

    /// A two-state machine driving `output` low in `Off` and high in `On`.
    #[must_use]
    pub fn binary(id: ComponentId, output: Arc<dyn BinaryOutput>) -> Self {
        let machine = Self::new(id);
        {
            let mut inner = lock(&machine.machine);
            inner
                .states
                .push(StateMachineState::new(StateId::off()).with_low_output(output.clone()));
            inner
                .states
                .push(StateMachineState::new(StateId::on()).with_high_output(output));
            inner.current = Some(StateId::off());
        }
        machine
    }

    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateState`] when a state with the same id
    /// exists.
    pub fn add_state(&self, state: StateMachineState) -> Result<(), UsageError> {
        let mut machine = lock(&self.machine);
        if machine.find(&state.id).is_some() {
            return Err(UsageError::DuplicateState(state.id.to_string()));
        }
        if machine.current.is_none() {
            machine.current = Some(state.id.clone());
        }
        machine.states.push(state);
        Ok(())
    }

    /// The current state; `None` only while no state is registered.
    #[must_use]
    pub fn current_state(&self) -> Option<StateId> {
        lock(&self.machine).current.clone()
    }

    #[must_use]
    pub fn state_ids(&self) -> Vec<StateId> {
        lock(&self.machine)
            .states
            .iter()
            .map(|state| state.id.clone())
            .collect()
    }

    #[must_use]
    pub fn supports_state(&self, id: &StateId) -> bool {
        lock(&self.machine).find(id).is_some()
    }

    /// Apply the outputs of `id`, make it current, then raise the
    /// state-changed event with the previous and the new id.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::UnknownState`] and leaves everything unchanged
    /// when `id` is not defined.
    pub fn change_state(&self, id: &StateId) -> Result<(), UsageError> {
        let (previous, old, new) = {
            let mut machine = lock(&self.machine);
            let target = machine
                .find(id)
                .ok_or_else(|| UsageError::UnknownState(id.to_string()))?;
            target.apply();
            let old = machine.status();
            let previous = machine.current.replace(id.clone());
            (previous, old, machine.status())
        };
        tracing::debug!(component = %self.id, state = %id, "state changed");
        if let Some(previous) = &previous {
            for listener in self.state_listeners.snapshot() {
                listener(previous, id);
            }
        }
        publish_status(&self.listeners, &old, &new);
        Ok(())
    }

    /// State following `current` in registration order, wrapping around.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::UnknownState`] when `current` is not defined.
    pub fn next_state(&self, current: &StateId) -> Result<StateId, UsageError> {
        let machine = lock(&self.machine);
        let index = machine
            .states
            .iter()
            .position(|state| &state.id == current)
            .ok_or_else(|| UsageError::UnknownState(current.to_string()))?;
        let next = (index + 1) % machine.states.len();
        Ok(machine.states[next].id.clone())
    }

    /// Advance to the next state, or to the first one when none is active.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoStates`] when no state is defined.
    pub fn set_next_state(&self) -> Result<(), UsageError> {
        let target = match self.current_state() {
            Some(current) => self.next_state(&current)?,
            None => self.first_state()?,
        };
        self.change_state(&target)
    }

    /// Switch to `On`, or to the first non-`Off` state of a level machine.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::UnknownState`] when the machine has no state
    /// besides `Off`.
    pub fn turn_on(&self) -> Result<(), UsageError> {
        let on = StateId::on();
        if self.supports_state(&on) {
            return self.change_state(&on);
        }
        let first_level = lock(&self.machine)
            .states
            .iter()
            .find(|state| !state.id.is_off())
            .map(|state| state.id.clone())
            .ok_or(UsageError::UnknownState(on.to_string()))?;
        self.change_state(&first_level)
    }

    /// # Errors
    ///
    /// Returns [`UsageError::UnknownState`] when the machine has no `Off`
    /// state.
    pub fn turn_off(&self) -> Result<(), UsageError> {
        self.change_state(&StateId::off())
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.current_state().is_some_and(|state| !state.is_off())
    }

    /// Reapply `Off` (or the first state) so the hardware matches the model.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoStates`] when no state is defined.
    pub fn reset(&self) -> Result<(), UsageError> {
        let off = StateId::off();
        if self.supports_state(&off) {
            return self.change_state(&off);
        }
        let first = self.first_state()?;
        self.change_state(&first)
    }

    /// Listen to transitions as `(old, new)` state ids.
    pub fn on_state_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateId, &StateId) + Send + Sync + 'static,
    {
        self.state_listeners.add(Arc::new(listener))
    }

    fn first_state(&self) -> Result<StateId, UsageError> {
        lock(&self.machine)
            .states
            .first()
            .map(|state| state.id.clone())
            .ok_or(UsageError::NoStates)
    }
}

impl Component for StateMachine {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "state_machine"
    }
}

impl Stateful for StateMachine {
    fn status(&self) -> ComponentStatus {
        lock(&self.machine).status()
    }

    fn on_status_changed(&self, listener: Arc<StatusListener>) -> Subscription {
        self.listeners.add(listener)
    }
}

impl Commandable for StateMachine {
    fn execute(&self, command: &Command) -> Result<(), HausbusError> {
        match command {
            Command::TurnOn => self.turn_on()?,
            Command::TurnOff => self.turn_off()?,
            Command::Toggle if self.is_on() => self.turn_off()?,
            Command::Toggle => self.turn_on()?,
            Command::SetState { state } => self.change_state(state)?,
            Command::NextState => self.set_next_state()?,
            Command::Reset => self.reset()?,
            other => return Err(unsupported(&self.id, other)),
        }
        Ok(())
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("current", &self.current_state())
            .finish_non_exhaustive()
    }
}
