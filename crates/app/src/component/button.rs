use std::sync::{Arc, Mutex, Weak};

use hausbus_domain::binary::BinaryState;
use hausbus_domain::command::Command;
use hausbus_domain::error::HausbusError;
use hausbus_domain::id::ComponentId;
use hausbus_domain::settings::ButtonSettings;
use hausbus_domain::state::{ButtonState, ComponentStatus, PressDuration};

use crate::binary_io::{BinaryInput, BinaryStateChange};
use crate::component::{
    Commandable, Component, StatusListener, Stateful, publish_status, unsupported,
};
use crate::scheduler::{DelayedAction, Scheduler};
use crate::settings::Settings;
use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;
use crate::trigger::Trigger;

struct Runtime {
    state: ButtonState,
    long_press: Option<DelayedAction>,
}

struct ButtonInner {
    id: ComponentId,
    scheduler: Scheduler,
    settings: Settings<ButtonSettings>,
    runtime: Mutex<Runtime>,
    pressed_shortly: Trigger,
    pressed_long: Trigger,
    listeners: Listeners<StatusListener>,
}

impl ButtonInner {
    fn status(state: ButtonState) -> ComponentStatus {
        ComponentStatus::new().with(state)
    }

    fn process(self: &Arc<Self>, state: ButtonState) {
        let settings = self.settings.get();
        if !settings.is_enabled {
            tracing::debug!(component = %self.id, "ignoring input of disabled button");
            return;
        }

        let (old, fire_short) = {
            let mut runtime = lock(&self.runtime);
            if runtime.state == state {
                return;
            }
            let old = runtime.state;
            runtime.state = state;

            let fire_short = match state {
                ButtonState::Pressed if self.pressed_long.is_any_attached() => {
                    let weak = Arc::downgrade(self);
                    runtime.long_press = Some(self.scheduler.run_in(
                        settings.pressed_long_duration,
                        move || {
                            fire_long(&weak);
                            Ok(())
                        },
                    ));
                    false
                }
                ButtonState::Pressed => true,
                ButtonState::Released => runtime
                    .long_press
                    .take()
                    .is_some_and(|pending| pending.cancel()),
            };
            (old, fire_short)
        };

        publish_status(&self.listeners, &Self::status(old), &Self::status(state));
        if fire_short {
            self.pressed_shortly.execute();
        }
    }
}

fn fire_long(inner: &Weak<ButtonInner>) {
    if let Some(inner) = inner.upgrade() {
        lock(&inner.runtime).long_press = None;
        inner.pressed_long.execute();
    }
}

/// Push button on a binary input; `High` means pressed.
///
/// With nothing attached to the long-press trigger every press fires the
/// short trigger immediately. Otherwise a release before
/// `pressed_long_duration` fires the short trigger and holding longer fires
/// the long one.
pub struct Button {
    inner: Arc<ButtonInner>,
    _input: Subscription,
}

impl Button {
    pub fn new(
        id: ComponentId,
        input: &dyn BinaryInput,
        scheduler: Scheduler,
        settings: Settings<ButtonSettings>,
    ) -> Self {
        let state = match input.read() {
            BinaryState::High => ButtonState::Pressed,
            BinaryState::Low => ButtonState::Released,
        };
        let inner = Arc::new(ButtonInner {
            pressed_shortly: Trigger::new(format!("{id}:pressed_shortly")),
            pressed_long: Trigger::new(format!("{id}:pressed_long")),
            id,
            scheduler,
            settings,
            runtime: Mutex::new(Runtime {
                state,
                long_press: None,
            }),
            listeners: Listeners::new(),
        });
        let weak = Arc::downgrade(&inner);
        let subscription = input.on_state_changed(Arc::new(move |change: BinaryStateChange| {
            if let Some(inner) = weak.upgrade() {
                let state = match change.new {
                    BinaryState::High => ButtonState::Pressed,
                    BinaryState::Low => ButtonState::Released,
                };
                inner.process(state);
            }
        }));
        Self {
            inner,
            _input: subscription,
        }
    }

    #[must_use]
    pub fn pressed_shortly_trigger(&self) -> &Trigger {
        &self.inner.pressed_shortly
    }

    #[must_use]
    pub fn pressed_long_trigger(&self) -> &Trigger {
        &self.inner.pressed_long
    }

    #[must_use]
    pub fn settings(&self) -> &Settings<ButtonSettings> {
        &self.inner.settings
    }

    #[must_use]
    pub fn state(&self) -> ButtonState {
        lock(&self.inner.runtime).state
    }

    /// Simulate a press without touching the input.
    pub fn press(&self, duration: PressDuration) {
        match duration {
            PressDuration::Short => self.inner.pressed_shortly.execute(),
            PressDuration::Long => self.inner.pressed_long.execute(),
        }
    }
}

impl Component for Button {
    fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    fn kind(&self) -> &'static str {
        "button"
    }
}

impl Stateful for Button {
    fn status(&self) -> ComponentStatus {
        ButtonInner::status(self.state())
    }

    fn on_status_changed(&self, listener: Arc<StatusListener>) -> Subscription {
        self.inner.listeners.add(listener)
    }
}

impl Commandable for Button {
    fn execute(&self, command: &Command) -> Result<(), HausbusError> {
        match command {
            Command::Press { duration } => self.press(*duration),
            Command::Reset => {}
            other => return Err(unsupported(&self.inner.id, other)),
        }
        Ok(())
    }
}
