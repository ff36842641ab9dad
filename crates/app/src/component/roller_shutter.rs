//! Roller shutter driven through a motor adapter, with auto-off and a
//! position estimate integrated from clock ticks.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use hausbus_domain::binary::{BinaryState, WriteMode};
use hausbus_domain::command::Command;
use hausbus_domain::error::HausbusError;
use hausbus_domain::id::ComponentId;
use hausbus_domain::settings::RollerShutterSettings;
use hausbus_domain::state::{ComponentStatus, FeatureState, PowerState, VerticalMovingState};

use crate::binary_io::BinaryOutput;
use crate::component::{
    Commandable, Component, StatusListener, Stateful, publish_status, unsupported,
};
use crate::scheduler::{DelayedAction, Scheduler};
use crate::settings::Settings;
use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;

/// Motor control of one roller shutter.
pub trait RollerShutterAdapter: Send + Sync {
    fn start_move_up(&self);
    fn start_move_down(&self);
    fn stop(&self);
}

/// Motor wired to a power relay and a direction relay.
///
/// The direction relay is only switched while power is off.
pub struct PortBasedRollerShutterAdapter {
    power: Arc<dyn BinaryOutput>,
    direction: Arc<dyn BinaryOutput>,
}

impl PortBasedRollerShutterAdapter {
    pub fn new(power: Arc<dyn BinaryOutput>, direction: Arc<dyn BinaryOutput>) -> Self {
        Self { power, direction }
    }

    fn start(&self, direction: BinaryState) {
        self.power.write(BinaryState::Low, WriteMode::Commit);
        self.direction.write(direction, WriteMode::Commit);
        self.power.write(BinaryState::High, WriteMode::Commit);
    }
}

impl RollerShutterAdapter for PortBasedRollerShutterAdapter {
    fn start_move_up(&self) {
        self.start(BinaryState::Low);
    }

    fn start_move_down(&self) {
        self.start(BinaryState::High);
    }

    fn stop(&self) {
        self.power.write(BinaryState::Low, WriteMode::Commit);
        self.direction.write(BinaryState::Low, WriteMode::Commit);
    }
}

struct Runtime {
    moving: VerticalMovingState,
    /// Milliseconds of travel from the fully open position.
    position: u32,
    auto_off: Option<DelayedAction>,
    /// Bumped on every movement so a stale auto-off does nothing.
    movement: u64,
}

impl Runtime {
    fn status(&self) -> ComponentStatus {
        let power = if self.moving == VerticalMovingState::Stopped {
            PowerState::Off
        } else {
            PowerState::On
        };
        ComponentStatus::new()
            .with(power)
            .with(self.moving)
            .with(FeatureState::Position(self.position))
    }
}

struct ShutterInner {
    id: ComponentId,
    adapter: Arc<dyn RollerShutterAdapter>,
    scheduler: Scheduler,
    settings: Settings<RollerShutterSettings>,
    runtime: Mutex<Runtime>,
    listeners: Listeners<StatusListener>,
}

impl ShutterInner {
    fn change(self: &Arc<Self>, target: VerticalMovingState) {
        let (old, new) = {
            let mut runtime = lock(&self.runtime);
            self.change_locked(&mut runtime, target)
        };
        publish_status(&self.listeners, &old, &new);
    }

    /// Apply `target` while the caller holds the runtime lock; returns the
    /// `(old, new)` status to publish once the lock is released.
    fn change_locked(
        self: &Arc<Self>,
        runtime: &mut Runtime,
        target: VerticalMovingState,
    ) -> (ComponentStatus, ComponentStatus) {
        let old = runtime.status();
        if let Some(pending) = runtime.auto_off.take() {
            pending.cancel();
        }
        runtime.movement += 1;
        match target {
            VerticalMovingState::Stopped => self.adapter.stop(),
            VerticalMovingState::MovingUp => self.adapter.start_move_up(),
            VerticalMovingState::MovingDown => self.adapter.start_move_down(),
        }
        if target != VerticalMovingState::Stopped {
            let weak = Arc::downgrade(self);
            let movement = runtime.movement;
            let timeout = self.settings.get().auto_off_timeout;
            runtime.auto_off = Some(self.scheduler.run_in(timeout, move || {
                auto_off(&weak, movement);
                Ok(())
            }));
        }
        runtime.moving = target;
        tracing::debug!(component = %self.id, state = ?target, "roller shutter changed");
        (old, runtime.status())
    }

    fn track(&self, elapsed: Duration) {
        let travelled = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
        let max_position = self.settings.get().max_position;
        let mut runtime = lock(&self.runtime);
        let position = match runtime.moving {
            VerticalMovingState::Stopped => return,
            VerticalMovingState::MovingUp => runtime.position.saturating_sub(travelled),
            VerticalMovingState::MovingDown => runtime
                .position
                .saturating_add(travelled)
                .min(max_position),
        };
        runtime.position = position;
    }
}

fn auto_off(inner: &Weak<ShutterInner>, movement: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    // Checked and stopped under one lock so a movement started meanwhile
    // cannot be cancelled by this timer.
    let (old, new) = {
        let mut runtime = lock(&inner.runtime);
        if runtime.movement != movement {
            return;
        }
        tracing::info!(component = %inner.id, "stopping roller shutter after auto-off timeout");
        inner.change_locked(&mut runtime, VerticalMovingState::Stopped)
    };
    publish_status(&inner.listeners, &old, &new);
}

pub struct RollerShutter {
    inner: Arc<ShutterInner>,
    _tick: Subscription,
}

impl RollerShutter {
    pub fn new(
        id: ComponentId,
        adapter: Arc<dyn RollerShutterAdapter>,
        scheduler: Scheduler,
        settings: Settings<RollerShutterSettings>,
    ) -> Self {
        let inner = Arc::new(ShutterInner {
            id,
            adapter,
            scheduler,
            settings,
            runtime: Mutex::new(Runtime {
                moving: VerticalMovingState::Stopped,
                position: 0,
                auto_off: None,
                movement: 0,
            }),
            listeners: Listeners::new(),
        });
        let weak = Arc::downgrade(&inner);
        let tick = inner.scheduler.clock().on_tick(move |elapsed| {
            if let Some(inner) = weak.upgrade() {
                inner.track(elapsed);
            }
        });
        Self { inner, _tick: tick }
    }

    pub fn move_up(&self) {
        self.inner.change(VerticalMovingState::MovingUp);
    }

    pub fn move_down(&self) {
        self.inner.change(VerticalMovingState::MovingDown);
    }

    pub fn stop(&self) {
        self.inner.change(VerticalMovingState::Stopped);
    }

    /// Drive fully up so the position estimate starts from a known end stop.
    pub fn try_reset(&self) {
        self.move_up();
    }

    #[must_use]
    pub fn moving_state(&self) -> VerticalMovingState {
        lock(&self.inner.runtime).moving
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        lock(&self.inner.runtime).position
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.position() >= self.inner.settings.get().max_position
    }

    #[must_use]
    pub fn settings(&self) -> &Settings<RollerShutterSettings> {
        &self.inner.settings
    }
}

impl Component for RollerShutter {
    fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    fn kind(&self) -> &'static str {
        "roller_shutter"
    }
}

impl Stateful for RollerShutter {
    fn status(&self) -> ComponentStatus {
        lock(&self.inner.runtime).status()
    }

    fn on_status_changed(&self, listener: Arc<StatusListener>) -> Subscription {
        self.inner.listeners.add(listener)
    }
}

impl Commandable for RollerShutter {
    fn execute(&self, command: &Command) -> Result<(), HausbusError> {
        match command {
            Command::MoveUp => self.move_up(),
            Command::MoveDown => self.move_down(),
            Command::Stop | Command::TurnOff => self.stop(),
            Command::Reset => self.try_reset(),
            other => return Err(unsupported(&self.inner.id, other)),
        }
        Ok(())
    }
}
