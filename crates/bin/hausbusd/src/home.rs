//! Hallway installation wired onto the configured boards.
//!
//! | Component | Board | Pin |
//! |-----------|-------|-----|
//! | `hallway.button` | `hallway.inputs` | 0 |
//! | `hallway.motion` | `hallway.inputs` | 1 (active-low, wire polarity) |
//! | `hallway.lamp` | `hallway.relays` | relay 0 |
//! | `hallway.fan` | `hallway.relays` | relays 1 and 2 |
//! | `hallway.shutter` | `hallway.relays` | relay 3 (power), relay 4 (direction) |
//! | `hallway.night_light` | `hallway.relays` | 5 |
//!
//! Motion or a short press turns the lamp on for the configured duration; a
//! long press steps the fan through its levels; the night light is on from
//! sunset to sunrise except between 23:00 and 05:00.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveTime;

use hausbus_adapter_i2c_virtual::VirtualI2cBus;
use hausbus_app::automation::{ConditionalOnAutomation, TurnOnAndOffAutomation};
use hausbus_app::component::{
    Button, MotionDetector, PortBasedRollerShutterAdapter, RollerShutter, StateMachine, StateMachineState,
};
use hausbus_app::hardware::{BoardOptions, CcToolsBoard};
use hausbus_app::ports::{DaylightSource, FixedDaylight};
use hausbus_app::registry::ComponentRegistry;
use hausbus_app::scheduler::Scheduler;
use hausbus_app::settings::Settings;
use hausbus_app::subscription::Subscription;
use hausbus_domain::area::Area;
use hausbus_domain::error::NotFoundError;
use hausbus_domain::id::{AreaId, AutomationId, ComponentId};
use hausbus_domain::settings::AutomationSettings;

use crate::config::Config;

pub const INPUTS: &str = "hallway.inputs";
pub const RELAYS: &str = "hallway.relays";

pub const BUTTON: &str = "hallway.button";
pub const MOTION: &str = "hallway.motion";
pub const LAMP: &str = "hallway.lamp";
pub const FAN: &str = "hallway.fan";
pub const SHUTTER: &str = "hallway.shutter";
pub const NIGHT_LIGHT: &str = "hallway.night_light";

/// The wired installation. Dropping it detaches the automations.
pub struct Home {
    boards: HashMap<String, CcToolsBoard>,
    lamp_automation: TurnOnAndOffAutomation,
    night_light_automation: ConditionalOnAutomation,
    _fan_speed: Subscription,
}

impl Home {
    /// Attach the configured boards to `bus`, wire the hallway and register
    /// everything in `registry`.
    ///
    /// # Errors
    ///
    /// Fails when a board the hallway needs is not configured, or when
    /// wiring is rejected by the engine.
    pub fn install(
        config: &Config,
        scheduler: &Scheduler,
        registry: &ComponentRegistry,
        bus: &Arc<VirtualI2cBus>,
    ) -> anyhow::Result<Self> {
        let options = BoardOptions {
            slow_fetch_threshold: Duration::from_millis(config.hardware.poll_duration_warning_ms),
        };
        let mut boards = HashMap::new();
        for board in &config.hardware.boards {
            // Idle inputs are pulled up.
            bus.attach(board.address, vec![0xFF; board.kind.register_size()]);
            let installed = CcToolsBoard::new(board.kind, board.id.clone(), board.address, bus.clone(), options)
                .with_context(|| format!("initializing board '{}'", board.id))?;
            registry.add_board(installed.board());
            if board.kind.has_inputs() {
                installed
                    .board()
                    .register_polling(scheduler, config.poll_interval())
                    .with_context(|| format!("polling board '{}'", board.id))?;
            }
            boards.insert(board.id.to_string(), installed);
        }
        let inputs = board(&boards, INPUTS)?;
        let relays = board(&boards, RELAYS)?;

        let daylight: Arc<dyn DaylightSource> =
            Arc::new(FixedDaylight::new(config.daylight.sunrise, config.daylight.sunset));

        let button = Arc::new(Button::new(
            ComponentId::new(BUTTON)?,
            &inputs.input(0)?,
            scheduler.clone(),
            Settings::default(),
        ));
        let motion = Arc::new(MotionDetector::new(
            ComponentId::new(MOTION)?,
            &inputs.board().port(1)?,
            Settings::default(),
        ));

        let lamp = Arc::new(StateMachine::binary(
            ComponentId::new(LAMP)?,
            Arc::new(relays.output(0)?),
        ));

        let fan = Arc::new(StateMachine::new(ComponentId::new(FAN)?));
        let (speed1, speed2) = (Arc::new(relays.output(1)?), Arc::new(relays.output(2)?));
        fan.add_state(
            StateMachineState::new("Off")
                .with_low_output(speed1.clone())
                .with_low_output(speed2.clone()),
        )?;
        fan.add_state(
            StateMachineState::new("Level1")
                .with_high_output(speed1.clone())
                .with_low_output(speed2.clone()),
        )?;
        fan.add_state(
            StateMachineState::new("Level2")
                .with_high_output(speed1)
                .with_high_output(speed2),
        )?;

        let shutter = Arc::new(RollerShutter::new(
            ComponentId::new(SHUTTER)?,
            Arc::new(PortBasedRollerShutterAdapter::new(
                Arc::new(relays.output(3)?),
                Arc::new(relays.output(4)?),
            )),
            scheduler.clone(),
            Settings::default(),
        ));

        let night_light = Arc::new(StateMachine::binary(
            ComponentId::new(NIGHT_LIGHT)?,
            Arc::new(relays.output(5)?),
        ));

        registry.add(button.clone())?;
        registry.add(motion.clone())?;
        registry.add(lamp.clone())?;
        registry.add(fan.clone())?;
        registry.add(shutter.clone())?;
        registry.add(night_light.clone())?;

        lamp.reset()?;
        fan.reset()?;
        night_light.reset()?;
        shutter.try_reset();

        let fan_speed = {
            let fan = Arc::clone(&fan);
            button
                .pressed_long_trigger()
                .attach(move || fan.set_next_state().map_err(Into::into))
        };

        let lamp_automation = TurnOnAndOffAutomation::new(
            AutomationId::new("hallway.lamp_automation")?,
            scheduler.clone(),
            Settings::new(AutomationSettings {
                duration: Duration::from_secs(config.automation.turn_off_after_secs),
                ..AutomationSettings::default()
            }),
        );
        lamp_automation
            .with_trigger(&motion)
            .with_flip_trigger(button.pressed_shortly_trigger())
            .with_target(lamp)
            .with_turn_off_if_button_pressed_while_already_on();

        let night_light_automation = ConditionalOnAutomation::new(
            AutomationId::new("hallway.night_light_automation")?,
            scheduler,
            daylight,
        )?;
        night_light_automation
            .with_on_at_night_range()
            .with_off_between_range(hour(23)?, hour(5)?)
            .with_actuator(night_light);

        let area = Area::builder()
            .id(AreaId::new("hallway")?)
            .name("Hallway")
            .component(ComponentId::new(BUTTON)?)
            .component(ComponentId::new(MOTION)?)
            .component(ComponentId::new(LAMP)?)
            .component(ComponentId::new(FAN)?)
            .component(ComponentId::new(SHUTTER)?)
            .component(ComponentId::new(NIGHT_LIGHT)?)
            .automation(lamp_automation.id().clone())
            .automation(night_light_automation.id().clone())
            .build()?;
        registry.add_area(area)?;

        tracing::info!(boards = boards.len(), "hallway installed");
        Ok(Self {
            boards,
            lamp_automation,
            night_light_automation,
            _fan_speed: fan_speed,
        })
    }

    #[must_use]
    pub fn board(&self, id: &str) -> Option<&CcToolsBoard> {
        self.boards.get(id)
    }

    #[must_use]
    pub fn lamp_automation(&self) -> &TurnOnAndOffAutomation {
        &self.lamp_automation
    }

    #[must_use]
    pub fn night_light_automation(&self) -> &ConditionalOnAutomation {
        &self.night_light_automation
    }
}

fn board<'a>(boards: &'a HashMap<String, CcToolsBoard>, id: &str) -> Result<&'a CcToolsBoard, NotFoundError> {
    boards.get(id).ok_or_else(|| NotFoundError {
        kind: "board",
        id: id.to_string(),
    })
}

fn hour(hour: u32) -> anyhow::Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, 0, 0).with_context(|| format!("invalid hour {hour}"))
}
