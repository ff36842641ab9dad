//! Turn-on-and-off automation: motion or button in, flip/flop actions out.
//!
//! Two entry points drive the automation:
//!
//! - the **auto trigger** (motion detected) flips when the automation is
//!   enabled, its conditions hold and no pause window is active; the paired
//!   "detection completed" trigger starts the auto-off timeout;
//! - the **manual trigger** (a button) flips and starts the timeout when
//!   off, and when on either extends the timeout or flops immediately.
//!
//! Conditions are fulfilled when no disabling condition holds and either no
//! enabling condition is registered or the enabling conditions hold.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{NaiveTime, TimeDelta};
use hausbus_domain::command::Command;
use hausbus_domain::condition::{ConditionRelation, ConditionState};
use hausbus_domain::error::HausbusError;
use hausbus_domain::id::AutomationId;
use hausbus_domain::settings::AutomationSettings;
use hausbus_domain::state::PowerState;

use crate::automation::run_actions;
use crate::clock::{Clock, Stopwatch};
use crate::component::motion_detector::MotionDetector;
use crate::component::{Commandable, Stateful};
use crate::condition::{Condition, ConditionsValidator, ExpressionCondition, TimeRangeCondition};
use crate::ports::DaylightSource;
use crate::scheduler::{DelayedAction, Scheduler};
use crate::settings::Settings;
use crate::subscription::Subscription;
use crate::sync::lock;
use crate::trigger::{Action, Trigger};

struct AutomationState {
    enabling: ConditionsValidator,
    disabling: ConditionsValidator,
    flip: Vec<Arc<Action>>,
    flop: Vec<Arc<Action>>,
    is_on: bool,
    last_turned_on: Stopwatch,
    pause_after_turn_on: Option<Duration>,
    turn_off_if_pressed_while_on: bool,
    timeout: Option<DelayedAction>,
    /// Identifies the current timeout; a dispatched stale one compares unequal.
    timeout_generation: u64,
}

impl AutomationState {
    fn conditions_fulfilled(&self) -> bool {
        if !self.disabling.is_empty() && self.disabling.validate() == ConditionState::Fulfilled {
            return false;
        }
        self.enabling.is_empty() || self.enabling.validate() == ConditionState::Fulfilled
    }

    fn is_pausing(&self) -> bool {
        let Some(pause) = self.pause_after_turn_on else {
            return false;
        };
        self.last_turned_on
            .elapsed()
            .is_some_and(|elapsed| elapsed < pause)
    }

    fn cancel_timeout(&mut self) {
        if let Some(timeout) = self.timeout.take() {
            timeout.cancel();
        }
        self.timeout_generation += 1;
    }
}

struct AutomationInner {
    id: AutomationId,
    scheduler: Scheduler,
    settings: Settings<AutomationSettings>,
    state: Mutex<AutomationState>,
}

impl AutomationInner {
    fn execute_manual_trigger(self: &Arc<Self>) {
        let mut state = lock(&self.state);
        if state.is_on {
            if state.turn_off_if_pressed_while_on {
                self.turn_off(&mut state);
                return;
            }
            self.start_timeout(&mut state);
        } else {
            self.turn_on(&mut state);
            self.start_timeout(&mut state);
        }
    }

    fn execute_auto_trigger(&self) {
        if !self.settings.get().is_enabled {
            return;
        }
        let mut state = lock(&self.state);
        if !state.conditions_fulfilled() {
            tracing::debug!(automation = %self.id, "conditions not fulfilled, not turning on");
            return;
        }
        if state.is_pausing() {
            tracing::debug!(automation = %self.id, "pausing after last turn-on");
            return;
        }
        self.turn_on(&mut state);
    }

    fn start_timeout(self: &Arc<Self>, state: &mut AutomationState) {
        if !state.conditions_fulfilled() {
            return;
        }
        state.cancel_timeout();
        let generation = state.timeout_generation;
        let weak = Arc::downgrade(self);
        let duration = self.settings.get().duration;
        state.timeout = Some(self.scheduler.run_in(duration, move || {
            timeout_elapsed(&weak, generation);
            Ok(())
        }));
    }

    fn turn_on(&self, state: &mut AutomationState) {
        state.cancel_timeout();
        tracing::debug!(automation = %self.id, "turning on");
        run_actions(self.id.as_str(), &state.flip);
        state.is_on = true;
        state.last_turned_on.restart();
    }

    fn turn_off(&self, state: &mut AutomationState) {
        state.cancel_timeout();
        tracing::debug!(automation = %self.id, "turning off");
        run_actions(self.id.as_str(), &state.flop);
        state.is_on = false;
    }
}

fn timeout_elapsed(inner: &Weak<AutomationInner>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = lock(&inner.state);
    if state.timeout_generation != generation {
        return;
    }
    state.timeout = None;
    inner.turn_off(&mut state);
}

/// See the module documentation.
///
/// The `with_*` methods take `&self` and may be called at any time; the
/// automation keeps every subscription it creates for as long as it lives.
pub struct TurnOnAndOffAutomation {
    inner: Arc<AutomationInner>,
    clock: Clock,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl TurnOnAndOffAutomation {
    pub fn new(id: AutomationId, scheduler: Scheduler, settings: Settings<AutomationSettings>) -> Self {
        let clock = scheduler.clock().clone();
        Self {
            inner: Arc::new(AutomationInner {
                id,
                state: Mutex::new(AutomationState {
                    enabling: ConditionsValidator::new(ConditionState::NotFulfilled),
                    disabling: ConditionsValidator::new(ConditionState::NotFulfilled),
                    flip: Vec::new(),
                    flop: Vec::new(),
                    is_on: false,
                    last_turned_on: clock.stopwatch(),
                    pause_after_turn_on: None,
                    turn_off_if_pressed_while_on: false,
                    timeout: None,
                    timeout_generation: 0,
                }),
                scheduler,
                settings,
            }),
            clock,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &AutomationId {
        &self.inner.id
    }

    #[must_use]
    pub fn settings(&self) -> &Settings<AutomationSettings> {
        &self.inner.settings
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        lock(&self.inner.state).is_on
    }

    fn keep(&self, subscription: Subscription) {
        lock(&self.subscriptions).push(subscription);
    }

    /// Flip on motion, start the timeout when detection completes, and drop
    /// a pending timeout when the detector gets disabled.
    pub fn with_trigger(&self, detector: &MotionDetector) -> &Self {
        let inner = Arc::downgrade(&self.inner);
        self.keep(detector.motion_detected_trigger().attach(move || {
            if let Some(inner) = inner.upgrade() {
                inner.execute_auto_trigger();
            }
            Ok(())
        }));

        let inner = Arc::downgrade(&self.inner);
        self.keep(detector.detection_completed_trigger().attach(move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = lock(&inner.state);
                inner.start_timeout(&mut state);
            }
            Ok(())
        }));

        let inner = Arc::downgrade(&self.inner);
        self.keep(detector.settings().on_changed(move |old, new| {
            if old.is_enabled && !new.is_enabled
                && let Some(inner) = inner.upgrade()
            {
                tracing::debug!(automation = %inner.id, "motion detector disabled, cancelling timeout");
                lock(&inner.state).cancel_timeout();
            }
        }));
        self
    }

    /// Toggle on every fire of `trigger`, typically a button press.
    pub fn with_flip_trigger(&self, trigger: &Trigger) -> &Self {
        let inner = Arc::downgrade(&self.inner);
        self.keep(trigger.attach(move || {
            if let Some(inner) = inner.upgrade() {
                inner.execute_manual_trigger();
            }
            Ok(())
        }));
        self
    }

    pub fn with_flip_action<F>(&self, action: F) -> &Self
    where
        F: Fn() -> Result<(), HausbusError> + Send + Sync + 'static,
    {
        lock(&self.inner.state).flip.push(Arc::new(action));
        self
    }

    pub fn with_flop_action<F>(&self, action: F) -> &Self
    where
        F: Fn() -> Result<(), HausbusError> + Send + Sync + 'static,
    {
        lock(&self.inner.state).flop.push(Arc::new(action));
        self
    }

    /// Turn `target` on when flipping and off when flopping.
    pub fn with_target(&self, target: Arc<dyn Commandable>) -> &Self {
        let on = Arc::clone(&target);
        self.with_flip_action(move || on.execute(&Command::TurnOn));
        self.with_flop_action(move || target.execute(&Command::TurnOff))
    }

    pub fn with_enabling_condition(
        &self,
        relation: ConditionRelation,
        condition: impl Condition + 'static,
    ) -> &Self {
        lock(&self.inner.state).enabling.add(relation, Arc::new(condition));
        self
    }

    pub fn with_turn_on_within_time_range<S, E>(&self, start: S, end: E) -> &Self
    where
        S: Fn() -> NaiveTime + Send + Sync + 'static,
        E: Fn() -> NaiveTime + Send + Sync + 'static,
    {
        let range = TimeRangeCondition::new(self.clock.clone())
            .with_start(start)
            .with_end(end);
        self.with_enabling_condition(ConditionRelation::Or, range)
    }

    /// Enabled from one hour after sunrise until one hour before sunset.
    pub fn with_enabled_at_day(&self, daylight: Arc<dyn DaylightSource>) -> &Self {
        let range = TimeRangeCondition::day(self.clock.clone(), daylight)
            .with_start_adjustment(TimeDelta::hours(1))
            .with_end_adjustment(TimeDelta::hours(-1));
        self.with_enabling_condition(ConditionRelation::Or, range)
    }

    /// Enabled from one hour before sunset until one hour after sunrise.
    pub fn with_enabled_at_night(&self, daylight: Arc<dyn DaylightSource>) -> &Self {
        let range = TimeRangeCondition::night(self.clock.clone(), daylight)
            .with_start_adjustment(TimeDelta::hours(-1))
            .with_end_adjustment(TimeDelta::hours(1));
        self.with_enabling_condition(ConditionRelation::Or, range)
    }

    /// Do not flip while any of `peers` reports power on.
    pub fn with_skip_if_any_is_already_on(&self, peers: Vec<Arc<dyn Stateful>>) -> &Self {
        let condition = ExpressionCondition::from_bool(move || {
            peers.iter().any(|peer| peer.status().has(PowerState::On))
        });
        lock(&self.inner.state)
            .disabling
            .add(ConditionRelation::Or, Arc::new(condition));
        self
    }

    pub fn with_turn_off_if_button_pressed_while_already_on(&self) -> &Self {
        lock(&self.inner.state).turn_off_if_pressed_while_on = true;
        self
    }

    /// Ignore the auto trigger for `pause` after every turn-on.
    pub fn with_pause_after_every_turn_on(&self, pause: Duration) -> &Self {
        lock(&self.inner.state).pause_after_turn_on = Some(pause);
        self
    }
}

impl std::fmt::Debug for TurnOnAndOffAutomation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOnAndOffAutomation")
            .field("id", &self.inner.id)
            .field("is_on", &self.is_on())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hausbus_domain::binary::BinaryState;
    use hausbus_domain::id::ComponentId;
    use hausbus_domain::state::StateId;

    use super::*;
    use crate::component::StateMachine;
    use crate::ports::FixedDaylight;
    use crate::testing::{FakeInput, RecordingOutput, clock};

    struct Fixture {
        clock: Clock,
        scheduler: Scheduler,
        automation: TurnOnAndOffAutomation,
        lamp: Arc<StateMachine>,
    }

    fn lamp(name: &str) -> Arc<StateMachine> {
        let lamp = Arc::new(StateMachine::binary(
            ComponentId::new(name).unwrap(),
            Arc::new(RecordingOutput::default()),
        ));
        lamp.reset().unwrap();
        lamp
    }

    fn fixture() -> Fixture {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let automation = TurnOnAndOffAutomation::new(
            AutomationId::new("hallway").unwrap(),
            scheduler.clone(),
            Settings::default(),
        );
        let lamp = lamp("lamp");
        automation.with_target(lamp.clone());
        Fixture {
            clock,
            scheduler,
            automation,
            lamp,
        }
    }

    fn detector() -> (MotionDetector, Arc<FakeInput>) {
        let input = Arc::new(FakeInput::default());
        input.set(BinaryState::High);
        let detector = MotionDetector::new(
            ComponentId::new("motion").unwrap(),
            input.as_ref(),
            Settings::default(),
        );
        (detector, input)
    }

    fn at(clock: &Clock, hour: u32) {
        clock.set_time_of_day(NaiveTime::from_hms_opt(hour, 0, 0).unwrap());
    }

    // ── Auto trigger ──

    #[test]
    fn should_turn_on_when_motion_detected_and_off_after_duration() {
        let fixture = fixture();
        let (detector, input) = detector();
        fixture.automation.with_trigger(&detector);

        input.set(BinaryState::Low);
        assert!(fixture.lamp.status().has(PowerState::On));

        input.set(BinaryState::High);
        fixture.clock.tick(Duration::from_secs(30));
        assert!(fixture.lamp.status().has(PowerState::On));

        fixture.clock.tick(Duration::from_secs(30));
        assert!(fixture.lamp.status().has(PowerState::Off));
        assert!(!fixture.automation.is_on());
    }

    #[test]
    fn should_not_turn_on_outside_time_range() {
        let fixture = fixture();
        let (detector, input) = detector();
        at(&fixture.clock, 18);
        fixture.automation.with_turn_on_within_time_range(
            || NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            || NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        );
        fixture.automation.with_trigger(&detector);

        input.set(BinaryState::Low);

        assert!(fixture.lamp.status().has(PowerState::Off));
    }

    #[test]
    fn should_not_turn_on_when_disabled() {
        let fixture = fixture();
        let (detector, input) = detector();
        fixture.automation.with_trigger(&detector);
        fixture
            .automation
            .settings()
            .update(|settings| settings.is_enabled = false);

        input.set(BinaryState::Low);

        assert!(fixture.lamp.status().has(PowerState::Off));
    }

    #[test]
    fn should_skip_when_any_peer_is_already_on() {
        let fixture = fixture();
        let (detector, input) = detector();
        let idle = lamp("idle");
        let busy = lamp("busy");
        busy.turn_on().unwrap();
        fixture.automation.with_trigger(&detector);
        fixture
            .automation
            .with_skip_if_any_is_already_on(vec![idle as Arc<dyn Stateful>, busy]);

        input.set(BinaryState::Low);

        assert!(fixture.lamp.status().has(PowerState::Off));
    }

    #[test]
    fn should_turn_on_when_no_peer_is_on() {
        let fixture = fixture();
        let (detector, input) = detector();
        fixture.automation.with_trigger(&detector);
        fixture
            .automation
            .with_skip_if_any_is_already_on(vec![lamp("a") as Arc<dyn Stateful>, lamp("b")]);

        input.set(BinaryState::Low);

        assert!(fixture.lamp.status().has(PowerState::On));
    }

    #[test]
    fn should_pause_auto_trigger_after_turn_on() {
        let fixture = fixture();
        let (detector, input) = detector();
        let flips = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&flips);
        fixture.automation.with_trigger(&detector);
        fixture
            .automation
            .with_pause_after_every_turn_on(Duration::from_secs(600))
            .with_flip_action(move || {
                sink.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        input.set(BinaryState::Low);
        input.set(BinaryState::High);
        fixture.clock.tick(Duration::from_secs(120));
        input.set(BinaryState::Low);
        assert_eq!(flips.load(Ordering::SeqCst), 1);

        input.set(BinaryState::High);
        fixture.clock.tick(Duration::from_secs(600));
        input.set(BinaryState::Low);
        assert_eq!(flips.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn should_cancel_timeout_when_detector_disabled() {
        let fixture = fixture();
        let (detector, input) = detector();
        fixture.automation.with_trigger(&detector);
        input.set(BinaryState::Low);
        input.set(BinaryState::High);

        detector
            .settings()
            .update(|settings| settings.is_enabled = false);
        fixture.clock.tick(Duration::from_secs(120));

        assert!(fixture.lamp.status().has(PowerState::On));
        assert!(fixture.scheduler.schedules().is_empty());
    }

    #[test]
    fn should_honour_day_window_from_daylight() {
        let fixture = fixture();
        let (detector, input) = detector();
        let daylight = Arc::new(FixedDaylight::new(
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        ));
        fixture.automation.with_enabled_at_night(daylight);
        fixture.automation.with_trigger(&detector);

        at(&fixture.clock, 12);
        input.set(BinaryState::Low);
        assert!(fixture.lamp.status().has(PowerState::Off));

        input.set(BinaryState::High);
        at(&fixture.clock, 19);
        input.set(BinaryState::Low);
        assert!(fixture.lamp.status().has(PowerState::On));
    }

    // ── Manual trigger ──

    #[test]
    fn should_stay_on_when_pressed_repeatedly() {
        let fixture = fixture();
        let button = Trigger::new("button");
        fixture.automation.with_flip_trigger(&button);
        assert_eq!(fixture.lamp.current_state(), Some(StateId::off()));

        button.execute();
        assert!(fixture.lamp.is_on());
        button.execute();
        assert!(fixture.lamp.is_on());
        button.execute();
        assert!(fixture.lamp.is_on());
    }

    #[test]
    fn should_turn_off_when_pressed_while_already_on() {
        let fixture = fixture();
        let button = Trigger::new("button");
        fixture.automation.with_flip_trigger(&button);

        button.execute();
        button.execute();
        assert!(fixture.lamp.is_on());

        fixture
            .automation
            .with_turn_off_if_button_pressed_while_already_on();
        button.execute();

        assert!(!fixture.lamp.is_on());
    }

    #[test]
    fn should_turn_on_by_button_even_outside_time_range() {
        let fixture = fixture();
        let button = Trigger::new("button");
        at(&fixture.clock, 18);
        fixture.automation.with_turn_on_within_time_range(
            || NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            || NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        );
        fixture.automation.with_flip_trigger(&button);

        button.execute();

        assert!(fixture.lamp.is_on());
    }

    #[test]
    fn should_extend_timeout_on_repeated_press() {
        let fixture = fixture();
        let button = Trigger::new("button");
        fixture.automation.with_flip_trigger(&button);

        button.execute();
        fixture.clock.tick(Duration::from_secs(40));
        button.execute();
        fixture.clock.tick(Duration::from_secs(40));
        assert!(fixture.lamp.is_on());

        fixture.clock.tick(Duration::from_secs(20));
        assert!(!fixture.lamp.is_on());
    }
}
