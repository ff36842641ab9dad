use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveTime;
use hausbus_domain::command::Command;
use hausbus_domain::condition::{ConditionRelation, ConditionState};
use hausbus_domain::error::HausbusError;
use hausbus_domain::id::AutomationId;

use crate::automation::run_actions;
use crate::clock::Clock;
use crate::component::Commandable;
use crate::condition::{Condition, ConditionsValidator, TimeRangeCondition};
use crate::ports::DaylightSource;
use crate::scheduler::Scheduler;
use crate::subscription::Subscription;
use crate::sync::lock;
use crate::trigger::{Action, Trigger};

const EVALUATION_INTERVAL: Duration = Duration::from_secs(60);

struct Rules {
    conditions: ConditionsValidator,
    on_actions: Vec<Arc<Action>>,
    off_actions: Vec<Arc<Action>>,
}

struct ConditionalInner {
    id: AutomationId,
    rules: Mutex<Rules>,
}

impl ConditionalInner {
    fn evaluate(&self) {
        let rules = lock(&self.rules);
        let state = rules.conditions.validate();
        tracing::trace!(automation = %self.id, ?state, "evaluated conditions");
        match state {
            ConditionState::Fulfilled => run_actions(self.id.as_str(), &rules.on_actions),
            ConditionState::NotFulfilled => run_actions(self.id.as_str(), &rules.off_actions),
        }
    }
}

/// Keeps actuators on while its conditions hold and off otherwise.
///
/// Conditions are re-evaluated every minute and on every fire of an extra
/// trigger. Without conditions the automation always turns on.
pub struct ConditionalOnAutomation {
    inner: Arc<ConditionalInner>,
    clock: Clock,
    daylight: Arc<dyn DaylightSource>,
    interval: Trigger,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ConditionalOnAutomation {
    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateSchedule`](hausbus_domain::error::UsageError)
    /// when an automation with the same id was already created on `scheduler`.
    pub fn new(
        id: AutomationId,
        scheduler: &Scheduler,
        daylight: Arc<dyn DaylightSource>,
    ) -> Result<Self, HausbusError> {
        let interval = Trigger::every(scheduler, format!("automation:{id}"), EVALUATION_INTERVAL)?;
        let automation = Self {
            inner: Arc::new(ConditionalInner {
                id,
                rules: Mutex::new(Rules {
                    conditions: ConditionsValidator::new(ConditionState::Fulfilled),
                    on_actions: Vec::new(),
                    off_actions: Vec::new(),
                }),
            }),
            clock: scheduler.clock().clone(),
            daylight,
            interval: interval.clone(),
            subscriptions: Mutex::new(Vec::new()),
        };
        automation.with_trigger(&interval);
        Ok(automation)
    }

    #[must_use]
    pub fn id(&self) -> &AutomationId {
        &self.inner.id
    }

    /// The trigger firing the periodic re-evaluation.
    #[must_use]
    pub fn interval_trigger(&self) -> &Trigger {
        &self.interval
    }

    /// Re-evaluate the conditions and run the matching actions now.
    pub fn evaluate(&self) {
        self.inner.evaluate();
    }

    pub fn with_trigger(&self, trigger: &Trigger) -> &Self {
        let inner = Arc::downgrade(&self.inner);
        let subscription = trigger.attach(move || {
            if let Some(inner) = inner.upgrade() {
                inner.evaluate();
            }
            Ok(())
        });
        lock(&self.subscriptions).push(subscription);
        self
    }

    pub fn with_condition(&self, relation: ConditionRelation, condition: impl Condition + 'static) -> &Self {
        lock(&self.inner.rules)
            .conditions
            .add(relation, Arc::new(condition));
        self
    }

    /// On between sunset and sunrise.
    pub fn with_on_at_night_range(&self) -> &Self {
        let night = TimeRangeCondition::night(self.clock.clone(), Arc::clone(&self.daylight));
        self.with_condition(ConditionRelation::And, night)
    }

    /// Off between `from` and `until`, e.g. while everybody sleeps.
    pub fn with_off_between_range(&self, from: NaiveTime, until: NaiveTime) -> &Self {
        let range = TimeRangeCondition::between(self.clock.clone(), from, until).with_inversion();
        self.with_condition(ConditionRelation::And, range)
    }

    pub fn with_action_if_fulfilled<F>(&self, action: F) -> &Self
    where
        F: Fn() -> Result<(), HausbusError> + Send + Sync + 'static,
    {
        lock(&self.inner.rules).on_actions.push(Arc::new(action));
        self
    }

    pub fn with_action_if_not_fulfilled<F>(&self, action: F) -> &Self
    where
        F: Fn() -> Result<(), HausbusError> + Send + Sync + 'static,
    {
        lock(&self.inner.rules).off_actions.push(Arc::new(action));
        self
    }

    pub fn with_actuator(&self, actuator: Arc<dyn Commandable>) -> &Self {
        let on = Arc::clone(&actuator);
        self.with_action_if_fulfilled(move || on.execute(&Command::TurnOn));
        self.with_action_if_not_fulfilled(move || actuator.execute(&Command::TurnOff))
    }
}

impl std::fmt::Debug for ConditionalOnAutomation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalOnAutomation")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}
