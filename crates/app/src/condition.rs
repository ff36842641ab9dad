//! Conditions and their combination.
//!
//! A [`Condition`] is a pure, re-evaluable predicate. A
//! [`ConditionsValidator`] folds an ordered list of `(relation, condition)`
//! pairs left to right: the first condition seeds the result and every
//! following one is joined with its relation. An empty validator yields its
//! default state.

use std::sync::Arc;

use chrono::{NaiveTime, TimeDelta};
use hausbus_domain::condition::{ConditionRelation, ConditionState};

use crate::clock::Clock;
use crate::guard::catch;
use crate::ports::DaylightSource;

pub trait Condition: Send + Sync {
    fn validate(&self) -> ConditionState;
}

/// Condition backed by a closure.
pub struct ExpressionCondition {
    expression: Box<dyn Fn() -> ConditionState + Send + Sync>,
}

impl ExpressionCondition {
    pub fn new<F>(expression: F) -> Self
    where
        F: Fn() -> ConditionState + Send + Sync + 'static,
    {
        Self {
            expression: Box::new(expression),
        }
    }

    /// Convenience for boolean expressions.
    pub fn from_bool<F>(expression: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::new(move || ConditionState::from(expression()))
    }
}

impl Condition for ExpressionCondition {
    fn validate(&self) -> ConditionState {
        (self.expression)()
    }
}

type TimeSource = Arc<dyn Fn() -> NaiveTime + Send + Sync>;

/// Fulfilled while the local time of day lies in `[start, end)`.
///
/// Both bounds are functions evaluated on every validation, so ranges
/// following sunrise or sunset move with the seasons. A range whose start is
/// after its end crosses midnight.
pub struct TimeRangeCondition {
    clock: Clock,
    start: TimeSource,
    end: TimeSource,
    start_adjustment: TimeDelta,
    end_adjustment: TimeDelta,
    inverted: bool,
}

impl TimeRangeCondition {
    /// An empty range until the bounds are set with the `with_*` methods.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            start: Arc::new(|| NaiveTime::MIN),
            end: Arc::new(|| NaiveTime::MIN),
            start_adjustment: TimeDelta::zero(),
            end_adjustment: TimeDelta::zero(),
            inverted: false,
        }
    }

    /// Fixed range between two times of day.
    #[must_use]
    pub fn between(clock: Clock, start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(clock)
            .with_start(move || start)
            .with_end(move || end)
    }

    /// From sunrise to sunset.
    #[must_use]
    pub fn day(clock: Clock, daylight: Arc<dyn DaylightSource>) -> Self {
        let sunset = Arc::clone(&daylight);
        Self::new(clock)
            .with_start(move || daylight.sunrise())
            .with_end(move || sunset.sunset())
    }

    /// From sunset to sunrise.
    #[must_use]
    pub fn night(clock: Clock, daylight: Arc<dyn DaylightSource>) -> Self {
        let sunrise = Arc::clone(&daylight);
        Self::new(clock)
            .with_start(move || daylight.sunset())
            .with_end(move || sunrise.sunrise())
    }

    #[must_use]
    pub fn with_start<F>(mut self, start: F) -> Self
    where
        F: Fn() -> NaiveTime + Send + Sync + 'static,
    {
        self.start = Arc::new(start);
        self
    }

    #[must_use]
    pub fn with_end<F>(mut self, end: F) -> Self
    where
        F: Fn() -> NaiveTime + Send + Sync + 'static,
    {
        self.end = Arc::new(end);
        self
    }

    /// Shift the start bound, e.g. one hour after sunrise.
    #[must_use]
    pub fn with_start_adjustment(mut self, adjustment: TimeDelta) -> Self {
        self.start_adjustment = adjustment;
        self
    }

    /// Shift the end bound, e.g. one hour before sunset.
    #[must_use]
    pub fn with_end_adjustment(mut self, adjustment: TimeDelta) -> Self {
        self.end_adjustment = adjustment;
        self
    }

    /// Fulfilled outside the range instead of inside.
    #[must_use]
    pub fn with_inversion(mut self) -> Self {
        self.inverted = true;
        self
    }

    fn contains(&self, now: NaiveTime) -> bool {
        let (start, _) = (self.start)().overflowing_add_signed(self.start_adjustment);
        let (end, _) = (self.end)().overflowing_add_signed(self.end_adjustment);
        if start <= end {
            now >= start && now < end
        } else {
            now >= start || now < end
        }
    }
}

impl Condition for TimeRangeCondition {
    fn validate(&self) -> ConditionState {
        let state = ConditionState::from(self.contains(self.clock.time_of_day()));
        if self.inverted { state.invert() } else { state }
    }
}

/// Ordered `(relation, condition)` list with a fallback for the empty case.
pub struct ConditionsValidator {
    default_state: ConditionState,
    conditions: Vec<(ConditionRelation, Arc<dyn Condition>)>,
}

impl Default for ConditionsValidator {
    fn default() -> Self {
        Self::new(ConditionState::Fulfilled)
    }
}

impl ConditionsValidator {
    #[must_use]
    pub fn new(default_state: ConditionState) -> Self {
        Self {
            default_state,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_condition(mut self, relation: ConditionRelation, condition: impl Condition + 'static) -> Self {
        self.add(relation, Arc::new(condition));
        self
    }

    pub fn add(&mut self, relation: ConditionRelation, condition: Arc<dyn Condition>) {
        self.conditions.push((relation, condition));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Fold every condition left to right.
    ///
    /// All conditions are evaluated; a panicking condition counts as
    /// [`ConditionState::NotFulfilled`] and is logged.
    #[must_use]
    pub fn validate(&self) -> ConditionState {
        let mut accumulated: Option<ConditionState> = None;
        for (index, (relation, condition)) in self.conditions.iter().enumerate() {
            let state = catch(|| condition.validate()).unwrap_or_else(|err| {
                tracing::warn!(condition = index, %err, "condition evaluation failed");
                ConditionState::NotFulfilled
            });
            accumulated = Some(match accumulated {
                None => state,
                Some(previous) => relation.combine(previous, state),
            });
        }
        accumulated.unwrap_or(self.default_state)
    }
}

impl Condition for ConditionsValidator {
    fn validate(&self) -> ConditionState {
        ConditionsValidator::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::ports::FixedDaylight;

    use super::ConditionRelation::{And, Or};
    use super::ConditionState::{Fulfilled, NotFulfilled};

    fn constant(state: ConditionState) -> ExpressionCondition {
        ExpressionCondition::new(move || state)
    }

    fn clock_at(hour: u32, minute: u32) -> Clock {
        Clock::new(Utc.with_ymd_and_hms(2024, 3, 10, hour, minute, 0).unwrap())
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    // ── ConditionsValidator ──

    #[test]
    fn should_return_default_state_when_empty() {
        assert_eq!(ConditionsValidator::new(NotFulfilled).validate(), NotFulfilled);
        assert_eq!(ConditionsValidator::new(Fulfilled).validate(), Fulfilled);
    }

    #[test]
    fn should_be_fulfilled_when_any_or_condition_is_fulfilled() {
        let validator = ConditionsValidator::new(NotFulfilled)
            .with_condition(Or, constant(NotFulfilled))
            .with_condition(Or, constant(Fulfilled));

        assert_eq!(validator.validate(), Fulfilled);
    }

    #[test]
    fn should_not_be_fulfilled_when_one_and_condition_fails() {
        let validator = ConditionsValidator::new(Fulfilled)
            .with_condition(And, constant(Fulfilled))
            .with_condition(And, constant(NotFulfilled));

        assert_eq!(validator.validate(), NotFulfilled);
    }

    #[test]
    fn should_fold_mixed_relations_left_to_right() {
        // (Fulfilled AND NotFulfilled) OR Fulfilled
        let validator = ConditionsValidator::new(NotFulfilled)
            .with_condition(And, constant(Fulfilled))
            .with_condition(And, constant(NotFulfilled))
            .with_condition(Or, constant(Fulfilled));
        assert_eq!(validator.validate(), Fulfilled);

        // (Fulfilled OR NotFulfilled) AND NotFulfilled
        let validator = ConditionsValidator::new(Fulfilled)
            .with_condition(Or, constant(Fulfilled))
            .with_condition(Or, constant(NotFulfilled))
            .with_condition(And, constant(NotFulfilled));
        assert_eq!(validator.validate(), NotFulfilled);
    }

    #[test]
    fn should_treat_panicking_condition_as_not_fulfilled() {
        let validator = ConditionsValidator::new(Fulfilled)
            .with_condition(Or, ExpressionCondition::new(|| panic!("sensor gone")));

        assert_eq!(validator.validate(), NotFulfilled);
    }

    #[test]
    fn should_nest_validator_as_condition() {
        let inner = ConditionsValidator::new(NotFulfilled).with_condition(Or, constant(Fulfilled));
        let outer = ConditionsValidator::new(NotFulfilled).with_condition(And, inner);

        assert_eq!(outer.validate(), Fulfilled);
    }

    // ── TimeRangeCondition ──

    #[test]
    fn should_be_fulfilled_inside_range() {
        let condition = TimeRangeCondition::between(clock_at(10, 0), time(8, 0), time(12, 0));
        assert_eq!(condition.validate(), Fulfilled);
    }

    #[test]
    fn should_exclude_end_of_range() {
        let condition = TimeRangeCondition::between(clock_at(12, 0), time(8, 0), time(12, 0));
        assert_eq!(condition.validate(), NotFulfilled);
    }

    #[test]
    fn should_cover_midnight_when_range_wraps() {
        let late = TimeRangeCondition::between(clock_at(23, 30), time(22, 0), time(6, 0));
        let early = TimeRangeCondition::between(clock_at(5, 0), time(22, 0), time(6, 0));
        let noon = TimeRangeCondition::between(clock_at(12, 0), time(22, 0), time(6, 0));

        assert_eq!(late.validate(), Fulfilled);
        assert_eq!(early.validate(), Fulfilled);
        assert_eq!(noon.validate(), NotFulfilled);
    }

    #[test]
    fn should_invert_result_when_inversion_set() {
        let condition =
            TimeRangeCondition::between(clock_at(10, 0), time(8, 0), time(12, 0)).with_inversion();
        assert_eq!(condition.validate(), NotFulfilled);
    }

    #[test]
    fn should_reevaluate_bounds_on_every_validation() {
        let clock = clock_at(10, 0);
        let condition = TimeRangeCondition::between(clock.clone(), time(8, 0), time(12, 0));
        assert_eq!(condition.validate(), Fulfilled);

        clock.set_time_of_day(time(13, 0));

        assert_eq!(condition.validate(), NotFulfilled);
    }

    #[test]
    fn should_apply_adjustments_to_bounds() {
        let condition = TimeRangeCondition::between(clock_at(8, 30), time(8, 0), time(12, 0))
            .with_start_adjustment(TimeDelta::hours(1));
        assert_eq!(condition.validate(), NotFulfilled);
    }

    #[test]
    fn should_follow_daylight_for_day_and_night() {
        let daylight: Arc<dyn DaylightSource> =
            Arc::new(FixedDaylight::new(time(6, 30), time(20, 15)));
        let clock = clock_at(21, 0);

        let day = TimeRangeCondition::day(clock.clone(), Arc::clone(&daylight));
        let night = TimeRangeCondition::night(clock, daylight);

        assert_eq!(day.validate(), NotFulfilled);
        assert_eq!(night.validate(), Fulfilled);
    }
}
