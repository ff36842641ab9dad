//! The single time source of the engine.
//!
//! Nothing in the engine reads the system clock directly. The daemon drives
//! [`Clock::run`] from a tokio interval; tests call [`Clock::tick`] with
//! whatever elapsed time they need, which makes every timer deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, TimeDelta, Utc};
use hausbus_domain::time::{self, Timestamp};
use tokio::time::{Instant, MissedTickBehavior};

use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;

type TickListener = dyn Fn(Duration) + Send + Sync;

struct ClockInner {
    now: Mutex<Timestamp>,
    utc_offset: FixedOffset,
    listeners: Listeners<TickListener>,
}

/// Shared handle to the engine clock.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

impl Clock {
    /// A clock starting at `start`, reporting local times in UTC.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self::with_utc_offset(start, Utc.fix())
    }

    /// A clock starting at `start`, reporting local times at `utc_offset`.
    #[must_use]
    pub fn with_utc_offset(start: Timestamp, utc_offset: FixedOffset) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                now: Mutex::new(start),
                utc_offset,
                listeners: Listeners::new(),
            }),
        }
    }

    /// A clock starting at the current system time.
    #[must_use]
    pub fn starting_now(utc_offset: FixedOffset) -> Self {
        Self::with_utc_offset(time::now(), utc_offset)
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        *lock(&self.inner.now)
    }

    /// Local wall-clock time of day.
    #[must_use]
    pub fn time_of_day(&self) -> NaiveTime {
        self.now().with_timezone(&self.inner.utc_offset).time()
    }

    /// Move the clock to `time` (local) on the current local date, without
    /// notifying tick listeners.
    pub fn set_time_of_day(&self, time: NaiveTime) {
        let mut now = lock(&self.inner.now);
        let local = now.with_timezone(&self.inner.utc_offset);
        let delta: TimeDelta = time - local.time();
        *now += delta;
    }

    /// Advance the clock by `elapsed` and notify every tick listener.
    pub fn tick(&self, elapsed: Duration) {
        {
            let mut now = lock(&self.inner.now);
            *now = time::add(*now, elapsed);
        }
        for listener in self.inner.listeners.snapshot() {
            listener(elapsed);
        }
    }

    /// Register a listener invoked with the elapsed time of every tick.
    pub fn on_tick<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// A stopped stopwatch measuring time on this clock.
    #[must_use]
    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch {
            clock: self.clone(),
            started_at: None,
        }
    }

    /// Tick forever at `period`, passing the measured elapsed time.
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        loop {
            interval.tick().await;
            let now = Instant::now();
            self.tick(now - last);
            last = now;
        }
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock").field("now", &self.now()).finish()
    }
}

/// Measures elapsed clock time since the last restart.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    clock: Clock,
    started_at: Option<Timestamp>,
}

impl Stopwatch {
    pub fn restart(&mut self) {
        self.started_at = Some(self.clock.now());
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since the last restart, `None` while stopped.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at
            .map(|started_at| time::elapsed(started_at, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::TimeZone;

    use super::*;

    fn clock() -> Clock {
        Clock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn should_advance_time_on_tick() {
        let clock = clock();
        let start = clock.now();

        clock.tick(Duration::from_secs(5));

        assert_eq!(time::elapsed(start, clock.now()), Duration::from_secs(5));
    }

    #[test]
    fn should_notify_tick_listeners_with_elapsed_time() {
        let clock = clock();
        let total = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&total);
        let _subscription = clock.on_tick(move |elapsed| {
            seen.fetch_add(u64::try_from(elapsed.as_millis()).unwrap(), Ordering::SeqCst);
        });

        clock.tick(Duration::from_millis(250));
        clock.tick(Duration::from_millis(750));

        assert_eq!(total.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn should_stop_notifying_after_subscription_dropped() {
        let clock = clock();
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let subscription = clock.on_tick(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        clock.tick(Duration::from_secs(1));
        drop(subscription);
        clock.tick(Duration::from_secs(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_report_local_time_of_day_with_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = Clock::with_utc_offset(start, offset);

        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn should_set_time_of_day_on_same_date() {
        let clock = clock();
        let evening = NaiveTime::from_hms_opt(21, 30, 0).unwrap();

        clock.set_time_of_day(evening);

        assert_eq!(clock.time_of_day(), evening);
        assert_eq!(
            clock.now().date_naive(),
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn should_measure_elapsed_time_with_stopwatch() {
        let clock = clock();
        let mut stopwatch = clock.stopwatch();
        assert_eq!(stopwatch.elapsed(), None);

        stopwatch.restart();
        clock.tick(Duration::from_secs(3));

        assert_eq!(stopwatch.elapsed(), Some(Duration::from_secs(3)));
        stopwatch.stop();
        assert!(!stopwatch.is_running());
    }
}
