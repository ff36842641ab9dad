//! Scheduler: turns clock ticks into delayed actions and recurring schedules.
//!
//! On every tick the schedule list is scanned under one lock. Entries that
//! are due and not already running are marked [`ScheduleStatus::Running`] and
//! handed to a [`Dispatcher`] after the lock is released; one-shot entries
//! leave the list at that moment. The execution wrapper records duration,
//! outcome and the next execution time.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use hausbus_domain::error::{HausbusError, UsageError};
use hausbus_domain::event::{Event, EventKind};
use hausbus_domain::schedule::{ScheduleSnapshot, ScheduleStatus};
use hausbus_domain::time::{self, Timestamp};
use tokio::sync::mpsc;

use crate::clock::Clock;
use crate::guard::run_guarded;
use crate::ports::EventPublisher;
use crate::subscription::Subscription;
use crate::sync::lock;
use crate::trigger::Action;

/// Unit of work handed to a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution context for due schedule bodies.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs jobs synchronously on the ticking thread.
///
/// Deterministic; used by tests and simulations driving a fake clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Fixed set of tokio workers fed over a channel.
///
/// Each job runs on the blocking pool so bus I/O never stalls the runtime.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    sender: mpsc::UnboundedSender<Job>,
}

impl WorkerPool {
    /// Spawn `workers` workers (at least one) on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    let job = receiver.lock().await.recv().await;
                    let Some(job) = job else { break };
                    if let Err(err) = tokio::task::spawn_blocking(job).await {
                        tracing::error!(worker, %err, "scheduled job aborted");
                    }
                }
                tracing::debug!(worker, "worker stopped");
            });
        }
        Self { sender }
    }
}

impl Dispatcher for WorkerPool {
    fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::error!("worker pool is closed, dropping job");
        }
    }
}

#[derive(Debug)]
struct Runtime {
    status: ScheduleStatus,
    next_execution: Timestamp,
    last_execution: Option<Timestamp>,
    last_duration: Option<Duration>,
    last_error: Option<String>,
}

struct Entry {
    name: String,
    interval: Option<Duration>,
    action: Arc<Action>,
    runtime: Mutex<Runtime>,
}

impl Entry {
    fn snapshot(&self) -> ScheduleSnapshot {
        let runtime = lock(&self.runtime);
        ScheduleSnapshot {
            name: self.name.clone(),
            interval: self.interval,
            status: runtime.status,
            next_execution: runtime.next_execution,
            last_execution: runtime.last_execution,
            last_duration: runtime.last_duration,
            last_error: runtime.last_error.clone(),
        }
    }
}

struct SchedulerInner {
    clock: Clock,
    dispatcher: Arc<dyn Dispatcher>,
    publisher: Option<Arc<dyn EventPublisher>>,
    entries: Mutex<Vec<Arc<Entry>>>,
    _tick: Subscription,
}

impl SchedulerInner {
    fn insert(&self, entry: Entry) -> Result<(), UsageError> {
        let mut entries = lock(&self.entries);
        if entries.iter().any(|existing| existing.name == entry.name) {
            return Err(UsageError::DuplicateSchedule(entry.name));
        }
        entries.push(Arc::new(entry));
        Ok(())
    }

    fn execute_due(&self) {
        let now = self.clock.now();
        let due: Vec<Arc<Entry>> = {
            let mut entries = lock(&self.entries);
            let mut due = Vec::new();
            entries.retain(|entry| {
                let mut runtime = lock(&entry.runtime);
                if runtime.status == ScheduleStatus::Running || now < runtime.next_execution {
                    return true;
                }
                runtime.status = ScheduleStatus::Running;
                due.push(Arc::clone(entry));
                entry.interval.is_some()
            });
            due
        };

        for entry in due {
            let clock = self.clock.clone();
            let publisher = self.publisher.clone();
            self.dispatcher
                .dispatch(Box::new(move || run_entry(&entry, &clock, publisher.as_deref())));
        }
    }
}

fn run_entry(entry: &Entry, clock: &Clock, publisher: Option<&dyn EventPublisher>) {
    let started_at = clock.now();
    let started = Instant::now();
    let result = run_guarded(|| (entry.action)());
    let duration = started.elapsed();

    let mut runtime = lock(&entry.runtime);
    match result {
        Ok(()) => {
            runtime.status = ScheduleStatus::Idle;
            runtime.last_error = None;
        }
        Err(err) => {
            tracing::error!(schedule = %entry.name, %err, "scheduled task failed");
            if let Some(publisher) = publisher {
                publisher.publish(Event::now(EventKind::ScheduleFaulted {
                    name: entry.name.clone(),
                    error: err.clone(),
                }));
            }
            runtime.status = ScheduleStatus::Faulted;
            runtime.last_error = Some(err);
        }
    }
    runtime.last_execution = Some(started_at);
    runtime.last_duration = Some(duration);
    if let Some(interval) = entry.interval {
        runtime.next_execution = time::add(clock.now(), interval);
    }
}

/// Shared handle to the scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler driven by `clock` and executing through `dispatcher`.
    ///
    /// Faulted tasks are reported to `publisher` when one is given.
    pub fn new(
        clock: Clock,
        dispatcher: Arc<dyn Dispatcher>,
        publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<SchedulerInner>| {
            let weak = weak.clone();
            let tick = clock.on_tick(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.execute_due();
                }
            });
            SchedulerInner {
                clock,
                dispatcher,
                publisher,
                entries: Mutex::new(Vec::new()),
                _tick: tick,
            }
        });
        Self { inner }
    }

    /// A scheduler running every job inline on the ticking thread.
    pub fn inline(clock: Clock) -> Self {
        Self::new(clock, Arc::new(InlineDispatcher), None)
    }

    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Register a recurring schedule, first due on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateSchedule`] when `name` is taken.
    pub fn register_schedule<F>(
        &self,
        name: impl Into<String>,
        interval: Duration,
        action: F,
    ) -> Result<(), HausbusError>
    where
        F: Fn() -> Result<(), HausbusError> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(schedule = %name, ?interval, "registering schedule");
        self.inner.insert(Entry {
            name,
            interval: Some(interval),
            action: Arc::new(action),
            runtime: Mutex::new(Runtime {
                status: ScheduleStatus::Idle,
                next_execution: self.inner.clock.now(),
                last_execution: None,
                last_duration: None,
                last_error: None,
            }),
        })?;
        Ok(())
    }

    /// Run `action` once, `delay` from now.
    pub fn run_in<F>(&self, delay: Duration, action: F) -> DelayedAction
    where
        F: FnOnce() -> Result<(), HausbusError> + Send + 'static,
    {
        let name = format!("delayed:{}", uuid::Uuid::new_v4());
        let slot = Mutex::new(Some(action));
        let entry = Entry {
            name: name.clone(),
            interval: None,
            action: Arc::new(move || match lock(&slot).take() {
                Some(action) => action(),
                None => Ok(()),
            }),
            runtime: Mutex::new(Runtime {
                status: ScheduleStatus::Idle,
                next_execution: time::add(self.inner.clock.now(), delay),
                last_execution: None,
                last_duration: None,
                last_error: None,
            }),
        };
        if let Err(err) = self.inner.insert(entry) {
            tracing::error!(%err, "delayed action name collision");
        }
        DelayedAction {
            name,
            scheduler: Arc::downgrade(&self.inner),
        }
    }

    /// Snapshots of every registered schedule and pending delayed action.
    pub fn schedules(&self) -> Vec<ScheduleSnapshot> {
        lock(&self.inner.entries)
            .iter()
            .map(|entry| entry.snapshot())
            .collect()
    }

    /// Snapshot of one schedule by name.
    pub fn schedule(&self, name: &str) -> Option<ScheduleSnapshot> {
        lock(&self.inner.entries)
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.snapshot())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("entries", &lock(&self.inner.entries).len())
            .finish_non_exhaustive()
    }
}

/// Handle to a pending one-shot action.
#[derive(Debug, Clone)]
pub struct DelayedAction {
    name: String,
    scheduler: Weak<SchedulerInner>,
}

impl DelayedAction {
    /// Prevent the action from running.
    ///
    /// Returns `true` when the action was still pending. Once dispatched the
    /// action can no longer be cancelled and `false` is returned.
    pub fn cancel(&self) -> bool {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return false;
        };
        let mut entries = lock(&scheduler.entries);
        let before = entries.len();
        entries.retain(|entry| entry.name != self.name);
        before != entries.len()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|scheduler| lock(&scheduler.entries).iter().any(|e| e.name == self.name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event_bus::InProcessEventBus;

    fn clock() -> Clock {
        Clock::new(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap())
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Result<(), HausbusError> + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        (count, move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    // ── Recurring schedules ──

    #[test]
    fn should_run_recurring_schedule_once_per_elapsed_interval() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let (count, action) = counter();
        scheduler
            .register_schedule("poll", Duration::from_secs(1), action)
            .unwrap();

        for _ in 0..5 {
            clock.tick(Duration::from_secs(1));
        }

        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn should_not_run_before_interval_elapsed() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let (count, action) = counter();
        scheduler
            .register_schedule("poll", Duration::from_secs(10), action)
            .unwrap();

        clock.tick(Duration::from_secs(1));
        clock.tick(Duration::from_secs(1));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_reject_duplicate_schedule_name() {
        let scheduler = Scheduler::inline(clock());
        scheduler
            .register_schedule("poll", Duration::from_secs(1), || Ok(()))
            .unwrap();

        let result = scheduler.register_schedule("poll", Duration::from_secs(5), || Ok(()));

        assert!(matches!(
            result,
            Err(HausbusError::Usage(UsageError::DuplicateSchedule(ref name))) if name == "poll"
        ));
    }

    #[test]
    fn should_mark_failing_schedule_faulted_and_keep_it_eligible() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        scheduler
            .register_schedule("flaky", Duration::from_secs(1), move || {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(HausbusError::action("sensor offline"))
            })
            .unwrap();

        clock.tick(Duration::from_secs(1));
        let snapshot = scheduler.schedule("flaky").unwrap();
        assert_eq!(snapshot.status, ScheduleStatus::Faulted);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("action failed: sensor offline")
        );

        clock.tick(Duration::from_secs(1));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn should_clear_error_after_successful_run() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        scheduler
            .register_schedule("recovering", Duration::from_secs(1), move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
                Ok(())
            })
            .unwrap();

        clock.tick(Duration::from_secs(1));
        clock.tick(Duration::from_secs(1));

        let snapshot = scheduler.schedule("recovering").unwrap();
        assert_eq!(snapshot.status, ScheduleStatus::Idle);
        assert!(snapshot.last_error.is_none());
        assert!(snapshot.last_execution.is_some());
    }

    #[test]
    fn should_publish_fault_event() {
        let clock = clock();
        let bus = InProcessEventBus::new(8);
        let mut rx = bus.subscribe();
        let scheduler = Scheduler::new(clock.clone(), Arc::new(InlineDispatcher), Some(Arc::new(bus)));
        scheduler
            .register_schedule("broken", Duration::from_secs(1), || {
                Err(HausbusError::action("nope"))
            })
            .unwrap();

        clock.tick(Duration::from_secs(1));

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.kind,
            EventKind::ScheduleFaulted { ref name, .. } if name == "broken"
        ));
    }

    #[test]
    fn should_skip_schedule_while_running() {
        struct Deferred(Mutex<Vec<Job>>);
        impl Dispatcher for Deferred {
            fn dispatch(&self, job: Job) {
                self.0.lock().unwrap().push(job);
            }
        }

        let clock = clock();
        let dispatcher = Arc::new(Deferred(Mutex::new(Vec::new())));
        let scheduler = Scheduler::new(clock.clone(), dispatcher.clone(), None);
        scheduler
            .register_schedule("slow", Duration::from_secs(1), || Ok(()))
            .unwrap();

        clock.tick(Duration::from_secs(1));
        clock.tick(Duration::from_secs(1));
        assert_eq!(dispatcher.0.lock().unwrap().len(), 1);
        assert_eq!(
            scheduler.schedule("slow").unwrap().status,
            ScheduleStatus::Running
        );

        let job = dispatcher.0.lock().unwrap().pop().unwrap();
        job();
        clock.tick(Duration::from_secs(1));
        assert_eq!(dispatcher.0.lock().unwrap().len(), 1);
    }

    // ── Delayed actions ──

    #[test]
    fn should_run_delayed_action_once_after_delay() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let (count, action) = counter();
        let _delayed = scheduler.run_in(Duration::from_secs(2), action);

        clock.tick(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        clock.tick(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        clock.tick(Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.schedules().is_empty());
    }

    #[test]
    fn should_never_run_action_cancelled_before_delay() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let (count, action) = counter();
        let delayed = scheduler.run_in(Duration::from_secs(2), action);

        clock.tick(Duration::from_secs(1));
        assert!(delayed.cancel());
        clock.tick(Duration::from_secs(5));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!delayed.is_pending());
    }

    #[test]
    fn should_ignore_cancel_after_dispatch() {
        let clock = clock();
        let scheduler = Scheduler::inline(clock.clone());
        let (count, action) = counter();
        let delayed = scheduler.run_in(Duration::from_secs(1), action);

        clock.tick(Duration::from_secs(1));

        assert!(!delayed.cancel());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_list_pending_delayed_actions_as_one_shots() {
        let scheduler = Scheduler::inline(clock());
        let _delayed = scheduler.run_in(Duration::from_secs(30), || Ok(()));

        let schedules = scheduler.schedules();

        assert_eq!(schedules.len(), 1);
        assert!(!schedules[0].is_recurring());
        assert!(schedules[0].name.starts_with("delayed:"));
    }

    // ── Worker pool ──

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_run_jobs_on_worker_pool() {
        let pool = WorkerPool::spawn(2);
        let (tx, rx) = tokio::sync::oneshot::channel();

        pool.dispatch(Box::new(move || {
            let _ = tx.send(42);
        }));

        assert_eq!(rx.await, Ok(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn should_dispatch_due_schedules_to_worker_pool() {
        let clock = clock();
        let scheduler = Scheduler::new(clock.clone(), Arc::new(WorkerPool::spawn(2)), None);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        scheduler
            .register_schedule("report", Duration::from_secs(1), move || {
                let _ = tx.send(());
                Ok(())
            })
            .unwrap();

        clock.tick(Duration::from_secs(1));

        assert_eq!(rx.recv().await, Some(()));
    }
}
