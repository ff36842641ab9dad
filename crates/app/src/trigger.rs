//! Trigger: a multicast event source with attached actions.

use std::sync::Arc;
use std::time::Duration;

use hausbus_domain::error::HausbusError;

use crate::guard::run_guarded;
use crate::scheduler::Scheduler;
use crate::subscription::{Listeners, Subscription};

/// Zero-argument action attached to a trigger or run by an automation.
pub type Action = dyn Fn() -> Result<(), HausbusError> + Send + Sync;

/// Multicast event source.
///
/// Clones share the attached actions, so a component can hand out its
/// trigger while keeping the ability to fire it.
#[derive(Clone, Default)]
pub struct Trigger {
    name: Arc<str>,
    actions: Listeners<Action>,
}

impl Trigger {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            actions: Listeners::new(),
        }
    }

    /// A trigger fired by a recurring schedule every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateSchedule`](hausbus_domain::error::UsageError)
    /// when a schedule called `name` already exists.
    pub fn every(
        scheduler: &Scheduler,
        name: impl Into<Arc<str>>,
        interval: Duration,
    ) -> Result<Self, HausbusError> {
        let trigger = Self::new(name);
        let fired = trigger.clone();
        scheduler.register_schedule(trigger.name(), interval, move || {
            fired.execute();
            Ok(())
        })?;
        Ok(trigger)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `action`; it runs after every action attached before it.
    pub fn attach<F>(&self, action: F) -> Subscription
    where
        F: Fn() -> Result<(), HausbusError> + Send + Sync + 'static,
    {
        self.actions.add(Arc::new(action))
    }

    /// Fire `other` every time this trigger fires.
    pub fn forward_to(&self, other: &Trigger) -> Subscription {
        let other = other.clone();
        self.attach(move || {
            other.execute();
            Ok(())
        })
    }

    #[must_use]
    pub fn is_any_attached(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Run every attached action in attachment order on the calling thread.
    ///
    /// A failing or panicking action is logged and does not prevent the
    /// following ones from running.
    pub fn execute(&self) {
        let actions = self.actions.snapshot();
        tracing::trace!(trigger = %self.name, actions = actions.len(), "trigger fired");
        for action in actions {
            if let Err(err) = run_guarded(|| action()) {
                tracing::warn!(trigger = %self.name, %err, "trigger action failed");
            }
        }
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .finish()
    }
}
