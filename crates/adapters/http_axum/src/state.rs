//! Shared application state for axum handlers.

use hausbus_app::event_bus::InProcessEventBus;
use hausbus_app::registry::ComponentRegistry;
use hausbus_app::scheduler::Scheduler;

/// Application state shared across all axum handlers.
///
/// Every field is a cheap handle onto shared engine state, so cloning the
/// state per request clones no data.
#[derive(Clone, Debug)]
pub struct AppState {
    pub registry: ComponentRegistry,
    pub scheduler: Scheduler,
    pub event_bus: InProcessEventBus,
}

impl AppState {
    pub fn new(registry: ComponentRegistry, scheduler: Scheduler, event_bus: InProcessEventBus) -> Self {
        Self {
            registry,
            scheduler,
            event_bus,
        }
    }
}
