//! Event bus port: publish/subscribe for domain events.

use hausbus_domain::event::Event;

/// Publishes domain events to interested subscribers.
///
/// Publishing is synchronous and never fails: events are produced from
/// hardware and timer callbacks that have nobody to report an error to.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event);
}

impl<T: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) {
        (**self).publish(event);
    }
}
