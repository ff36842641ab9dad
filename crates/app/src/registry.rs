//! Component registry: lookup of components and areas, and the bridge from
//! component and board changes to the event bus.

use std::sync::{Arc, Mutex};

use hausbus_domain::area::Area;
use hausbus_domain::error::{HausbusError, NotFoundError, UsageError};
use hausbus_domain::event::{Event, EventKind};
use hausbus_domain::id::{AreaId, ComponentId};
use hausbus_domain::state::ComponentStatus;

use crate::clock::Clock;
use crate::component::ManagedComponent;
use crate::hardware::IoBoard;
use crate::ports::EventPublisher;
use crate::subscription::Subscription;
use crate::sync::lock;

struct Registered {
    component: Arc<dyn ManagedComponent>,
    _forwarding: Subscription,
}

struct RegistryInner {
    clock: Clock,
    publisher: Option<Arc<dyn EventPublisher>>,
    components: Mutex<Vec<Registered>>,
    areas: Mutex<Vec<Area>>,
    boards: Mutex<Vec<Subscription>>,
}

/// Shared registry of every component and area of the installation.
#[derive(Clone)]
pub struct ComponentRegistry {
    inner: Arc<RegistryInner>,
}

impl ComponentRegistry {
    /// Create a registry; status and pin changes are published to
    /// `publisher` when one is given, timestamped with `clock`.
    pub fn new(clock: Clock, publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                clock,
                publisher,
                components: Mutex::new(Vec::new()),
                areas: Mutex::new(Vec::new()),
                boards: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register `component` and forward its status changes.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateComponent`] when the id is taken.
    pub fn add(&self, component: Arc<dyn ManagedComponent>) -> Result<(), HausbusError> {
        let mut components = lock(&self.inner.components);
        let id = component.id().clone();
        if components.iter().any(|entry| entry.component.id() == &id) {
            return Err(UsageError::DuplicateComponent(id.to_string()).into());
        }

        let forwarding = match &self.inner.publisher {
            Some(publisher) => {
                let publisher = Arc::clone(publisher);
                let clock = self.inner.clock.clone();
                let component_id = id.clone();
                component.on_status_changed(Arc::new(
                    move |old: &ComponentStatus, new: &ComponentStatus| {
                        publisher.publish(Event::at(
                            clock.now(),
                            EventKind::ComponentStatusChanged {
                                component_id: component_id.clone(),
                                old: old.clone(),
                                new: new.clone(),
                            },
                        ));
                    },
                ))
            }
            None => Subscription::empty(),
        };

        tracing::info!(component = %id, kind = component.kind(), "component registered");
        components.push(Registered {
            component,
            _forwarding: forwarding,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no component has this id.
    pub fn get(&self, id: &ComponentId) -> Result<Arc<dyn ManagedComponent>, NotFoundError> {
        lock(&self.inner.components)
            .iter()
            .find(|entry| entry.component.id() == id)
            .map(|entry| Arc::clone(&entry.component))
            .ok_or_else(|| NotFoundError {
                kind: "component",
                id: id.to_string(),
            })
    }

    /// Every component, in registration order.
    pub fn list(&self) -> Vec<Arc<dyn ManagedComponent>> {
        lock(&self.inner.components)
            .iter()
            .map(|entry| Arc::clone(&entry.component))
            .collect()
    }

    /// Publish the pin changes of `board` as [`EventKind::PinChanged`].
    pub fn add_board(&self, board: &IoBoard) {
        let Some(publisher) = self.inner.publisher.clone() else {
            return;
        };
        let clock = self.inner.clock.clone();
        let device_id = board.id().clone();
        let subscription = board.on_pin_changed(move |change| {
            publisher.publish(Event::at(
                clock.now(),
                EventKind::PinChanged {
                    device_id: device_id.clone(),
                    pin: change.pin,
                    old: change.old,
                    new: change.new,
                },
            ));
        });
        lock(&self.inner.boards).push(subscription);
    }

    /// # Errors
    ///
    /// Returns [`UsageError::DuplicateArea`] when the id is taken, or
    /// [`NotFoundError`] when the area references an unknown component.
    pub fn add_area(&self, area: Area) -> Result<(), HausbusError> {
        for component in &area.components {
            self.get(component)?;
        }
        let mut areas = lock(&self.inner.areas);
        if areas.iter().any(|existing| existing.id == area.id) {
            return Err(UsageError::DuplicateArea(area.id.to_string()).into());
        }
        tracing::info!(area = %area.id, components = area.components.len(), "area registered");
        areas.push(area);
        Ok(())
    }

    pub fn areas(&self) -> Vec<Area> {
        lock(&self.inner.areas).clone()
    }

    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no area has this id.
    pub fn area(&self, id: &AreaId) -> Result<Area, NotFoundError> {
        lock(&self.inner.areas)
            .iter()
            .find(|area| &area.id == id)
            .cloned()
            .ok_or_else(|| NotFoundError {
                kind: "area",
                id: id.to_string(),
            })
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &lock(&self.inner.components).len())
            .field("areas", &lock(&self.inner.areas).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use hausbus_domain::address::I2cAddress;
    use hausbus_domain::id::DeviceId;
    use hausbus_domain::state::PowerState;

    use super::*;
    use crate::component::StateMachine;
    use crate::event_bus::InProcessEventBus;
    use crate::hardware::{BoardOptions, Register16Driver};
    use crate::testing::{FakeBus, RecordingOutput, clock};

    fn lamp(name: &str) -> Arc<StateMachine> {
        Arc::new(StateMachine::binary(
            ComponentId::new(name).unwrap(),
            Arc::new(RecordingOutput::default()),
        ))
    }

    // ── Components ──

    #[test]
    fn should_reject_duplicate_component() {
        let registry = ComponentRegistry::new(clock(), None);
        registry.add(lamp("lamp")).unwrap();

        let result = registry.add(lamp("lamp"));

        assert!(matches!(
            result,
            Err(HausbusError::Usage(UsageError::DuplicateComponent(_)))
        ));
    }

    #[test]
    fn should_list_components_in_registration_order() {
        let registry = ComponentRegistry::new(clock(), None);
        registry.add(lamp("b")).unwrap();
        registry.add(lamp("a")).unwrap();

        let ids: Vec<String> = registry
            .list()
            .iter()
            .map(|component| component.id().to_string())
            .collect();

        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn should_report_unknown_component() {
        let registry = ComponentRegistry::new(clock(), None);

        let err = registry.get(&ComponentId::new("ghost").unwrap()).err().unwrap();

        assert_eq!(err.kind, "component");
    }

    // ── Events ──

    #[tokio::test]
    async fn should_publish_status_changes() {
        let bus = InProcessEventBus::new(16);
        let mut events = bus.subscribe();
        let registry = ComponentRegistry::new(clock(), Some(Arc::new(bus)));
        let lamp = lamp("lamp");
        registry.add(lamp.clone()).unwrap();

        lamp.turn_on().unwrap();

        let event = events.recv().await.unwrap();
        match event.kind {
            EventKind::ComponentStatusChanged { component_id, new, .. } => {
                assert_eq!(component_id.as_str(), "lamp");
                assert!(new.has(PowerState::On));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_publish_pin_changes_of_board() {
        let bus = InProcessEventBus::new(16);
        let mut events = bus.subscribe();
        let registry = ComponentRegistry::new(clock(), Some(Arc::new(bus)));
        let fake = Arc::new(FakeBus::default());
        let address = I2cAddress::new(0x20);
        let board = IoBoard::new(
            DeviceId::new("inputs").unwrap(),
            Register16Driver::max7311(address, fake.clone()),
            BoardOptions::default(),
        )
        .unwrap();
        registry.add_board(&board);

        fake.set_response(address, vec![0x00, 0x01]);
        board.fetch_state().unwrap();

        let event = events.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::PinChanged { pin: 8, .. }));
    }

    // ── Areas ──

    #[test]
    fn should_reject_area_with_unknown_component() {
        let registry = ComponentRegistry::new(clock(), None);
        let area = Area::builder()
            .id(AreaId::new("hall").unwrap())
            .name("Hall")
            .component(ComponentId::new("missing").unwrap())
            .build()
            .unwrap();

        assert!(matches!(registry.add_area(area), Err(HausbusError::NotFound(_))));
    }

    #[test]
    fn should_return_registered_area() {
        let registry = ComponentRegistry::new(clock(), None);
        registry.add(lamp("hall.lamp")).unwrap();
        let area = Area::builder()
            .id(AreaId::new("hall").unwrap())
            .name("Hall")
            .component(ComponentId::new("hall.lamp").unwrap())
            .build()
            .unwrap();
        registry.add_area(area.clone()).unwrap();

        assert_eq!(registry.area(&AreaId::new("hall").unwrap()).unwrap(), area);
        assert!(matches!(
            registry.add_area(area),
            Err(HausbusError::Usage(UsageError::DuplicateArea(_)))
        ));
    }
}
