//! Area: a logical grouping (room, floor, zone) of components.

use serde::{Deserialize, Serialize};

use crate::id::{AreaId, AutomationId, ComponentId};

/// Error raised when an [`Area`] breaks its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AreaError {
    #[error("area id is missing")]
    MissingId,

    #[error("area name must not be empty")]
    EmptyName,

    #[error("component '{0}' is listed twice")]
    DuplicateComponent(ComponentId),
}

/// A logical grouping such as a room, floor, or zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub components: Vec<ComponentId>,
    pub automations: Vec<AutomationId>,
}

impl Area {
    /// Create a builder for constructing an [`Area`].
    #[must_use]
    pub fn builder() -> AreaBuilder {
        AreaBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError`] when `name` is empty or a component is listed twice.
    pub fn validate(&self) -> Result<(), AreaError> {
        if self.name.is_empty() {
            return Err(AreaError::EmptyName);
        }
        for (index, component) in self.components.iter().enumerate() {
            if self.components[..index].contains(component) {
                return Err(AreaError::DuplicateComponent(component.clone()));
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Area`].
#[derive(Debug, Default)]
pub struct AreaBuilder {
    id: Option<AreaId>,
    name: Option<String>,
    components: Vec<ComponentId>,
    automations: Vec<AutomationId>,
}

impl AreaBuilder {
    #[must_use]
    pub fn id(mut self, id: AreaId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn component(mut self, id: ComponentId) -> Self {
        self.components.push(id);
        self
    }

    #[must_use]
    pub fn automation(mut self, id: AutomationId) -> Self {
        self.automations.push(id);
        self
    }

    /// Consume the builder, validate, and return an [`Area`].
    ///
    /// # Errors
    ///
    /// Returns [`AreaError`] if the id is missing or the area is invalid.
    pub fn build(self) -> Result<Area, AreaError> {
        let area = Area {
            id: self.id.ok_or(AreaError::MissingId)?,
            name: self.name.unwrap_or_default(),
            components: self.components,
            automations: self.automations,
        };
        area.validate()?;
        Ok(area)
    }
}
