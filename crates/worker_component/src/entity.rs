//! The [`Entity`] aggregate: a set of components keyed by component id.

use std::collections::BTreeMap;

use crate::component::ComponentId;
use crate::value::ComponentData;

/// The components of one entity.
///
/// Each component id appears at most once. Adding a component that is
/// already present is rejected rather than overwriting it.
#[derive(Debug, Default)]
pub struct Entity {
    components: BTreeMap<ComponentId, ComponentData>,
}

impl Entity {
    /// Create an entity with no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component.
    ///
    /// # Errors
    ///
    /// Hands `data` back unchanged if the entity already has a component
    /// with the same id.
    pub fn add(&mut self, data: ComponentData) -> Result<(), ComponentData> {
        let id = data.component_id();
        if self.components.contains_key(&id) {
            return Err(data);
        }
        self.components.insert(id, data);
        Ok(())
    }

    /// The component with `component_id`, if present.
    #[must_use]
    pub fn get(&self, component_id: ComponentId) -> Option<&ComponentData> {
        self.components.get(&component_id)
    }

    /// Mutable access to the component with `component_id`.
    pub fn get_mut(&mut self, component_id: ComponentId) -> Option<&mut ComponentData> {
        self.components.get_mut(&component_id)
    }

    /// Remove and return the component with `component_id`.
    pub fn remove(&mut self, component_id: ComponentId) -> Option<ComponentData> {
        self.components.remove(&component_id)
    }

    /// Component ids in ascending order.
    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components.keys().copied().collect()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the entity has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate components in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentData> {
        self.components.values()
    }
}

#[cfg(test)]
mod tests {
    use worker_schema::SchemaComponentData;

    use super::*;

    fn data(component_id: u32, value: i32) -> ComponentData {
        let mut schema = SchemaComponentData::new(component_id);
        schema.fields_mut().add_int32(1, value);
        ComponentData::from_schema(schema)
    }

    #[test]
    fn test_add_does_not_overwrite() {
        let mut entity = Entity::new();
        assert!(entity.add(data(54, 1)).is_ok());
        let rejected = entity.add(data(54, 2)).unwrap_err();
        assert_eq!(rejected.schema().unwrap().fields().get_int32(1), 2);
        let kept = entity.get(ComponentId(54)).unwrap();
        assert_eq!(kept.schema().unwrap().fields().get_int32(1), 1);
        assert_eq!(entity.len(), 1);
    }

    #[test]
    fn test_component_ids_sorted_and_remove() {
        let mut entity = Entity::new();
        entity.add(data(58, 0)).unwrap();
        entity.add(data(53, 0)).unwrap();
        entity.add(data(54, 0)).unwrap();
        assert_eq!(
            entity.component_ids(),
            vec![ComponentId(53), ComponentId(54), ComponentId(58)]
        );

        assert!(entity.remove(ComponentId(54)).is_some());
        assert!(entity.remove(ComponentId(54)).is_none());
        assert_eq!(entity.iter().count(), 2);
        assert!(!entity.is_empty());
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let mut entity = Entity::new();
        entity.add(data(54, 1)).unwrap();
        entity
            .get_mut(ComponentId(54))
            .and_then(ComponentData::schema_mut)
            .unwrap()
            .fields_mut()
            .add_int32(1, 9);
        let fields = entity.get(ComponentId(54)).unwrap().schema().unwrap().fields();
        assert_eq!(fields.get_int32(1), 9);
    }
}
