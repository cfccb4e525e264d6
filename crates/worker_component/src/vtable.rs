//! Per-component codecs between user types and schema data.
//!
//! A [`ComponentVtable`] holds up to four [`HandleCodec`]s, one for each
//! payload kind (command request, command response, component data,
//! component update). Each codec can deserialize schema into an opaque
//! [`UserHandle`], serialize it back, copy it, and free it.
//!
//! Vtables are registered per component id in a [`VtableRegistry`], which
//! falls back to an optional default vtable. The registry is handed to the
//! connection or snapshot stream that needs it; there is no process-wide
//! table.

use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use worker_schema::{
    SchemaCommandRequest, SchemaCommandResponse, SchemaComponentData, SchemaComponentUpdate,
    SchemaError,
};

use crate::component::ComponentId;
use crate::error::VtableError;

/// An opaque user value standing in for schema data.
pub type UserHandle = Box<dyn Any + Send>;

/// Converts between one schema root kind `S` and user handles.
pub trait HandleCodec<S>: Send + Sync {
    /// Build a user handle from schema data.
    ///
    /// # Errors
    ///
    /// Returns a [`VtableError`] if the schema data cannot be read.
    fn deserialize(&self, component_id: ComponentId, source: &S) -> Result<UserHandle, VtableError>;

    /// Write a user handle out as schema data.
    ///
    /// # Errors
    ///
    /// Returns [`VtableError::HandleType`] if the handle is not the expected type.
    fn serialize(
        &self,
        component_id: ComponentId,
        handle: &(dyn Any + Send),
    ) -> Result<S, VtableError>;

    /// Produce an independent copy of a user handle.
    ///
    /// # Errors
    ///
    /// Returns [`VtableError::HandleType`] if the handle is not the expected type.
    fn copy(
        &self,
        component_id: ComponentId,
        handle: &(dyn Any + Send),
    ) -> Result<UserHandle, VtableError>;

    /// Release a user handle. Dropping it is enough unless the codec tracks
    /// its handles elsewhere.
    fn free(&self, _component_id: ComponentId, handle: UserHandle) {
        drop(handle);
    }
}

/// A [`HandleCodec`] built from two plain functions for a `Clone` user type.
pub struct FnCodec<T, S> {
    serialize_fn: fn(ComponentId, &T) -> S,
    deserialize_fn: fn(&S) -> Result<T, SchemaError>,
    _marker: PhantomData<fn() -> (T, S)>,
}

impl<T, S> FnCodec<T, S> {
    /// Create a codec from a serializer and a deserializer.
    #[must_use]
    pub fn new(
        serialize_fn: fn(ComponentId, &T) -> S,
        deserialize_fn: fn(&S) -> Result<T, SchemaError>,
    ) -> Self {
        Self {
            serialize_fn,
            deserialize_fn,
            _marker: PhantomData,
        }
    }
}

impl<T, S> FnCodec<T, S>
where
    T: Clone + Send + 'static,
{
    fn downcast<'a>(
        component_id: ComponentId,
        handle: &'a (dyn Any + Send),
    ) -> Result<&'a T, VtableError> {
        handle
            .downcast_ref::<T>()
            .ok_or(VtableError::HandleType {
                component_id,
                expected: std::any::type_name::<T>(),
            })
    }
}

impl<T, S> HandleCodec<S> for FnCodec<T, S>
where
    T: Clone + Send + 'static,
{
    fn deserialize(&self, _component_id: ComponentId, source: &S) -> Result<UserHandle, VtableError> {
        let value = (self.deserialize_fn)(source)?;
        Ok(Box::new(value))
    }

    fn serialize(
        &self,
        component_id: ComponentId,
        handle: &(dyn Any + Send),
    ) -> Result<S, VtableError> {
        let value = Self::downcast(component_id, handle)?;
        Ok((self.serialize_fn)(component_id, value))
    }

    fn copy(
        &self,
        component_id: ComponentId,
        handle: &(dyn Any + Send),
    ) -> Result<UserHandle, VtableError> {
        let value = Self::downcast(component_id, handle)?;
        Ok(Box::new(value.clone()))
    }
}

/// Codecs for the four payload kinds of one component.
#[derive(Clone, Default)]
pub struct ComponentVtable {
    /// Command request codec.
    pub command_request: Option<Arc<dyn HandleCodec<SchemaCommandRequest>>>,
    /// Command response codec.
    pub command_response: Option<Arc<dyn HandleCodec<SchemaCommandResponse>>>,
    /// Component data codec.
    pub component_data: Option<Arc<dyn HandleCodec<SchemaComponentData>>>,
    /// Component update codec.
    pub component_update: Option<Arc<dyn HandleCodec<SchemaComponentUpdate>>>,
}

impl ComponentVtable {
    /// Create a vtable with no codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command request codec.
    #[must_use]
    pub fn with_command_request(
        mut self,
        codec: impl HandleCodec<SchemaCommandRequest> + 'static,
    ) -> Self {
        self.command_request = Some(Arc::new(codec));
        self
    }

    /// Set the command response codec.
    #[must_use]
    pub fn with_command_response(
        mut self,
        codec: impl HandleCodec<SchemaCommandResponse> + 'static,
    ) -> Self {
        self.command_response = Some(Arc::new(codec));
        self
    }

    /// Set the component data codec.
    #[must_use]
    pub fn with_component_data(
        mut self,
        codec: impl HandleCodec<SchemaComponentData> + 'static,
    ) -> Self {
        self.component_data = Some(Arc::new(codec));
        self
    }

    /// Set the component update codec.
    #[must_use]
    pub fn with_component_update(
        mut self,
        codec: impl HandleCodec<SchemaComponentUpdate> + 'static,
    ) -> Self {
        self.component_update = Some(Arc::new(codec));
        self
    }
}

impl std::fmt::Debug for ComponentVtable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentVtable")
            .field("command_request", &self.command_request.is_some())
            .field("command_response", &self.command_response.is_some())
            .field("component_data", &self.component_data.is_some())
            .field("component_update", &self.component_update.is_some())
            .finish()
    }
}

/// A schema root kind that can be routed through a vtable.
pub trait SchemaRoot: Clone + Send + Sized + 'static {
    /// Human-readable kind, used in error messages.
    const KIND: &'static str;

    /// The component id carried by the root.
    fn root_component_id(&self) -> ComponentId;

    /// Selects this kind's codec slot from a vtable.
    fn codec(vtable: &ComponentVtable) -> Option<&Arc<dyn HandleCodec<Self>>>;

    /// Encode the root.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Serialization`] on an unencodable tree.
    fn encode(&self) -> Result<Vec<u8>, SchemaError>;

    /// Decode a root for `component_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] on a malformed buffer.
    fn decode(component_id: ComponentId, bytes: &[u8]) -> Result<Self, SchemaError>;
}

macro_rules! schema_root {
    ($ty:ty, $kind:literal, $slot:ident) => {
        impl SchemaRoot for $ty {
            const KIND: &'static str = $kind;

            fn root_component_id(&self) -> ComponentId {
                ComponentId(self.component_id())
            }

            fn codec(vtable: &ComponentVtable) -> Option<&Arc<dyn HandleCodec<Self>>> {
                vtable.$slot.as_ref()
            }

            fn encode(&self) -> Result<Vec<u8>, SchemaError> {
                self.serialize()
            }

            fn decode(component_id: ComponentId, bytes: &[u8]) -> Result<Self, SchemaError> {
                <$ty>::deserialize(component_id.0, bytes)
            }
        }
    };
}

schema_root!(SchemaCommandRequest, "command request", command_request);
schema_root!(SchemaCommandResponse, "command response", command_response);
schema_root!(SchemaComponentData, "component data", component_data);
schema_root!(SchemaComponentUpdate, "component update", component_update);

/// Vtables keyed by component id, with an optional fallback.
#[derive(Debug, Clone, Default)]
pub struct VtableRegistry {
    vtables: BTreeMap<ComponentId, ComponentVtable>,
    default_vtable: Option<ComponentVtable>,
}

impl VtableRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `vtable` for `component_id`, returning any vtable it replaces.
    pub fn register(
        &mut self,
        component_id: ComponentId,
        vtable: ComponentVtable,
    ) -> Option<ComponentVtable> {
        self.vtables.insert(component_id, vtable)
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_vtable(mut self, component_id: ComponentId, vtable: ComponentVtable) -> Self {
        self.register(component_id, vtable);
        self
    }

    /// Set the vtable consulted for components without their own.
    pub fn set_default(&mut self, vtable: ComponentVtable) {
        self.default_vtable = Some(vtable);
    }

    /// Builder form of [`set_default`](Self::set_default).
    #[must_use]
    pub fn with_default(mut self, vtable: ComponentVtable) -> Self {
        self.set_default(vtable);
        self
    }

    /// The default vtable, if any.
    #[must_use]
    pub fn default_vtable(&self) -> Option<&ComponentVtable> {
        self.default_vtable.as_ref()
    }

    /// Component-specific vtables in ascending id order.
    pub fn vtables(&self) -> impl Iterator<Item = (ComponentId, &ComponentVtable)> {
        self.vtables.iter().map(|(id, vtable)| (*id, vtable))
    }

    /// Returns `true` if neither specific nor default vtables exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vtables.is_empty() && self.default_vtable.is_none()
    }

    /// The vtable for `component_id`, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`VtableError::NoVtable`] if neither exists.
    pub fn lookup(&self, component_id: ComponentId) -> Result<&ComponentVtable, VtableError> {
        self.vtables
            .get(&component_id)
            .or(self.default_vtable.as_ref())
            .ok_or(VtableError::NoVtable(component_id))
    }

    /// The `S` codec for `component_id`, if one is reachable.
    #[must_use]
    pub fn find_codec<S: SchemaRoot>(
        &self,
        component_id: ComponentId,
    ) -> Option<&Arc<dyn HandleCodec<S>>> {
        self.lookup(component_id).ok().and_then(S::codec)
    }

    /// The `S` codec for `component_id`.
    ///
    /// # Errors
    ///
    /// Returns [`VtableError::NoVtable`] or [`VtableError::MissingCodec`].
    pub fn codec<S: SchemaRoot>(
        &self,
        component_id: ComponentId,
    ) -> Result<&Arc<dyn HandleCodec<S>>, VtableError> {
        S::codec(self.lookup(component_id)?).ok_or(VtableError::MissingCodec {
            component_id,
            kind: S::KIND,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);

    fn health_codec() -> FnCodec<Health, SchemaComponentData> {
        FnCodec::new(
            |id, health: &Health| {
                let mut data = SchemaComponentData::new(id.0);
                data.fields_mut().add_int32(1, health.0);
                data
            },
            |data| Ok(Health(data.fields().get_int32(1))),
        )
    }

    #[test]
    fn test_fn_codec_roundtrip() {
        let codec = health_codec();
        let mut data = SchemaComponentData::new(1000);
        data.fields_mut().add_int32(1, 80);

        let handle = codec.deserialize(ComponentId(1000), &data).unwrap();
        assert_eq!(handle.downcast_ref::<Health>(), Some(&Health(80)));

        let copy = codec.copy(ComponentId(1000), handle.as_ref()).unwrap();
        let back = codec.serialize(ComponentId(1000), copy.as_ref()).unwrap();
        assert_eq!(back.component_id(), 1000);
        assert_eq!(back.fields().get_int32(1), 80);
    }

    #[test]
    fn test_fn_codec_rejects_wrong_handle_type() {
        let codec = health_codec();
        let wrong: UserHandle = Box::new("not health");
        let err = codec.serialize(ComponentId(1000), wrong.as_ref()).unwrap_err();
        assert!(matches!(err, VtableError::HandleType { .. }));
    }

    #[test]
    fn test_registry_falls_back_to_default() {
        let registry = VtableRegistry::new()
            .with_vtable(
                ComponentId(1),
                ComponentVtable::new().with_component_data(health_codec()),
            )
            .with_default(ComponentVtable::new());

        assert!(registry.codec::<SchemaComponentData>(ComponentId(1)).is_ok());
        // The default exists but has no data codec.
        assert_eq!(
            registry.codec::<SchemaComponentData>(ComponentId(2)).err(),
            Some(VtableError::MissingCodec {
                component_id: ComponentId(2),
                kind: "component data",
            })
        );
    }

    #[test]
    fn test_registry_without_default_fails() {
        let registry = VtableRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.lookup(ComponentId(5)).err(),
            Some(VtableError::NoVtable(ComponentId(5)))
        );
        assert!(registry.find_codec::<SchemaComponentUpdate>(ComponentId(5)).is_none());
    }

    #[test]
    fn test_vtable_debug_lists_present_codecs() {
        let vtable = ComponentVtable::new().with_component_data(health_codec());
        let debug = format!("{vtable:?}");
        assert!(debug.contains("component_data: true"));
        assert!(debug.contains("command_request: false"));
    }
}
