//! Owned component payloads.
//!
//! A [`ComponentValue`] is either backed by schema data or by a user handle
//! produced by a vtable codec. The four aliases ([`ComponentData`],
//! [`ComponentUpdate`], [`CommandRequest`], [`CommandResponse`]) cover every
//! payload that crosses a connection.
//!
//! Values are move-only. Copying a handle goes through its codec
//! ([`ComponentValue::copy`]) and releasing a handle goes through the codec's
//! `free` ([`ComponentValue::release`]); dropping a value releases it
//! exactly once as well.

use std::any::Any;
use std::borrow::Cow;

use worker_schema::{
    SchemaCommandRequest, SchemaCommandResponse, SchemaComponentData, SchemaComponentUpdate,
};

use crate::component::ComponentId;
use crate::error::VtableError;
use crate::vtable::{SchemaRoot, UserHandle, VtableRegistry};

/// What backs a [`ComponentValue`].
pub enum Payload<S> {
    /// Schema data owned by the value.
    Schema(S),
    /// An opaque user value understood by the component's vtable.
    Handle(UserHandle),
}

/// A component payload of root kind `S`.
pub struct ComponentValue<S> {
    component_id: ComponentId,
    payload: Payload<S>,
}

/// Full component state.
pub type ComponentData = ComponentValue<SchemaComponentData>;
/// A partial component change.
pub type ComponentUpdate = ComponentValue<SchemaComponentUpdate>;
/// A command request payload.
pub type CommandRequest = ComponentValue<SchemaCommandRequest>;
/// A command response payload.
pub type CommandResponse = ComponentValue<SchemaCommandResponse>;

impl<S: SchemaRoot> ComponentValue<S> {
    /// Wrap schema data. The component id is taken from the root.
    #[must_use]
    pub fn from_schema(schema: S) -> Self {
        Self {
            component_id: schema.root_component_id(),
            payload: Payload::Schema(schema),
        }
    }

    /// Wrap a user value for `component_id`.
    #[must_use]
    pub fn from_handle<T: Any + Send>(component_id: ComponentId, value: T) -> Self {
        Self::from_user_handle(component_id, Box::new(value))
    }

    /// Wrap an already boxed user handle.
    #[must_use]
    pub fn from_user_handle(component_id: ComponentId, handle: UserHandle) -> Self {
        Self {
            component_id,
            payload: Payload::Handle(handle),
        }
    }

    /// The component this payload belongs to.
    #[must_use]
    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// The backing payload.
    #[must_use]
    pub fn payload(&self) -> &Payload<S> {
        &self.payload
    }

    /// Schema data, if the value is schema-backed.
    #[must_use]
    pub fn schema(&self) -> Option<&S> {
        match &self.payload {
            Payload::Schema(schema) => Some(schema),
            Payload::Handle(_) => None,
        }
    }

    /// Mutable schema data, if the value is schema-backed.
    pub fn schema_mut(&mut self) -> Option<&mut S> {
        match &mut self.payload {
            Payload::Schema(schema) => Some(schema),
            Payload::Handle(_) => None,
        }
    }

    /// The user handle, if the value is handle-backed.
    #[must_use]
    pub fn handle(&self) -> Option<&(dyn Any + Send)> {
        match &self.payload {
            Payload::Schema(_) => None,
            Payload::Handle(handle) => Some(handle.as_ref()),
        }
    }

    /// The user handle downcast to `T`.
    #[must_use]
    pub fn handle_as<T: Any>(&self) -> Option<&T> {
        self.handle().and_then(|handle| handle.downcast_ref::<T>())
    }

    /// Schema data for this value, serializing a user handle through its codec.
    ///
    /// # Errors
    ///
    /// Returns a [`VtableError`] if a handle has no reachable codec or the
    /// codec rejects it.
    pub fn to_schema(&self, vtables: &VtableRegistry) -> Result<Cow<'_, S>, VtableError> {
        match &self.payload {
            Payload::Schema(schema) => Ok(Cow::Borrowed(schema)),
            Payload::Handle(handle) => {
                let codec = vtables.codec::<S>(self.component_id)?;
                Ok(Cow::Owned(codec.serialize(self.component_id, handle.as_ref())?))
            }
        }
    }

    /// Convert a schema-backed value into a user handle through its codec.
    ///
    /// # Errors
    ///
    /// Returns a [`VtableError`] if no codec is reachable or it fails.
    pub fn into_handle(self, vtables: &VtableRegistry) -> Result<UserHandle, VtableError> {
        match self.payload {
            Payload::Handle(handle) => Ok(handle),
            Payload::Schema(schema) => {
                let codec = vtables.codec::<S>(self.component_id)?;
                codec.deserialize(self.component_id, &schema)
            }
        }
    }

    /// An independent copy of this value.
    ///
    /// # Errors
    ///
    /// Returns a [`VtableError`] if a handle has no reachable codec.
    pub fn copy(&self, vtables: &VtableRegistry) -> Result<Self, VtableError> {
        let payload = match &self.payload {
            Payload::Schema(schema) => Payload::Schema(schema.clone()),
            Payload::Handle(handle) => {
                let codec = vtables.codec::<S>(self.component_id)?;
                Payload::Handle(codec.copy(self.component_id, handle.as_ref())?)
            }
        };
        Ok(Self {
            component_id: self.component_id,
            payload,
        })
    }

    /// Release the value, routing a user handle through its codec's `free`.
    pub fn release(self, vtables: &VtableRegistry) {
        if let Payload::Handle(handle) = self.payload {
            match vtables.find_codec::<S>(self.component_id) {
                Some(codec) => codec.free(self.component_id, handle),
                None => drop(handle),
            }
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for ComponentValue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("ComponentValue");
        out.field("component_id", &self.component_id);
        match &self.payload {
            Payload::Schema(schema) => out.field("schema", schema),
            Payload::Handle(_) => out.field("handle", &"<user handle>"),
        };
        out.finish()
    }
}
