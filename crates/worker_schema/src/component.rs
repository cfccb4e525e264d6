//! Schema roots.
//!
//! Every [`SchemaObject`] belongs to exactly one root: component data, a
//! component update, a command request or a command response. The root owns
//! the object tree and is what travels over the wire.

use crate::error::SchemaError;
use crate::object::{FieldId, SchemaObject};

// Field layout of the root envelopes.
const UPDATE_FIELDS: FieldId = 1;
const UPDATE_EVENTS: FieldId = 2;
const UPDATE_CLEARED: FieldId = 3;
const COMMAND_INDEX: FieldId = 1;
const COMMAND_OBJECT: FieldId = 2;

/// The full state of one component.
#[derive(Debug, Clone, Default)]
pub struct SchemaComponentData {
    component_id: u32,
    fields: SchemaObject,
}

impl SchemaComponentData {
    /// Create empty data for `component_id`.
    #[must_use]
    pub fn new(component_id: u32) -> Self {
        Self {
            component_id,
            fields: SchemaObject::new(),
        }
    }

    /// The component this data belongs to.
    #[must_use]
    pub fn component_id(&self) -> u32 {
        self.component_id
    }

    /// The component's fields.
    #[must_use]
    pub fn fields(&self) -> &SchemaObject {
        &self.fields
    }

    /// Mutable access to the component's fields.
    pub fn fields_mut(&mut self) -> &mut SchemaObject {
        &mut self.fields
    }

    /// Encode the fields object.
    ///
    /// # Errors
    ///
    /// See [`SchemaObject::serialize`].
    pub fn serialize(&self) -> Result<Vec<u8>, SchemaError> {
        self.fields.serialize()
    }

    /// Decode data for `component_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] on a malformed buffer.
    pub fn deserialize(component_id: u32, buffer: &[u8]) -> Result<Self, SchemaError> {
        Ok(Self {
            component_id,
            fields: SchemaObject::from_buffer(buffer)?,
        })
    }
}

/// A partial change to one component: changed fields, triggered events and
/// list/map fields that were cleared.
#[derive(Debug, Clone, Default)]
pub struct SchemaComponentUpdate {
    component_id: u32,
    fields: SchemaObject,
    events: SchemaObject,
    cleared_fields: Vec<FieldId>,
}

impl SchemaComponentUpdate {
    /// Create an empty update for `component_id`.
    #[must_use]
    pub fn new(component_id: u32) -> Self {
        Self {
            component_id,
            ..Self::default()
        }
    }

    /// The component this update applies to.
    #[must_use]
    pub fn component_id(&self) -> u32 {
        self.component_id
    }

    /// Changed fields.
    #[must_use]
    pub fn fields(&self) -> &SchemaObject {
        &self.fields
    }

    /// Mutable access to the changed fields.
    pub fn fields_mut(&mut self) -> &mut SchemaObject {
        &mut self.fields
    }

    /// Triggered events.
    #[must_use]
    pub fn events(&self) -> &SchemaObject {
        &self.events
    }

    /// Mutable access to the triggered events.
    pub fn events_mut(&mut self) -> &mut SchemaObject {
        &mut self.events
    }

    /// Mark a list or map field as cleared. Duplicate ids are ignored.
    pub fn add_cleared_field(&mut self, field_id: FieldId) {
        if !self.cleared_fields.contains(&field_id) {
            self.cleared_fields.push(field_id);
        }
    }

    /// Fields marked as cleared, in the order they were added.
    #[must_use]
    pub fn cleared_fields(&self) -> &[FieldId] {
        &self.cleared_fields
    }

    /// Encode the update envelope.
    ///
    /// # Errors
    ///
    /// See [`SchemaObject::serialize`].
    pub fn serialize(&self) -> Result<Vec<u8>, SchemaError> {
        let mut envelope = SchemaObject::new();
        *envelope.add_object(UPDATE_FIELDS) = self.fields.clone();
        *envelope.add_object(UPDATE_EVENTS) = self.events.clone();
        envelope.add_uint32_list(UPDATE_CLEARED, &self.cleared_fields);
        envelope.serialize()
    }

    /// Decode an update envelope for `component_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] on a malformed buffer.
    pub fn deserialize(component_id: u32, buffer: &[u8]) -> Result<Self, SchemaError> {
        let envelope = SchemaObject::from_buffer(buffer)?;
        Ok(Self {
            component_id,
            fields: envelope.get_object(UPDATE_FIELDS)?.clone(),
            events: envelope.get_object(UPDATE_EVENTS)?.clone(),
            cleared_fields: envelope.get_uint32_list(UPDATE_CLEARED),
        })
    }
}

macro_rules! command_root {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            component_id: u32,
            command_index: u32,
            object: SchemaObject,
        }

        impl $name {
            /// Create an empty payload for command `command_index` of `component_id`.
            #[must_use]
            pub fn new(component_id: u32, command_index: u32) -> Self {
                Self {
                    component_id,
                    command_index,
                    object: SchemaObject::new(),
                }
            }

            /// The component that declares the command.
            #[must_use]
            pub fn component_id(&self) -> u32 {
                self.component_id
            }

            /// The command's index within its component.
            #[must_use]
            pub fn command_index(&self) -> u32 {
                self.command_index
            }

            /// The payload object.
            #[must_use]
            pub fn object(&self) -> &SchemaObject {
                &self.object
            }

            /// Mutable access to the payload object.
            pub fn object_mut(&mut self) -> &mut SchemaObject {
                &mut self.object
            }

            /// Encode the command index and payload.
            ///
            /// # Errors
            ///
            /// See [`SchemaObject::serialize`].
            pub fn serialize(&self) -> Result<Vec<u8>, SchemaError> {
                let mut envelope = SchemaObject::new();
                envelope.add_uint32(COMMAND_INDEX, self.command_index);
                *envelope.add_object(COMMAND_OBJECT) = self.object.clone();
                envelope.serialize()
            }

            /// Decode a payload for `component_id`.
            ///
            /// # Errors
            ///
            /// Returns [`SchemaError::Deserialization`] on a malformed buffer.
            pub fn deserialize(component_id: u32, buffer: &[u8]) -> Result<Self, SchemaError> {
                let envelope = SchemaObject::from_buffer(buffer)?;
                Ok(Self {
                    component_id,
                    command_index: envelope.get_uint32(COMMAND_INDEX),
                    object: envelope.get_object(COMMAND_OBJECT)?.clone(),
                })
            }
        }
    };
}

command_root!(
    /// The payload of an outgoing or incoming command request.
    SchemaCommandRequest
);
command_root!(
    /// The payload of a command response.
    SchemaCommandResponse
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_data_roundtrip() {
        let mut data = SchemaComponentData::new(54);
        data.fields_mut().add_double(1, 10.0);
        let bytes = data.serialize().unwrap();
        let restored = SchemaComponentData::deserialize(54, &bytes).unwrap();
        assert_eq!(restored.component_id(), 54);
        assert_eq!(restored.fields().get_double(1), 10.0);
    }

    #[test]
    fn test_update_keeps_events_and_cleared_fields() {
        let mut update = SchemaComponentUpdate::new(1001);
        update.fields_mut().add_int32(2, 5);
        update.events_mut().add_object(1).add_string(1, "boom");
        update.add_cleared_field(4);
        update.add_cleared_field(4);
        update.add_cleared_field(3);

        let restored =
            SchemaComponentUpdate::deserialize(1001, &update.serialize().unwrap()).unwrap();
        assert_eq!(restored.fields().get_int32(2), 5);
        assert_eq!(
            restored.events().get_object(1).unwrap().get_string(1),
            "boom"
        );
        assert_eq!(restored.cleared_fields(), &[4, 3]);
    }

    #[test]
    fn test_command_request_roundtrip() {
        let mut request = SchemaCommandRequest::new(1002, 3);
        request.object_mut().add_entity_id(1, 77);
        let restored =
            SchemaCommandRequest::deserialize(1002, &request.serialize().unwrap()).unwrap();
        assert_eq!(restored.command_index(), 3);
        assert_eq!(restored.object().get_entity_id(1), 77);
    }

    #[test]
    fn test_command_response_rejects_truncated_buffer() {
        let response = SchemaCommandResponse::new(1002, 1);
        let mut bytes = response.serialize().unwrap();
        bytes.push(0x12);
        assert!(SchemaCommandResponse::deserialize(1002, &bytes).is_err());
    }
}
