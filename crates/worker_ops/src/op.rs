//! Typed ops.
//!
//! Component payloads inside ops are [`ComponentRef`]s: schema data that
//! borrows the op list's vtable registry and so cannot outlive the list.
//! Keeping a payload past the next poll means [`acquiring`](ComponentRef::acquire)
//! an owned copy.

use std::collections::BTreeMap;

use worker_component::{
    ComponentId, ComponentValue, Entity, EntityId, RequestId, SchemaRoot, VtableError,
    VtableRegistry,
};
use worker_interop::{LogLevel, Metrics};
use worker_schema::{
    SchemaCommandRequest, SchemaCommandResponse, SchemaComponentData, SchemaComponentUpdate,
};

use crate::types::{Authority, ConnectionStatusCode, OpKind, StatusCode};

/// A component payload borrowed from an op list.
#[derive(Debug, Clone)]
pub struct ComponentRef<'a, S> {
    schema: S,
    vtables: &'a VtableRegistry,
}

impl<'a, S: SchemaRoot> ComponentRef<'a, S> {
    pub(crate) fn new(schema: S, vtables: &'a VtableRegistry) -> Self {
        Self { schema, vtables }
    }

    #[must_use]
    pub fn component_id(&self) -> ComponentId {
        self.schema.root_component_id()
    }

    /// The payload's schema data.
    #[must_use]
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// An owned copy that outlives the op list: a user handle when the
    /// component has a codec for this payload kind, schema data otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`VtableError`] if the registered codec rejects the data.
    pub fn acquire(&self) -> Result<ComponentValue<S>, VtableError> {
        let component_id = self.component_id();
        match self.vtables.find_codec::<S>(component_id) {
            Some(codec) => Ok(ComponentValue::from_user_handle(
                component_id,
                codec.deserialize(component_id, &self.schema)?,
            )),
            None => Ok(ComponentValue::from_schema(self.schema.clone())),
        }
    }
}

// ── Connection and worker ops ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectOp {
    pub connection_status_code: ConnectionStatusCode,
    pub reason: String,
}

/// A worker flag changed. `value` is `None` when the flag was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagUpdateOp {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessageOp {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOp {
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalSectionOp {
    pub in_critical_section: bool,
}

// ── Entity lifecycle ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddEntityOp {
    pub entity_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveEntityOp {
    pub entity_id: EntityId,
}

// ── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveEntityIdResponseOp {
    pub request_id: RequestId,
    pub status_code: StatusCode,
    pub message: String,
    /// Present only on success.
    pub entity_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveEntityIdsResponseOp {
    pub request_id: RequestId,
    pub status_code: StatusCode,
    pub message: String,
    /// Present only on success.
    pub first_entity_id: Option<EntityId>,
    pub number_of_entity_ids: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntityResponseOp {
    pub request_id: RequestId,
    pub status_code: StatusCode,
    pub message: String,
    /// Present only on success.
    pub entity_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntityResponseOp {
    pub request_id: RequestId,
    pub entity_id: EntityId,
    pub status_code: StatusCode,
    pub message: String,
}

/// Entities matched by an entity query. For a count query `result` is empty
/// and only `result_count` is set.
#[derive(Debug)]
pub struct EntityQueryResponseOp {
    pub request_id: RequestId,
    pub status_code: StatusCode,
    pub message: String,
    pub result_count: u32,
    pub result: BTreeMap<EntityId, Entity>,
}

// ── Component lifecycle ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AddComponentOp<'a> {
    pub entity_id: EntityId,
    pub data: ComponentRef<'a, SchemaComponentData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveComponentOp {
    pub entity_id: EntityId,
    pub component_id: ComponentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityChangeOp {
    pub entity_id: EntityId,
    pub component_id: ComponentId,
    pub authority: Authority,
}

#[derive(Debug, Clone)]
pub struct ComponentUpdateOp<'a> {
    pub entity_id: EntityId,
    pub update: ComponentRef<'a, SchemaComponentUpdate>,
}

// ── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CommandRequestOp<'a> {
    pub request_id: RequestId,
    pub entity_id: EntityId,
    pub timeout_millis: u32,
    pub caller_worker_id: String,
    pub caller_attribute_set: Vec<String>,
    pub request: ComponentRef<'a, SchemaCommandRequest>,
}

#[derive(Debug, Clone)]
pub struct CommandResponseOp<'a> {
    pub request_id: RequestId,
    pub entity_id: EntityId,
    pub status_code: StatusCode,
    pub message: String,
    /// Present only on success.
    pub response: Option<ComponentRef<'a, SchemaCommandResponse>>,
    pub command_index: u32,
}

/// Any op.
#[derive(Debug)]
pub enum Op<'a> {
    Disconnect(DisconnectOp),
    FlagUpdate(FlagUpdateOp),
    LogMessage(LogMessageOp),
    Metrics(MetricsOp),
    CriticalSection(CriticalSectionOp),
    AddEntity(AddEntityOp),
    RemoveEntity(RemoveEntityOp),
    ReserveEntityIdResponse(ReserveEntityIdResponseOp),
    ReserveEntityIdsResponse(ReserveEntityIdsResponseOp),
    CreateEntityResponse(CreateEntityResponseOp),
    DeleteEntityResponse(DeleteEntityResponseOp),
    EntityQueryResponse(EntityQueryResponseOp),
    AddComponent(AddComponentOp<'a>),
    RemoveComponent(RemoveComponentOp),
    AuthorityChange(AuthorityChangeOp),
    ComponentUpdate(ComponentUpdateOp<'a>),
    CommandRequest(CommandRequestOp<'a>),
    CommandResponse(CommandResponseOp<'a>),
}

impl Op<'_> {
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Disconnect(_) => OpKind::Disconnect,
            Self::FlagUpdate(_) => OpKind::FlagUpdate,
            Self::LogMessage(_) => OpKind::LogMessage,
            Self::Metrics(_) => OpKind::Metrics,
            Self::CriticalSection(_) => OpKind::CriticalSection,
            Self::AddEntity(_) => OpKind::AddEntity,
            Self::RemoveEntity(_) => OpKind::RemoveEntity,
            Self::ReserveEntityIdResponse(_) => OpKind::ReserveEntityIdResponse,
            Self::ReserveEntityIdsResponse(_) => OpKind::ReserveEntityIdsResponse,
            Self::CreateEntityResponse(_) => OpKind::CreateEntityResponse,
            Self::DeleteEntityResponse(_) => OpKind::DeleteEntityResponse,
            Self::EntityQueryResponse(_) => OpKind::EntityQueryResponse,
            Self::AddComponent(_) => OpKind::AddComponent,
            Self::RemoveComponent(_) => OpKind::RemoveComponent,
            Self::AuthorityChange(_) => OpKind::AuthorityChange,
            Self::ComponentUpdate(_) => OpKind::ComponentUpdate,
            Self::CommandRequest(_) => OpKind::CommandRequest,
            Self::CommandResponse(_) => OpKind::CommandResponse,
        }
    }
}
