//! [`OpList`]: one decoded poll result.
//!
//! The batch envelope is decoded once; each op body is decoded when it is
//! read, so accessors are pure projections of the received bytes. An op
//! list borrows the vtable registry it was decoded with, which is what ties
//! it (and every [`ComponentRef`] read from it) to the poll that produced it.

use std::collections::BTreeMap;

use worker_component::{ComponentId, Entity, EntityId, RequestId, VtableRegistry};
use worker_interop::{LogLevel, from_utf8_cstr, unpack_utf8_cstr};
use worker_schema::{
    SchemaCommandRequest, SchemaCommandResponse, SchemaComponentData, SchemaComponentUpdate,
};

use crate::error::OpListError;
use crate::op::{
    AddComponentOp, AddEntityOp, AuthorityChangeOp, CommandRequestOp, CommandResponseOp,
    ComponentRef, ComponentUpdateOp, CreateEntityResponseOp, CriticalSectionOp,
    DeleteEntityResponseOp, DisconnectOp, EntityQueryResponseOp, FlagUpdateOp, LogMessageOp,
    MetricsOp, Op, RemoveComponentOp, RemoveEntityOp, ReserveEntityIdResponseOp,
    ReserveEntityIdsResponseOp,
};
use crate::raw::{
    OpBatch, RawAddComponent, RawAddEntity, RawAuthorityChange, RawCommandRequest,
    RawCommandResponse, RawComponentUpdate, RawCreateEntityResponse, RawCriticalSection,
    RawDeleteEntityResponse, RawDisconnect, RawEntityQueryResponse, RawFlagUpdate, RawLogMessage,
    RawMetrics, RawOp, RawRecord, RawRemoveComponent, RawRemoveEntity,
    RawReserveEntityIdResponse, RawReserveEntityIdsResponse,
};
use crate::types::{Authority, ConnectionStatusCode, OpKind, StatusCode};

/// The ops returned by one poll, in delivery order.
#[derive(Debug)]
pub struct OpList<'a> {
    batch: OpBatch,
    vtables: &'a VtableRegistry,
}

/// `Some(value)` only when the request succeeded.
fn on_success<T>(status_code: StatusCode, value: T) -> Option<T> {
    status_code.is_success().then_some(value)
}

impl<'a> OpList<'a> {
    /// Decode a MessagePack op batch.
    ///
    /// # Errors
    ///
    /// Returns [`OpListError::Decode`] if the envelope is malformed. Op bodies
    /// are checked when read.
    pub fn decode(bytes: &[u8], vtables: &'a VtableRegistry) -> Result<Self, OpListError> {
        Ok(Self::from_batch(OpBatch::decode(bytes)?, vtables))
    }

    #[must_use]
    pub fn from_batch(batch: OpBatch, vtables: &'a VtableRegistry) -> Self {
        Self { batch, vtables }
    }

    /// A list with no ops.
    #[must_use]
    pub fn empty(vtables: &'a VtableRegistry) -> Self {
        Self::from_batch(OpBatch::default(), vtables)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.batch.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    fn raw(&self, index: usize) -> Result<&RawOp, OpListError> {
        self.batch.ops.get(index).ok_or(OpListError::IndexOutOfRange {
            index,
            count: self.count(),
        })
    }

    /// The kind of op `index`.
    ///
    /// # Errors
    ///
    /// Returns [`OpListError::IndexOutOfRange`] outside `[0, count)` and
    /// [`OpListError::Interop`] for an unknown tag.
    pub fn kind_at(&self, index: usize) -> Result<OpKind, OpListError> {
        Ok(OpKind::try_from(self.raw(index)?.op_type)?)
    }

    fn record<R: RawRecord>(&self, index: usize) -> Result<R, OpListError> {
        let actual = self.kind_at(index)?;
        if actual != R::KIND {
            return Err(OpListError::KindMismatch {
                index,
                expected: R::KIND,
                actual,
            });
        }
        rmp_serde::from_slice(&self.raw(index)?.body)
            .map_err(|e| OpListError::Decode(format!("op {index} ({actual:?}): {e}")))
    }

    /// Op `index` as whichever kind it is.
    ///
    /// # Errors
    ///
    /// As [`kind_at`](Self::kind_at), plus whatever the kind's accessor
    /// reports.
    pub fn get(&self, index: usize) -> Result<Op<'a>, OpListError> {
        Ok(match self.kind_at(index)? {
            OpKind::Disconnect => Op::Disconnect(self.as_disconnect(index)?),
            OpKind::FlagUpdate => Op::FlagUpdate(self.as_flag_update(index)?),
            OpKind::LogMessage => Op::LogMessage(self.as_log_message(index)?),
            OpKind::Metrics => Op::Metrics(self.as_metrics(index)?),
            OpKind::CriticalSection => Op::CriticalSection(self.as_critical_section(index)?),
            OpKind::AddEntity => Op::AddEntity(self.as_add_entity(index)?),
            OpKind::RemoveEntity => Op::RemoveEntity(self.as_remove_entity(index)?),
            OpKind::ReserveEntityIdResponse => {
                Op::ReserveEntityIdResponse(self.as_reserve_entity_id_response(index)?)
            }
            OpKind::ReserveEntityIdsResponse => {
                Op::ReserveEntityIdsResponse(self.as_reserve_entity_ids_response(index)?)
            }
            OpKind::CreateEntityResponse => {
                Op::CreateEntityResponse(self.as_create_entity_response(index)?)
            }
            OpKind::DeleteEntityResponse => {
                Op::DeleteEntityResponse(self.as_delete_entity_response(index)?)
            }
            OpKind::EntityQueryResponse => {
                Op::EntityQueryResponse(self.as_entity_query_response(index)?)
            }
            OpKind::AddComponent => Op::AddComponent(self.as_add_component(index)?),
            OpKind::RemoveComponent => Op::RemoveComponent(self.as_remove_component(index)?),
            OpKind::AuthorityChange => Op::AuthorityChange(self.as_authority_change(index)?),
            OpKind::ComponentUpdate => Op::ComponentUpdate(self.as_component_update(index)?),
            OpKind::CommandRequest => Op::CommandRequest(self.as_command_request(index)?),
            OpKind::CommandResponse => Op::CommandResponse(self.as_command_response(index)?),
        })
    }

    /// Every op in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Op<'a>, OpListError>> + '_ {
        (0..self.count()).map(|index| self.get(index))
    }

    // ── Typed accessors ─────────────────────────────────────────────────────
    //
    // Each returns `KindMismatch` when op `index` is another kind.

    pub fn as_disconnect(&self, index: usize) -> Result<DisconnectOp, OpListError> {
        let raw: RawDisconnect = self.record(index)?;
        Ok(DisconnectOp {
            connection_status_code: ConnectionStatusCode::from_wire(raw.connection_status_code),
            reason: from_utf8_cstr(&raw.reason),
        })
    }

    pub fn as_flag_update(&self, index: usize) -> Result<FlagUpdateOp, OpListError> {
        let raw: RawFlagUpdate = self.record(index)?;
        Ok(FlagUpdateOp {
            name: from_utf8_cstr(&raw.name),
            value: raw.value.as_deref().map(from_utf8_cstr),
        })
    }

    pub fn as_log_message(&self, index: usize) -> Result<LogMessageOp, OpListError> {
        let raw: RawLogMessage = self.record(index)?;
        Ok(LogMessageOp {
            level: LogLevel::try_from(raw.level)?,
            message: from_utf8_cstr(&raw.message),
        })
    }

    pub fn as_metrics(&self, index: usize) -> Result<MetricsOp, OpListError> {
        let raw: RawMetrics = self.record(index)?;
        Ok(MetricsOp {
            metrics: raw.metrics.to_metrics(),
        })
    }

    pub fn as_critical_section(&self, index: usize) -> Result<CriticalSectionOp, OpListError> {
        let raw: RawCriticalSection = self.record(index)?;
        Ok(CriticalSectionOp {
            in_critical_section: raw.in_critical_section != 0,
        })
    }

    pub fn as_add_entity(&self, index: usize) -> Result<AddEntityOp, OpListError> {
        let raw: RawAddEntity = self.record(index)?;
        Ok(AddEntityOp {
            entity_id: EntityId(raw.entity_id),
        })
    }

    pub fn as_remove_entity(&self, index: usize) -> Result<RemoveEntityOp, OpListError> {
        let raw: RawRemoveEntity = self.record(index)?;
        Ok(RemoveEntityOp {
            entity_id: EntityId(raw.entity_id),
        })
    }

    pub fn as_reserve_entity_id_response(
        &self,
        index: usize,
    ) -> Result<ReserveEntityIdResponseOp, OpListError> {
        let raw: RawReserveEntityIdResponse = self.record(index)?;
        let status_code = StatusCode::from_wire(raw.status_code);
        Ok(ReserveEntityIdResponseOp {
            request_id: RequestId(raw.request_id),
            status_code,
            message: from_utf8_cstr(&raw.message),
            entity_id: on_success(status_code, EntityId(raw.entity_id)),
        })
    }

    pub fn as_reserve_entity_ids_response(
        &self,
        index: usize,
    ) -> Result<ReserveEntityIdsResponseOp, OpListError> {
        let raw: RawReserveEntityIdsResponse = self.record(index)?;
        let status_code = StatusCode::from_wire(raw.status_code);
        Ok(ReserveEntityIdsResponseOp {
            request_id: RequestId(raw.request_id),
            status_code,
            message: from_utf8_cstr(&raw.message),
            first_entity_id: on_success(status_code, EntityId(raw.first_entity_id)),
            number_of_entity_ids: raw.number_of_entity_ids,
        })
    }

    pub fn as_create_entity_response(
        &self,
        index: usize,
    ) -> Result<CreateEntityResponseOp, OpListError> {
        let raw: RawCreateEntityResponse = self.record(index)?;
        let status_code = StatusCode::from_wire(raw.status_code);
        Ok(CreateEntityResponseOp {
            request_id: RequestId(raw.request_id),
            status_code,
            message: from_utf8_cstr(&raw.message),
            entity_id: on_success(status_code, EntityId(raw.entity_id)),
        })
    }

    pub fn as_delete_entity_response(
        &self,
        index: usize,
    ) -> Result<DeleteEntityResponseOp, OpListError> {
        let raw: RawDeleteEntityResponse = self.record(index)?;
        Ok(DeleteEntityResponseOp {
            request_id: RequestId(raw.request_id),
            entity_id: EntityId(raw.entity_id),
            status_code: StatusCode::from_wire(raw.status_code),
            message: from_utf8_cstr(&raw.message),
        })
    }

    /// Result entities are acquired into owned [`Entity`] values.
    pub fn as_entity_query_response(
        &self,
        index: usize,
    ) -> Result<EntityQueryResponseOp, OpListError> {
        let raw: RawEntityQueryResponse = self.record(index)?;
        let mut result = BTreeMap::new();
        for raw_entity in &raw.results {
            let entity_id = EntityId(raw_entity.entity_id);
            let mut entity = Entity::new();
            for component in &raw_entity.components {
                let schema = component.decode::<SchemaComponentData>()?;
                let data = ComponentRef::new(schema, self.vtables).acquire()?;
                if let Err(duplicate) = entity.add(data) {
                    return Err(OpListError::Decode(format!(
                        "op {index}: {entity_id} has {} more than once",
                        duplicate.component_id()
                    )));
                }
            }
            result.insert(entity_id, entity);
        }
        Ok(EntityQueryResponseOp {
            request_id: RequestId(raw.request_id),
            status_code: StatusCode::from_wire(raw.status_code),
            message: from_utf8_cstr(&raw.message),
            result_count: raw.result_count,
            result,
        })
    }

    pub fn as_add_component(&self, index: usize) -> Result<AddComponentOp<'a>, OpListError> {
        let raw: RawAddComponent = self.record(index)?;
        Ok(AddComponentOp {
            entity_id: EntityId(raw.entity_id),
            data: ComponentRef::new(raw.data.decode::<SchemaComponentData>()?, self.vtables),
        })
    }

    pub fn as_remove_component(&self, index: usize) -> Result<RemoveComponentOp, OpListError> {
        let raw: RawRemoveComponent = self.record(index)?;
        Ok(RemoveComponentOp {
            entity_id: EntityId(raw.entity_id),
            component_id: ComponentId(raw.component_id),
        })
    }

    pub fn as_authority_change(&self, index: usize) -> Result<AuthorityChangeOp, OpListError> {
        let raw: RawAuthorityChange = self.record(index)?;
        Ok(AuthorityChangeOp {
            entity_id: EntityId(raw.entity_id),
            component_id: ComponentId(raw.component_id),
            authority: Authority::try_from(raw.authority)?,
        })
    }

    pub fn as_component_update(&self, index: usize) -> Result<ComponentUpdateOp<'a>, OpListError> {
        let raw: RawComponentUpdate = self.record(index)?;
        Ok(ComponentUpdateOp {
            entity_id: EntityId(raw.entity_id),
            update: ComponentRef::new(raw.update.decode::<SchemaComponentUpdate>()?, self.vtables),
        })
    }

    pub fn as_command_request(&self, index: usize) -> Result<CommandRequestOp<'a>, OpListError> {
        let raw: RawCommandRequest = self.record(index)?;
        Ok(CommandRequestOp {
            request_id: RequestId(raw.request_id),
            entity_id: EntityId(raw.entity_id),
            timeout_millis: raw.timeout_millis,
            caller_worker_id: from_utf8_cstr(&raw.caller_worker_id),
            caller_attribute_set: unpack_utf8_cstr(&raw.caller_attribute_set),
            request: ComponentRef::new(raw.request.decode::<SchemaCommandRequest>()?, self.vtables),
        })
    }

    pub fn as_command_response(&self, index: usize) -> Result<CommandResponseOp<'a>, OpListError> {
        let raw: RawCommandResponse = self.record(index)?;
        let status_code = StatusCode::from_wire(raw.status_code);
        let response = match raw.response.filter(|_| status_code.is_success()) {
            Some(payload) => Some(ComponentRef::new(
                payload.decode::<SchemaCommandResponse>()?,
                self.vtables,
            )),
            None => None,
        };
        Ok(CommandResponseOp {
            request_id: RequestId(raw.request_id),
            entity_id: EntityId(raw.entity_id),
            status_code,
            message: from_utf8_cstr(&raw.message),
            response,
            command_index: raw.command_index,
        })
    }
}
