//! Op batches as they travel from the runtime.
//!
//! A batch is the MessagePack of [`OpBatch`]: a list of [`RawOp`]s, each a
//! kind tag plus the MessagePack of that kind's record. Strings in records
//! are NUL-terminated UTF-8; component payloads are serialized schema roots.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use worker_component::{ComponentId, EntityId, RequestId, SchemaRoot};
use worker_interop::{
    LogLevel, Metrics, MetricsAbi, PackedStrings, SchemaPayloadAbi, to_packed_utf8_cstr,
    to_utf8_cstr, with_metrics,
};
use worker_schema::SchemaError;

use crate::error::OpListError;
use crate::types::{Authority, ConnectionStatusCode, OpKind, StatusCode};

/// One tagged op record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOp {
    pub op_type: u8,
    pub body: Vec<u8>,
}

/// Ops returned by one poll, in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpBatch {
    pub ops: Vec<RawOp>,
}

impl OpBatch {
    /// Encode as MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`OpListError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, OpListError> {
        rmp_serde::to_vec(self).map_err(|e| OpListError::Encode(e.to_string()))
    }

    /// Decode from MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`OpListError::Decode`] if the bytes are not a batch.
    pub fn decode(bytes: &[u8]) -> Result<Self, OpListError> {
        rmp_serde::from_slice(bytes).map_err(|e| OpListError::Decode(e.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A record that forms the body of one op kind.
pub trait RawRecord: Serialize + DeserializeOwned {
    const KIND: OpKind;
}

/// Serialize a schema root into a record payload.
///
/// # Errors
///
/// Returns [`SchemaError::Serialization`] for an unencodable tree.
pub fn payload<S: SchemaRoot>(schema: &S) -> Result<SchemaPayloadAbi<'static>, SchemaError> {
    Ok(SchemaPayloadAbi {
        component_id: schema.root_component_id().0,
        schema: schema.encode()?.into(),
    })
}

// ── Records ─────────────────────────────────────────────────────────────────

macro_rules! raw_record {
    ($(#[$meta:meta])* $name:ident => $kind:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl RawRecord for $name {
            const KIND: OpKind = OpKind::$kind;
        }
    };
}

raw_record!(RawDisconnect => Disconnect {
    connection_status_code: u8,
    reason: Vec<u8>,
});

raw_record!(
    /// `value` is `None` when the flag was removed.
    RawFlagUpdate => FlagUpdate {
        name: Vec<u8>,
        value: Option<Vec<u8>>,
    }
);

raw_record!(RawLogMessage => LogMessage {
    level: u8,
    message: Vec<u8>,
});

raw_record!(RawMetrics => Metrics {
    metrics: MetricsAbi<'static>,
});

raw_record!(RawCriticalSection => CriticalSection {
    in_critical_section: u8,
});

raw_record!(RawAddEntity => AddEntity { entity_id: i64 });

raw_record!(RawRemoveEntity => RemoveEntity { entity_id: i64 });

raw_record!(
    /// `entity_id` is only meaningful when the status is success.
    RawReserveEntityIdResponse => ReserveEntityIdResponse {
        request_id: u32,
        status_code: u8,
        message: Vec<u8>,
        entity_id: i64,
    }
);

raw_record!(RawReserveEntityIdsResponse => ReserveEntityIdsResponse {
    request_id: u32,
    status_code: u8,
    message: Vec<u8>,
    first_entity_id: i64,
    number_of_entity_ids: u32,
});

raw_record!(RawCreateEntityResponse => CreateEntityResponse {
    request_id: u32,
    status_code: u8,
    message: Vec<u8>,
    entity_id: i64,
});

raw_record!(RawDeleteEntityResponse => DeleteEntityResponse {
    request_id: u32,
    entity_id: i64,
    status_code: u8,
    message: Vec<u8>,
});

/// One entity in a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    pub entity_id: i64,
    pub components: Vec<SchemaPayloadAbi<'static>>,
}

raw_record!(RawEntityQueryResponse => EntityQueryResponse {
    request_id: u32,
    status_code: u8,
    message: Vec<u8>,
    result_count: u32,
    results: Vec<RawEntity>,
});

raw_record!(RawAddComponent => AddComponent {
    entity_id: i64,
    data: SchemaPayloadAbi<'static>,
});

raw_record!(RawRemoveComponent => RemoveComponent {
    entity_id: i64,
    component_id: u32,
});

raw_record!(RawAuthorityChange => AuthorityChange {
    entity_id: i64,
    component_id: u32,
    authority: u8,
});

raw_record!(RawComponentUpdate => ComponentUpdate {
    entity_id: i64,
    update: SchemaPayloadAbi<'static>,
});

raw_record!(RawCommandRequest => CommandRequest {
    request_id: u32,
    entity_id: i64,
    timeout_millis: u32,
    caller_worker_id: Vec<u8>,
    caller_attribute_set: PackedStrings<'static>,
    request: SchemaPayloadAbi<'static>,
});

raw_record!(RawCommandResponse => CommandResponse {
    request_id: u32,
    entity_id: i64,
    status_code: u8,
    message: Vec<u8>,
    response: Option<SchemaPayloadAbi<'static>>,
    command_index: u32,
});

// ── Builder ─────────────────────────────────────────────────────────────────

/// Assembles an [`OpBatch`]. Used by in-process backends and tests to play
/// the runtime's side.
#[derive(Debug, Default)]
pub struct OpBatchBuilder {
    batch: OpBatch,
}

fn cstr(s: &str) -> Vec<u8> {
    to_utf8_cstr(s, true)
}

impl OpBatchBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any record.
    ///
    /// # Errors
    ///
    /// Returns [`OpListError::Encode`] if the record cannot be serialized.
    pub fn push<R: RawRecord>(&mut self, record: &R) -> Result<&mut Self, OpListError> {
        let body = rmp_serde::to_vec(record).map_err(|e| OpListError::Encode(e.to_string()))?;
        self.batch.ops.push(RawOp {
            op_type: R::KIND.code(),
            body,
        });
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn disconnect(
        &mut self,
        code: ConnectionStatusCode,
        reason: &str,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawDisconnect {
            connection_status_code: code.code(),
            reason: cstr(reason),
        })
    }

    /// A flag set to `value`, or removed when `value` is `None`.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn flag_update(&mut self, name: &str, value: Option<&str>) -> Result<&mut Self, OpListError> {
        self.push(&RawFlagUpdate {
            name: cstr(name),
            value: value.map(cstr),
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn log_message(&mut self, level: LogLevel, message: &str) -> Result<&mut Self, OpListError> {
        self.push(&RawLogMessage {
            level: level.code(),
            message: cstr(message),
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn metrics(&mut self, metrics: &Metrics) -> Result<&mut Self, OpListError> {
        let abi = with_metrics(metrics, |abi| MetricsAbi {
            load: abi.load,
            gauge_names: abi.gauge_names.clone().into_owned(),
            gauge_values: abi.gauge_values.clone(),
            histogram_names: abi.histogram_names.clone().into_owned(),
            histogram_sums: abi.histogram_sums.clone(),
            bucket_offsets: abi.bucket_offsets.clone(),
            buckets: abi.buckets.clone(),
        });
        self.push(&RawMetrics { metrics: abi })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn critical_section(&mut self, in_critical_section: bool) -> Result<&mut Self, OpListError> {
        self.push(&RawCriticalSection {
            in_critical_section: u8::from(in_critical_section),
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn add_entity(&mut self, entity_id: EntityId) -> Result<&mut Self, OpListError> {
        self.push(&RawAddEntity {
            entity_id: entity_id.0,
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn remove_entity(&mut self, entity_id: EntityId) -> Result<&mut Self, OpListError> {
        self.push(&RawRemoveEntity {
            entity_id: entity_id.0,
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn add_component<S: SchemaRoot>(
        &mut self,
        entity_id: EntityId,
        data: &S,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawAddComponent {
            entity_id: entity_id.0,
            data: payload(data)?,
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn remove_component(
        &mut self,
        entity_id: EntityId,
        component_id: ComponentId,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawRemoveComponent {
            entity_id: entity_id.0,
            component_id: component_id.0,
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn authority_change(
        &mut self,
        entity_id: EntityId,
        component_id: ComponentId,
        authority: Authority,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawAuthorityChange {
            entity_id: entity_id.0,
            component_id: component_id.0,
            authority: authority.code(),
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn component_update<S: SchemaRoot>(
        &mut self,
        entity_id: EntityId,
        update: &S,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawComponentUpdate {
            entity_id: entity_id.0,
            update: payload(update)?,
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn create_entity_response(
        &mut self,
        request_id: RequestId,
        status_code: StatusCode,
        message: &str,
        entity_id: EntityId,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawCreateEntityResponse {
            request_id: request_id.0,
            status_code: status_code.code(),
            message: cstr(message),
            entity_id: entity_id.0,
        })
    }

    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn command_request<S: SchemaRoot>(
        &mut self,
        request_id: RequestId,
        entity_id: EntityId,
        caller_worker_id: &str,
        caller_attribute_set: &[&str],
        request: &S,
    ) -> Result<&mut Self, OpListError> {
        self.push(&RawCommandRequest {
            request_id: request_id.0,
            entity_id: entity_id.0,
            timeout_millis: 0,
            caller_worker_id: cstr(caller_worker_id),
            caller_attribute_set: to_packed_utf8_cstr(caller_attribute_set, true),
            request: payload(request)?,
        })
    }

    /// The batch assembled so far.
    #[must_use]
    pub fn build(&mut self) -> OpBatch {
        std::mem::take(&mut self.batch)
    }

    /// Build and encode in one step.
    ///
    /// # Errors
    ///
    /// See [`OpBatch::encode`].
    pub fn encode(&mut self) -> Result<Vec<u8>, OpListError> {
        self.build().encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_tags_each_op() {
        let batch = OpBatchBuilder::new()
            .add_entity(EntityId(1))
            .unwrap()
            .remove_entity(EntityId(1))
            .unwrap()
            .build();
        let tags: Vec<u8> = batch.ops.iter().map(|op| op.op_type).collect();
        assert_eq!(tags, vec![6, 7]);
    }

    #[test]
    fn test_build_resets_builder() {
        let mut builder = OpBatchBuilder::new();
        builder.critical_section(true).unwrap();
        assert_eq!(builder.build().len(), 1);
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_batch_decode_rejects_garbage() {
        assert!(matches!(OpBatch::decode(&[0xc1]), Err(OpListError::Decode(_))));
    }
}
