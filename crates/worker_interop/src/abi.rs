//! Wire structs handed across the runtime boundary.
//!
//! These are flat, pointer-free mirrors of the caller-facing types: strings
//! are NUL-terminated UTF-8, booleans are bytes, enums are their codes and
//! component payloads are serialized schema roots. Buffers are held as
//! [`Cow`] so a struct built by one of the [`convert`](crate::convert)
//! scopes cannot outlive the values it was built from. Everything
//! serializes with MessagePack.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use worker_component::{ComponentId, EntityId, RequestId, SchemaRoot};
use worker_query::FlatEntityQuery;
use worker_schema::SchemaError;

use crate::cstr::{PackedStrings, from_utf8_cstr, unpack_utf8_cstr};
use crate::metrics::{HistogramBucket, HistogramMetric, Metrics};

// ── Connection parameters ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcpParametersAbi {
    pub fast_retransmission: u8,
    pub early_retransmission: u8,
    pub non_concessional_flow_control: u8,
    pub multiplex_level: u32,
    pub update_interval_millis: u32,
    pub min_rto_millis: u32,
    pub window_size: u32,
    pub enable_erasure_codec: u8,
    pub erasure_original_packet_count: u8,
    pub erasure_recovery_packet_count: u8,
    pub erasure_window_size: u8,
    pub heartbeat_interval_millis: u64,
    pub heartbeat_timeout_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParametersAbi {
    pub use_external_ip: u8,
    pub connection_type: u8,
    pub raknet_heartbeat_timeout_millis: u32,
    pub tcp_multiplex_level: u8,
    pub tcp_send_buffer_size: u32,
    pub tcp_receive_buffer_size: u32,
    pub tcp_no_delay: u8,
    pub kcp: KcpParametersAbi,
    pub connection_timeout_millis: u64,
    pub default_command_timeout_millis: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolLoggingAbi<'a> {
    pub log_prefix: Cow<'a, [u8]>,
    pub max_log_files: u32,
    pub max_log_file_size_bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadAffinityAbi {
    pub receive_threads_affinity_mask: u64,
    pub send_threads_affinity_mask: u64,
    pub temporary_threads_affinity_mask: u64,
}

/// Bits of [`VtableAbi::slots`].
pub mod slots {
    pub const COMMAND_REQUEST: u16 = 1;
    pub const COMMAND_RESPONSE: u16 = 1 << 1;
    pub const COMPONENT_DATA: u16 = 1 << 2;
    pub const COMPONENT_UPDATE: u16 = 1 << 3;
}

/// One registered vtable: the callback handle and which codecs it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtableAbi {
    /// Zero for the default vtable.
    pub component_id: u32,
    /// The raw [`CallbackHandle`](crate::CallbackHandle) value.
    pub user_data: u64,
    pub slots: u16,
}

impl VtableAbi {
    #[must_use]
    pub fn has_slot(&self, slot: u16) -> bool {
        self.slots & slot != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParametersAbi<'a> {
    pub worker_type: Cow<'a, [u8]>,
    pub network: NetworkParametersAbi,
    pub send_queue_capacity: u32,
    pub receive_queue_capacity: u32,
    pub log_message_queue_capacity: u32,
    pub builtin_metrics_report_period_millis: u32,
    pub protocol_logging: ProtocolLoggingAbi<'a>,
    pub enable_protocol_logging_at_startup: u8,
    pub thread_affinity: ThreadAffinityAbi,
    pub component_vtables: Vec<VtableAbi>,
    pub default_vtable: Option<VtableAbi>,
}

impl ConnectionParametersAbi<'_> {
    /// The worker type as text.
    #[must_use]
    pub fn worker_type(&self) -> String {
        from_utf8_cstr(&self.worker_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotParametersAbi {
    pub component_vtables: Vec<VtableAbi>,
    pub default_vtable: Option<VtableAbi>,
}

// ── Payloads ────────────────────────────────────────────────────────────────

/// A serialized schema root for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPayloadAbi<'a> {
    pub component_id: u32,
    pub schema: Cow<'a, [u8]>,
}

impl SchemaPayloadAbi<'_> {
    /// Decode the payload as root kind `S`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] on a malformed buffer.
    pub fn decode<S: SchemaRoot>(&self) -> Result<S, SchemaError> {
        S::decode(ComponentId(self.component_id), &self.schema)
    }

    #[must_use]
    pub fn into_owned(self) -> SchemaPayloadAbi<'static> {
        SchemaPayloadAbi {
            component_id: self.component_id,
            schema: Cow::Owned(self.schema.into_owned()),
        }
    }
}

/// The components of one entity, in ascending component id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAbi<'a> {
    pub components: Vec<SchemaPayloadAbi<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessageAbi<'a> {
    pub level: u8,
    pub logger_name: Cow<'a, [u8]>,
    pub message: Cow<'a, [u8]>,
    pub entity_id: Option<i64>,
}

/// Metrics with their names packed into shared string buffers.
///
/// Histogram `i` owns `buckets[bucket_offsets[i]..bucket_offsets[i + 1]]`
/// (the last histogram runs to the end).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsAbi<'a> {
    pub load: Option<f64>,
    pub gauge_names: PackedStrings<'a>,
    pub gauge_values: Vec<f64>,
    pub histogram_names: PackedStrings<'a>,
    pub histogram_sums: Vec<f64>,
    pub bucket_offsets: Vec<u32>,
    pub buckets: Vec<HistogramBucket>,
}

impl MetricsAbi<'_> {
    /// Rebuild caller-facing metrics. Entries with missing values or
    /// out-of-range bucket offsets are skipped.
    #[must_use]
    pub fn to_metrics(&self) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.load = self.load;
        for (name, value) in unpack_utf8_cstr(&self.gauge_names)
            .into_iter()
            .zip(&self.gauge_values)
        {
            metrics.gauge_metrics.insert(name, *value);
        }
        for (i, name) in unpack_utf8_cstr(&self.histogram_names).into_iter().enumerate() {
            let (Some(sum), Some(start)) = (self.histogram_sums.get(i), self.bucket_offsets.get(i))
            else {
                continue;
            };
            let end = self
                .bucket_offsets
                .get(i + 1)
                .map_or(self.buckets.len(), |end| *end as usize);
            let Some(buckets) = self.buckets.get(*start as usize..end) else {
                continue;
            };
            metrics
                .histogram_metrics
                .insert(name, HistogramMetric::from_parts(buckets.to_vec(), *sum));
        }
        metrics
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestOverrideAbi {
    pub component_id: u32,
    pub is_interested: u8,
}

// ── Worker messages ─────────────────────────────────────────────────────────

/// Everything a worker sends to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerMessage<'a> {
    Handshake {
        worker_id: Cow<'a, [u8]>,
        parameters: ConnectionParametersAbi<'a>,
    },
    LogMessage(LogMessageAbi<'a>),
    Metrics(MetricsAbi<'a>),
    ReserveEntityIdsRequest {
        request_id: RequestId,
        number_of_entity_ids: u32,
        timeout_millis: Option<u32>,
    },
    CreateEntityRequest {
        request_id: RequestId,
        entity: EntityAbi<'a>,
        entity_id: Option<EntityId>,
        timeout_millis: Option<u32>,
    },
    DeleteEntityRequest {
        request_id: RequestId,
        entity_id: EntityId,
        timeout_millis: Option<u32>,
    },
    EntityQueryRequest {
        request_id: RequestId,
        query: FlatEntityQuery,
        timeout_millis: Option<u32>,
    },
    ComponentUpdate {
        entity_id: EntityId,
        update: SchemaPayloadAbi<'a>,
        loopback: u8,
    },
    ComponentInterest {
        entity_id: EntityId,
        overrides: Vec<InterestOverrideAbi>,
    },
    CommandRequest {
        request_id: RequestId,
        entity_id: EntityId,
        request: SchemaPayloadAbi<'a>,
        timeout_millis: Option<u32>,
        allow_short_circuiting: u8,
    },
    CommandResponse {
        request_id: RequestId,
        response: SchemaPayloadAbi<'a>,
    },
    CommandFailure {
        request_id: RequestId,
        message: Cow<'a, [u8]>,
    },
    AuthorityLossImminentAck {
        entity_id: EntityId,
        component_id: ComponentId,
    },
    SetProtocolLogging {
        enabled: u8,
    },
}

impl WorkerMessage<'_> {
    /// The last subject token this message is published under.
    #[must_use]
    pub fn subject_suffix(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "handshake",
            Self::LogMessage(_) => "log",
            Self::Metrics(_) => "metrics",
            Self::ReserveEntityIdsRequest { .. } => "reserve_entity_ids",
            Self::CreateEntityRequest { .. } => "create_entity",
            Self::DeleteEntityRequest { .. } => "delete_entity",
            Self::EntityQueryRequest { .. } => "entity_query",
            Self::ComponentUpdate { .. } => "component_update",
            Self::ComponentInterest { .. } => "component_interest",
            Self::CommandRequest { .. } => "command_request",
            Self::CommandResponse { .. } => "command_response",
            Self::CommandFailure { .. } => "command_failure",
            Self::AuthorityLossImminentAck { .. } => "authority_loss_imminent_ack",
            Self::SetProtocolLogging { .. } => "protocol_logging",
        }
    }

    /// The request id, for messages that expect a response op.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::ReserveEntityIdsRequest { request_id, .. }
            | Self::CreateEntityRequest { request_id, .. }
            | Self::DeleteEntityRequest { request_id, .. }
            | Self::EntityQueryRequest { request_id, .. }
            | Self::CommandRequest { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cstr::to_packed_utf8_cstr;

    #[test]
    fn test_vtable_slots() {
        let vtable = VtableAbi {
            component_id: 54,
            user_data: 1,
            slots: slots::COMPONENT_DATA | slots::COMPONENT_UPDATE,
        };
        assert!(vtable.has_slot(slots::COMPONENT_DATA));
        assert!(!vtable.has_slot(slots::COMMAND_REQUEST));
    }

    #[test]
    fn test_metrics_abi_skips_bad_offsets() {
        let abi = MetricsAbi {
            load: None,
            gauge_names: to_packed_utf8_cstr(&["a", "b"], true),
            gauge_values: vec![1.0],
            histogram_names: to_packed_utf8_cstr(&["ok", "broken"], true),
            histogram_sums: vec![2.0, 3.0],
            bucket_offsets: vec![0],
            buckets: vec![HistogramBucket {
                upper_bound: f64::INFINITY,
                samples: 1,
            }],
        };
        let metrics = abi.to_metrics();
        assert_eq!(metrics.gauge_metrics.len(), 1);
        assert_eq!(metrics.gauge_metrics["a"], 1.0);
        assert_eq!(metrics.histogram_metrics.len(), 1);
        assert_eq!(metrics.histogram_metrics["ok"].sum(), 2.0);
    }

    #[test]
    fn test_worker_message_routing() {
        let message = WorkerMessage::DeleteEntityRequest {
            request_id: RequestId(3),
            entity_id: EntityId(9),
            timeout_millis: None,
        };
        assert_eq!(message.subject_suffix(), "delete_entity");
        assert_eq!(message.request_id(), Some(RequestId(3)));

        let message = WorkerMessage::SetProtocolLogging { enabled: 1 };
        assert_eq!(message.request_id(), None);
    }

    #[test]
    fn test_worker_message_msgpack() {
        let message = WorkerMessage::CommandFailure {
            request_id: RequestId(5),
            message: Cow::Borrowed(&b"denied\0"[..]),
        };
        let bytes = rmp_serde::to_vec(&message).unwrap();
        let back: WorkerMessage<'static> = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, message);
    }
}
