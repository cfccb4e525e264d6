//! Scoped conversion from caller values to wire structs.
//!
//! Each `with_*` function builds the wire struct, hands a borrow of it to
//! the closure and drops every backing buffer when the closure returns,
//! whether it succeeds, fails or unwinds. Nothing built here escapes the
//! scope except the closure's result.
//!
//! Converting connection or snapshot parameters also registers each vtable
//! in a [`CallbackTable`]; those handles are returned next to the closure's
//! result and must be released by the caller once the runtime no longer
//! needs the codecs.

use std::borrow::Cow;

use tracing::debug;
use worker_component::{
    ComponentId, ComponentValue, ComponentVtable, Entity, EntityId, SchemaRoot, VtableRegistry,
};
use worker_query::{EntityQuery, FlatEntityQuery};

use crate::abi::{
    ConnectionParametersAbi, EntityAbi, InterestOverrideAbi, KcpParametersAbi, LogMessageAbi,
    MetricsAbi, NetworkParametersAbi, ProtocolLoggingAbi, SchemaPayloadAbi,
    SnapshotParametersAbi, ThreadAffinityAbi, VtableAbi, slots,
};
use crate::cstr::{to_packed_utf8_cstr, to_utf8_cstr};
use crate::error::InteropError;
use crate::handles::{CallbackHandle, CallbackTable};
use crate::metrics::{HistogramBucket, Metrics};
use crate::params::{
    ConnectionParameters, InterestOverride, LogMessage, NetworkParameters, SnapshotParameters,
};

// ── Vtables ─────────────────────────────────────────────────────────────────

fn slot_mask(vtable: &ComponentVtable) -> u16 {
    let mut mask = 0;
    if vtable.command_request.is_some() {
        mask |= slots::COMMAND_REQUEST;
    }
    if vtable.command_response.is_some() {
        mask |= slots::COMMAND_RESPONSE;
    }
    if vtable.component_data.is_some() {
        mask |= slots::COMPONENT_DATA;
    }
    if vtable.component_update.is_some() {
        mask |= slots::COMPONENT_UPDATE;
    }
    mask
}

struct RegisteredVtables {
    component_vtables: Vec<VtableAbi>,
    default_vtable: Option<VtableAbi>,
    handles: Vec<CallbackHandle>,
}

fn register_vtables(vtables: &VtableRegistry, table: &mut CallbackTable) -> RegisteredVtables {
    let mut handles = Vec::new();
    let mut register = |component_id: u32, vtable: &ComponentVtable| {
        let slots = slot_mask(vtable);
        let handle = table.register(vtable.clone());
        let abi = VtableAbi {
            component_id,
            user_data: handle.raw(),
            slots,
        };
        handles.push(handle);
        abi
    };

    let component_vtables = vtables
        .vtables()
        .map(|(id, vtable)| register(id.0, vtable))
        .collect();
    let default_vtable = vtables.default_vtable().map(|vtable| register(0, vtable));
    RegisteredVtables {
        component_vtables,
        default_vtable,
        handles,
    }
}

// ── Parameters ──────────────────────────────────────────────────────────────

fn network_abi(network: &NetworkParameters) -> NetworkParametersAbi {
    let kcp = &network.kcp;
    NetworkParametersAbi {
        use_external_ip: u8::from(network.use_external_ip),
        connection_type: network.connection_type.code(),
        raknet_heartbeat_timeout_millis: network.raknet.heartbeat_timeout_millis,
        tcp_multiplex_level: network.tcp.multiplex_level,
        tcp_send_buffer_size: network.tcp.send_buffer_size,
        tcp_receive_buffer_size: network.tcp.receive_buffer_size,
        tcp_no_delay: u8::from(network.tcp.no_delay),
        kcp: KcpParametersAbi {
            fast_retransmission: u8::from(kcp.fast_retransmission),
            early_retransmission: u8::from(kcp.early_retransmission),
            non_concessional_flow_control: u8::from(kcp.non_concessional_flow_control),
            multiplex_level: kcp.multiplex_level,
            update_interval_millis: kcp.update_interval_millis,
            min_rto_millis: kcp.min_rto_millis,
            window_size: kcp.window_size,
            enable_erasure_codec: u8::from(kcp.enable_erasure_codec),
            erasure_original_packet_count: kcp.erasure_codec.original_packet_count,
            erasure_recovery_packet_count: kcp.erasure_codec.recovery_packet_count,
            erasure_window_size: kcp.erasure_codec.window_size,
            heartbeat_interval_millis: kcp.heartbeat.interval_millis,
            heartbeat_timeout_millis: kcp.heartbeat.timeout_millis,
        },
        connection_timeout_millis: network.connection_timeout_millis,
        default_command_timeout_millis: network.default_command_timeout_millis,
    }
}

/// Convert connection parameters for the duration of `f`.
///
/// Returns `f`'s result and one callback handle per registered vtable
/// (component-specific first, then the default).
pub fn with_connection_parameters<R>(
    params: &ConnectionParameters,
    table: &mut CallbackTable,
    f: impl FnOnce(&ConnectionParametersAbi<'_>) -> R,
) -> (R, Vec<CallbackHandle>) {
    let registered = register_vtables(&params.vtables, table);
    let abi = ConnectionParametersAbi {
        worker_type: Cow::Owned(to_utf8_cstr(&params.worker_type, true)),
        network: network_abi(&params.network),
        send_queue_capacity: params.send_queue_capacity,
        receive_queue_capacity: params.receive_queue_capacity,
        log_message_queue_capacity: params.log_message_queue_capacity,
        builtin_metrics_report_period_millis: params.builtin_metrics_report_period_millis,
        protocol_logging: ProtocolLoggingAbi {
            log_prefix: Cow::Owned(to_utf8_cstr(&params.protocol_logging.log_prefix, true)),
            max_log_files: params.protocol_logging.max_log_files,
            max_log_file_size_bytes: params.protocol_logging.max_log_file_size_bytes,
        },
        enable_protocol_logging_at_startup: u8::from(params.enable_protocol_logging_at_startup),
        thread_affinity: ThreadAffinityAbi {
            receive_threads_affinity_mask: params.thread_affinity.receive_threads_affinity_mask,
            send_threads_affinity_mask: params.thread_affinity.send_threads_affinity_mask,
            temporary_threads_affinity_mask: params.thread_affinity.temporary_threads_affinity_mask,
        },
        component_vtables: registered.component_vtables,
        default_vtable: registered.default_vtable,
    };
    debug!(
        worker_type = %params.worker_type,
        vtables = registered.handles.len(),
        "connection parameters converted"
    );
    (f(&abi), registered.handles)
}

/// Convert snapshot parameters for the duration of `f`.
pub fn with_snapshot_parameters<R>(
    params: &SnapshotParameters,
    table: &mut CallbackTable,
    f: impl FnOnce(&SnapshotParametersAbi) -> R,
) -> (R, Vec<CallbackHandle>) {
    let registered = register_vtables(&params.vtables, table);
    let abi = SnapshotParametersAbi {
        component_vtables: registered.component_vtables,
        default_vtable: registered.default_vtable,
    };
    (f(&abi), registered.handles)
}

// ── Messages ────────────────────────────────────────────────────────────────

pub fn with_log_message<R>(message: &LogMessage, f: impl FnOnce(&LogMessageAbi<'_>) -> R) -> R {
    let abi = LogMessageAbi {
        level: message.level.code(),
        logger_name: Cow::Owned(to_utf8_cstr(&message.logger_name, true)),
        message: Cow::Owned(to_utf8_cstr(&message.message, true)),
        entity_id: message.entity_id.map(EntityId::id),
    };
    f(&abi)
}

/// Convert metrics for the duration of `f`, packing names into one buffer
/// per metric family.
pub fn with_metrics<R>(metrics: &Metrics, f: impl FnOnce(&MetricsAbi<'_>) -> R) -> R {
    let gauge_names: Vec<&str> = metrics.gauge_metrics.keys().map(String::as_str).collect();
    let histogram_names: Vec<&str> = metrics.histogram_metrics.keys().map(String::as_str).collect();

    let mut bucket_offsets = Vec::with_capacity(histogram_names.len());
    let mut buckets: Vec<HistogramBucket> = Vec::new();
    let mut histogram_sums = Vec::with_capacity(histogram_names.len());
    for histogram in metrics.histogram_metrics.values() {
        bucket_offsets.push(u32::try_from(buckets.len()).unwrap_or(u32::MAX));
        buckets.extend_from_slice(histogram.buckets());
        histogram_sums.push(histogram.sum());
    }

    let abi = MetricsAbi {
        load: metrics.load,
        gauge_names: to_packed_utf8_cstr(&gauge_names, true),
        gauge_values: metrics.gauge_metrics.values().copied().collect(),
        histogram_names: to_packed_utf8_cstr(&histogram_names, true),
        histogram_sums,
        bucket_offsets,
        buckets,
    };
    f(&abi)
}

/// Serialize one payload for the duration of `f`, going through the
/// component's codec if the value holds a user handle.
///
/// # Errors
///
/// Returns [`InteropError::Vtable`] if a handle cannot be serialized and
/// [`InteropError::Schema`] if the schema data cannot be encoded.
pub fn with_schema_payload<S: SchemaRoot, R>(
    value: &ComponentValue<S>,
    vtables: &VtableRegistry,
    f: impl FnOnce(&SchemaPayloadAbi<'_>) -> R,
) -> Result<R, InteropError> {
    let abi = schema_payload(value, vtables)?;
    Ok(f(&abi))
}

fn schema_payload<S: SchemaRoot>(
    value: &ComponentValue<S>,
    vtables: &VtableRegistry,
) -> Result<SchemaPayloadAbi<'static>, InteropError> {
    let schema = value.to_schema(vtables)?;
    Ok(SchemaPayloadAbi {
        component_id: value.component_id().0,
        schema: Cow::Owned(schema.encode()?),
    })
}

/// Convert every component of `entity` for the duration of `f`.
///
/// # Errors
///
/// As [`with_schema_payload`], for the first component that fails.
pub fn with_entity<R>(
    entity: &Entity,
    vtables: &VtableRegistry,
    f: impl FnOnce(&EntityAbi<'_>) -> R,
) -> Result<R, InteropError> {
    let components = entity
        .iter()
        .map(|data| schema_payload(data, vtables))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(f(&EntityAbi { components }))
}

/// Flatten an entity query for the duration of `f`.
///
/// # Errors
///
/// Returns [`InteropError::Query`] wrapping
/// [`QueryError::CyclicConstraint`](worker_query::QueryError::CyclicConstraint)
/// before any storage is allocated if the constraint graph is cyclic.
pub fn with_entity_query<R>(
    query: &EntityQuery,
    f: impl FnOnce(&FlatEntityQuery) -> R,
) -> Result<R, InteropError> {
    let flat = query.flatten()?;
    debug!(
        constraints = flat.constraints.storage().len() + 1,
        result_type = flat.result_type,
        "entity query flattened"
    );
    Ok(f(&flat))
}

/// Convert interest overrides, in component id order.
pub fn with_interest_overrides<R>(
    overrides: &[(ComponentId, InterestOverride)],
    f: impl FnOnce(&[InterestOverrideAbi]) -> R,
) -> R {
    let mut abi: Vec<InterestOverrideAbi> = overrides
        .iter()
        .map(|(component_id, interest)| InterestOverrideAbi {
            component_id: component_id.0,
            is_interested: u8::from(interest.is_interested),
        })
        .collect();
    abi.sort_by_key(|entry| entry.component_id);
    f(&abi)
}

#[cfg(test)]
mod tests {
    use worker_component::{ComponentData, ComponentUpdate, FnCodec};
    use worker_query::{Constraint, ConstraintGraph, Node, QueryError, ResultType};
    use worker_schema::{SchemaComponentData, SchemaComponentUpdate, SchemaError};

    use super::*;
    use crate::cstr::from_utf8_cstr;
    use crate::params::LogLevel;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);

    fn health_vtable() -> ComponentVtable {
        ComponentVtable::new().with_component_data(FnCodec::new(
            |id, health: &Health| {
                let mut data = SchemaComponentData::new(id.0);
                data.fields_mut().add_int32(1, health.0);
                data
            },
            |data: &SchemaComponentData| -> Result<Health, SchemaError> {
                Ok(Health(data.fields().get_int32(1)))
            },
        ))
    }

    #[test]
    fn test_connection_parameters_register_one_handle_per_vtable() {
        let vtables = VtableRegistry::new()
            .with_vtable(ComponentId(1000), health_vtable())
            .with_default(ComponentVtable::new());
        let params = ConnectionParameters::new("Managed").with_vtables(vtables);
        let mut table = CallbackTable::new();

        let (worker_type, handles) = with_connection_parameters(&params, &mut table, |abi| {
            assert_eq!(abi.component_vtables.len(), 1);
            assert_eq!(abi.component_vtables[0].component_id, 1000);
            assert_eq!(abi.component_vtables[0].slots, slots::COMPONENT_DATA);
            assert_eq!(abi.default_vtable.map(|v| v.slots), Some(0));
            assert_eq!(abi.network.connection_type, 0);
            assert_eq!(abi.protocol_logging.log_prefix.as_ref(), b"protocol-log-\0");
            abi.worker_type()
        });

        assert_eq!(worker_type, "Managed");
        assert_eq!(handles.len(), 2);
        assert_eq!(table.outstanding(), 2);
        table.release_all(handles);
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn test_unreleased_handles_stay_outstanding() {
        let params = ConnectionParameters::default()
            .with_vtables(VtableRegistry::new().with_default(ComponentVtable::new()));
        let mut table = CallbackTable::new();
        let ((), handles) = with_connection_parameters(&params, &mut table, |_| ());
        // Forgetting to release is a contract violation the table can see.
        assert_eq!(table.outstanding(), 1);
        table.release_all(handles);
    }

    #[test]
    fn test_snapshot_parameters() {
        let params = SnapshotParameters::new()
            .with_vtables(VtableRegistry::new().with_vtable(ComponentId(7), health_vtable()));
        let mut table = CallbackTable::new();
        let (count, handles) =
            with_snapshot_parameters(&params, &mut table, |abi| abi.component_vtables.len());
        assert_eq!(count, 1);
        let vtable = table.get(handles[0].raw()).unwrap();
        assert!(vtable.component_data.is_some());
        table.release_all(handles);
    }

    #[test]
    fn test_log_message_terminates_strings() {
        let message = LogMessage::new(LogLevel::Warn, "physics", "slow tick")
            .with_entity_id(EntityId(4));
        with_log_message(&message, |abi| {
            assert_eq!(abi.level, 3);
            assert_eq!(abi.logger_name.as_ref(), b"physics\0");
            assert_eq!(from_utf8_cstr(&abi.message), "slow tick");
            assert_eq!(abi.entity_id, Some(4));
        });
    }

    #[test]
    fn test_metrics_pack_and_unpack() {
        let mut metrics = Metrics::new().with_load(0.5);
        metrics.set_gauge("entities", 12.0);
        metrics.set_gauge("fps", 60.0);
        metrics.histogram("frame", [0.016, 0.033]).record_observation(0.02);
        metrics.histogram("net", [1.0]).record_observation(2.0);

        let back = with_metrics(&metrics, |abi| {
            assert_eq!(abi.gauge_names.len(), 2);
            assert_eq!(abi.bucket_offsets, vec![0, 3]);
            assert_eq!(abi.buckets.len(), 5);
            abi.to_metrics()
        });
        assert_eq!(back, metrics);
    }

    #[test]
    fn test_handle_payload_serializes_through_codec() {
        let vtables = VtableRegistry::new().with_vtable(ComponentId(1000), health_vtable());
        let data = ComponentData::from_handle(ComponentId(1000), Health(75));
        let decoded = with_schema_payload(&data, &vtables, |abi| {
            abi.decode::<SchemaComponentData>().unwrap()
        })
        .unwrap();
        assert_eq!(decoded.fields().get_int32(1), 75);
    }

    #[test]
    fn test_payload_without_codec_fails() {
        let update = ComponentUpdate::from_handle(ComponentId(1000), Health(1));
        let vtables = VtableRegistry::new().with_vtable(ComponentId(1000), health_vtable());
        let result = with_schema_payload(&update, &vtables, |_| ());
        assert!(matches!(result, Err(InteropError::Vtable(_))));

        let schema_backed = ComponentUpdate::from_schema(SchemaComponentUpdate::new(1000));
        assert!(with_schema_payload(&schema_backed, &vtables, |_| ()).is_ok());
    }

    #[test]
    fn test_entity_components_in_id_order() {
        let mut entity = Entity::new();
        entity
            .add(ComponentData::from_schema(SchemaComponentData::new(58)))
            .unwrap();
        entity
            .add(ComponentData::from_schema(SchemaComponentData::new(54)))
            .unwrap();
        let ids = with_entity(&entity, &VtableRegistry::new(), |abi| {
            abi.components.iter().map(|c| c.component_id).collect::<Vec<_>>()
        })
        .unwrap();
        assert_eq!(ids, vec![54, 58]);
    }

    #[test]
    fn test_cyclic_entity_query_never_reaches_closure() {
        let mut graph = ConstraintGraph::new();
        let and = graph.add(Node::And(Vec::new())).unwrap();
        graph.replace(and, Node::And(vec![and])).unwrap();
        let query = EntityQuery::from_graph(graph, and, ResultType::Count);

        let mut called = false;
        let result = with_entity_query(&query, |_| called = true);
        assert_eq!(result, Err(InteropError::Query(QueryError::CyclicConstraint)));
        assert!(!called);

        let query = EntityQuery::new(&Constraint::component(ComponentId(54)), ResultType::Count);
        assert!(with_entity_query(&query, |flat| flat.result_type).is_ok());
    }

    #[test]
    fn test_interest_overrides_sorted() {
        let overrides = [
            (ComponentId(9), InterestOverride { is_interested: true }),
            (ComponentId(3), InterestOverride { is_interested: false }),
        ];
        with_interest_overrides(&overrides, |abi| {
            assert_eq!(abi[0].component_id, 3);
            assert_eq!(abi[0].is_interested, 0);
            assert_eq!(abi[1].is_interested, 1);
        });
    }
}
