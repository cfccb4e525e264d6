//! A worker's connection to the runtime.
//!
//! A [`Connection`] owns its transport, the vtables used to decode
//! payloads and the callback handles registered for them. Ops are read with
//! [`Connection::get_op_list`]; every `send_*` call converts its arguments to
//! wire form for the duration of the call and publishes one message.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};
use worker_component::{
    CommandRequest, CommandResponse, ComponentId, ComponentUpdate, Entity, EntityId, RequestId,
    VtableRegistry,
};
use worker_interop::{
    CallbackHandle, CallbackTable, CommandParameters, ConnectionParameters, InterestOverride,
    LogMessage, Metrics, UpdateParameters, WorkerMessage, to_utf8_cstr, with_connection_parameters,
    with_entity, with_entity_query, with_interest_overrides, with_log_message, with_metrics,
    with_schema_payload,
};
use worker_net::{Frame, NatsTransport, NetError, Transport};
use worker_ops::{ConnectionStatusCode, OpBatch, OpKind, OpList};
use worker_query::EntityQuery;

use crate::error::ConnectionError;
use crate::future::Future;

/// Connection state that ops change.
#[derive(Debug)]
struct LinkState {
    status_code: ConnectionStatusCode,
    status_details: String,
    flags: BTreeMap<String, String>,
}

impl LinkState {
    fn is_connected(&self) -> bool {
        self.status_code == ConnectionStatusCode::Success
    }

    fn disconnect(&mut self, code: ConnectionStatusCode, details: String) {
        if !self.is_connected() {
            return;
        }
        info!(code = ?code, details, "worker disconnected");
        self.status_code = code;
        self.status_details = details;
    }

    /// Apply the ops that change connection state. Malformed ops are left
    /// for the caller to discover when reading them.
    fn apply(&mut self, list: &OpList<'_>) {
        for index in 0..list.count() {
            match list.kind_at(index) {
                Ok(OpKind::Disconnect) => match list.as_disconnect(index) {
                    Ok(op) => self.disconnect(op.connection_status_code, op.reason),
                    Err(e) => warn!(index, error = %e, "malformed disconnect op"),
                },
                Ok(OpKind::FlagUpdate) => match list.as_flag_update(index) {
                    Ok(op) => {
                        debug!(name = op.name, value = ?op.value, "worker flag updated");
                        match op.value {
                            Some(value) => self.flags.insert(op.name, value),
                            None => self.flags.remove(&op.name),
                        };
                    }
                    Err(e) => warn!(index, error = %e, "malformed flag update op"),
                },
                Ok(_) => {}
                Err(e) => warn!(index, error = %e, "unreadable op"),
            }
        }
    }
}

/// A live link between this worker and the runtime.
pub struct Connection {
    worker_id: String,
    worker_attributes: Vec<String>,
    transport: Box<dyn Transport>,
    vtables: VtableRegistry,
    callbacks: CallbackTable,
    handles: Vec<CallbackHandle>,
    state: LinkState,
    next_request_id: u32,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("worker_id", &self.worker_id)
            .field("state", &self.state)
            .field("next_request_id", &self.next_request_id)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connect to the NATS server at `host:port` on a background thread.
    pub fn connect_async(
        host: &str,
        port: u16,
        worker_id: &str,
        params: ConnectionParameters,
    ) -> Future<Result<Self, ConnectionError>> {
        Self::connect_url_async(&format!("nats://{host}:{port}"), worker_id, params)
    }

    /// Connect to the NATS server at `url` on a background thread.
    pub fn connect_url_async(
        url: &str,
        worker_id: &str,
        params: ConnectionParameters,
    ) -> Future<Result<Self, ConnectionError>> {
        let url = url.to_string();
        let worker_id = worker_id.to_string();
        Future::spawn(move || -> Result<Self, ConnectionError> {
            let transport = NatsTransport::connect(&url, &worker_id)?;
            Self::with_transport(worker_id, &params, transport)
        })
    }

    /// Connect over an already established transport. Sends the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Net`] if the handshake cannot be encoded
    /// or sent.
    pub fn with_transport(
        worker_id: impl Into<String>,
        params: &ConnectionParameters,
        transport: impl Transport + 'static,
    ) -> Result<Self, ConnectionError> {
        let worker_id = worker_id.into();
        let mut callbacks = CallbackTable::new();
        let (handshake, handles) = with_connection_parameters(params, &mut callbacks, |abi| {
            Frame::new(
                &worker_id,
                &WorkerMessage::Handshake {
                    worker_id: Cow::Owned(to_utf8_cstr(&worker_id, true)),
                    parameters: abi.clone(),
                },
            )
        });

        // Built before the handshake is checked so that a failure releases
        // the handles on drop.
        let mut connection = Self {
            worker_attributes: vec![params.worker_type.clone(), format!("workerId:{worker_id}")],
            worker_id,
            transport: Box::new(transport),
            vtables: params.vtables.clone(),
            callbacks,
            handles,
            state: LinkState {
                status_code: ConnectionStatusCode::Success,
                status_details: String::new(),
                flags: BTreeMap::new(),
            },
            next_request_id: 1,
        };
        connection.publish(handshake?)?;
        info!(
            worker_id = connection.worker_id,
            worker_type = params.worker_type,
            "worker connected"
        );
        Ok(connection)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// The worker type followed by `workerId:<id>`.
    #[must_use]
    pub fn worker_attributes(&self) -> &[String] {
        &self.worker_attributes
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// `Success` while connected, otherwise why the connection ended.
    #[must_use]
    pub fn connection_status_code(&self) -> ConnectionStatusCode {
        self.state.status_code
    }

    /// Details for the current status; empty while connected.
    #[must_use]
    pub fn connection_status_details(&self) -> &str {
        &self.state.status_details
    }

    /// The value of worker flag `name`, as of the last polled op list.
    #[must_use]
    pub fn get_worker_flag(&self, name: &str) -> Option<&str> {
        self.state.flags.get(name).map(String::as_str)
    }

    /// The vtables used to decode payloads.
    #[must_use]
    pub fn vtables(&self) -> &VtableRegistry {
        &self.vtables
    }

    // ── Polling ─────────────────────────────────────────────────────────────

    /// Wait up to `timeout_millis` for the next op batch.
    ///
    /// The list borrows the connection, so it must be dropped before the
    /// next poll or send. Once disconnected every poll returns an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Net`] on a transport failure and
    /// [`ConnectionError::OpList`] if the batch is malformed.
    pub fn get_op_list(&mut self, timeout_millis: u32) -> Result<OpList<'_>, ConnectionError> {
        if !self.state.is_connected() {
            return Ok(OpList::empty(&self.vtables));
        }
        let timeout = Duration::from_millis(u64::from(timeout_millis));
        let bytes = match self.transport.poll(timeout) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(OpList::empty(&self.vtables)),
            Err(NetError::Closed) => {
                self.close(ConnectionStatusCode::NetworkError, "transport closed");
                return Ok(OpList::empty(&self.vtables));
            }
            Err(e) => return Err(e.into()),
        };

        let list = OpList::from_batch(OpBatch::decode(&bytes)?, &self.vtables);
        debug!(ops = list.count(), "op list received");
        self.state.apply(&list);
        if !self.state.is_connected() {
            self.transport.close();
        }
        Ok(list)
    }

    // ── Sending ─────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] after a disconnect and
    /// [`ConnectionError::Net`] if the message cannot be sent.
    pub fn send_log_message(&mut self, message: &LogMessage) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = with_log_message(message, |abi| {
            self.frame(&WorkerMessage::LogMessage(abi.clone()))
        })?;
        self.publish(frame)
    }

    /// Send `metrics`, then clear the observations of every histogram in it
    /// so the next report only carries new samples.
    ///
    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message). Histograms are left
    /// untouched when sending fails.
    pub fn send_metrics(&mut self, metrics: &mut Metrics) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = with_metrics(metrics, |abi| self.frame(&WorkerMessage::Metrics(abi.clone())))?;
        self.publish(frame)?;
        metrics.clear_histogram_observations();
        Ok(())
    }

    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message).
    pub fn send_reserve_entity_ids_request(
        &mut self,
        number_of_entity_ids: u32,
        timeout_millis: Option<u32>,
    ) -> Result<RequestId, ConnectionError> {
        self.send_request(|connection, request_id| {
            connection.frame(&WorkerMessage::ReserveEntityIdsRequest {
                request_id,
                number_of_entity_ids,
                timeout_millis,
            })
        })
    }

    /// Ask the runtime to create `entity`, optionally at a reserved id.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Interop`] if a component cannot be
    /// serialized, otherwise as [`send_log_message`](Self::send_log_message).
    pub fn send_create_entity_request(
        &mut self,
        entity: &Entity,
        entity_id: Option<EntityId>,
        timeout_millis: Option<u32>,
    ) -> Result<RequestId, ConnectionError> {
        self.send_request(|connection, request_id| {
            with_entity(entity, &connection.vtables, |abi| {
                connection.frame(&WorkerMessage::CreateEntityRequest {
                    request_id,
                    entity: abi.clone(),
                    entity_id,
                    timeout_millis,
                })
            })?
        })
    }

    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message).
    pub fn send_delete_entity_request(
        &mut self,
        entity_id: EntityId,
        timeout_millis: Option<u32>,
    ) -> Result<RequestId, ConnectionError> {
        self.send_request(|connection, request_id| {
            connection.frame(&WorkerMessage::DeleteEntityRequest {
                request_id,
                entity_id,
                timeout_millis,
            })
        })
    }

    /// Send an entity query. A cyclic constraint graph is rejected before
    /// anything is converted or sent, and does not use up a request id.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Interop`] wrapping
    /// [`QueryError::CyclicConstraint`](worker_query::QueryError::CyclicConstraint)
    /// for a cyclic query, otherwise as
    /// [`send_log_message`](Self::send_log_message).
    pub fn send_entity_query_request(
        &mut self,
        query: &EntityQuery,
        timeout_millis: Option<u32>,
    ) -> Result<RequestId, ConnectionError> {
        self.send_request(|connection, request_id| {
            with_entity_query(query, |flat| {
                connection.frame(&WorkerMessage::EntityQueryRequest {
                    request_id,
                    query: flat.clone(),
                    timeout_millis,
                })
            })?
        })
    }

    /// # Errors
    ///
    /// As [`send_create_entity_request`](Self::send_create_entity_request).
    pub fn send_component_update(
        &mut self,
        entity_id: EntityId,
        update: &ComponentUpdate,
        params: &UpdateParameters,
    ) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = with_schema_payload(update, &self.vtables, |abi| {
            self.frame(&WorkerMessage::ComponentUpdate {
                entity_id,
                update: abi.clone(),
                loopback: params.loopback.code(),
            })
        })??;
        self.publish(frame)
    }

    /// Override interest in components of `entity_id`.
    ///
    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message).
    pub fn send_component_interest(
        &mut self,
        entity_id: EntityId,
        overrides: &[(ComponentId, InterestOverride)],
    ) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = with_interest_overrides(overrides, |abi| {
            self.frame(&WorkerMessage::ComponentInterest {
                entity_id,
                overrides: abi.to_vec(),
            })
        })?;
        self.publish(frame)
    }

    /// # Errors
    ///
    /// As [`send_create_entity_request`](Self::send_create_entity_request).
    pub fn send_command_request(
        &mut self,
        entity_id: EntityId,
        request: &CommandRequest,
        timeout_millis: Option<u32>,
        params: &CommandParameters,
    ) -> Result<RequestId, ConnectionError> {
        self.send_request(|connection, request_id| {
            with_schema_payload(request, &connection.vtables, |abi| {
                connection.frame(&WorkerMessage::CommandRequest {
                    request_id,
                    entity_id,
                    request: abi.clone(),
                    timeout_millis,
                    allow_short_circuiting: u8::from(params.allow_short_circuiting),
                })
            })?
        })
    }

    /// Answer the command request `request_id`.
    ///
    /// # Errors
    ///
    /// As [`send_create_entity_request`](Self::send_create_entity_request).
    pub fn send_command_response(
        &mut self,
        request_id: RequestId,
        response: &CommandResponse,
    ) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = with_schema_payload(response, &self.vtables, |abi| {
            self.frame(&WorkerMessage::CommandResponse {
                request_id,
                response: abi.clone(),
            })
        })??;
        self.publish(frame)
    }

    /// Fail the command request `request_id` with `message`.
    ///
    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message).
    pub fn send_command_failure(
        &mut self,
        request_id: RequestId,
        message: &str,
    ) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = self.frame(&WorkerMessage::CommandFailure {
            request_id,
            message: Cow::Owned(to_utf8_cstr(message, true)),
        })?;
        self.publish(frame)
    }

    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message).
    pub fn send_authority_loss_imminent_acknowledgement(
        &mut self,
        entity_id: EntityId,
        component_id: ComponentId,
    ) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = self.frame(&WorkerMessage::AuthorityLossImminentAck {
            entity_id,
            component_id,
        })?;
        self.publish(frame)
    }

    /// # Errors
    ///
    /// As [`send_log_message`](Self::send_log_message).
    pub fn set_protocol_logging_enabled(&mut self, enabled: bool) -> Result<(), ConnectionError> {
        self.ensure_connected()?;
        let frame = self.frame(&WorkerMessage::SetProtocolLogging {
            enabled: u8::from(enabled),
        })?;
        self.publish(frame)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn ensure_connected(&self) -> Result<(), ConnectionError> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    fn frame(&self, message: &WorkerMessage<'_>) -> Result<Frame, ConnectionError> {
        Ok(Frame::new(&self.worker_id, message)?)
    }

    fn publish(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        match self.transport.send(&frame.subject, frame.payload) {
            Ok(()) => Ok(()),
            Err(NetError::Closed) => {
                self.close(ConnectionStatusCode::NetworkError, "transport closed");
                Err(ConnectionError::NotConnected)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Frame a request under the next request id. The id is only used up
    /// once the request has been sent.
    fn send_request(
        &mut self,
        build: impl FnOnce(&Self, RequestId) -> Result<Frame, ConnectionError>,
    ) -> Result<RequestId, ConnectionError> {
        self.ensure_connected()?;
        let request_id = RequestId(self.next_request_id);
        let frame = build(self, request_id)?;
        self.publish(frame)?;
        self.next_request_id = self.next_request_id.checked_add(1).unwrap_or(1);
        debug!(request_id = request_id.0, "request sent");
        Ok(request_id)
    }

    fn close(&mut self, code: ConnectionStatusCode, details: &str) {
        self.state.disconnect(code, details.to_string());
        self.transport.close();
    }

    fn release_callbacks(&mut self) {
        let handles = std::mem::take(&mut self.handles);
        self.callbacks.release_all(handles);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release_callbacks();
        self.transport.close();
        debug!(worker_id = self.worker_id, "connection dropped");
    }
}

#[cfg(test)]
mod tests {
    use worker_component::{ComponentData, ComponentVtable, FnCodec};
    use worker_interop::{InteropError, LogLevel, MetricsAbi};
    use worker_net::{MemoryBackend, memory_pair};
    use worker_ops::OpBatchBuilder;
    use worker_query::{Constraint, ConstraintGraph, Node, QueryError, ResultType};
    use worker_schema::{
        SchemaCommandRequest, SchemaCommandResponse, SchemaComponentData, SchemaComponentUpdate,
        SchemaError,
    };

    use super::*;

    fn connect(params: &ConnectionParameters) -> (Connection, MemoryBackend) {
        let (transport, backend) = memory_pair();
        let connection = Connection::with_transport("worker-1", params, transport).unwrap();
        (connection, backend)
    }

    fn messages(backend: &MemoryBackend) -> Vec<WorkerMessage<'static>> {
        backend.take_sent().iter().map(|frame| frame.message().unwrap()).collect()
    }

    #[test]
    fn test_handshake_on_connect() {
        let params = ConnectionParameters::new("physics");
        let (connection, backend) = connect(&params);
        assert!(connection.is_connected());
        assert_eq!(connection.worker_id(), "worker-1");
        assert_eq!(connection.worker_attributes(), ["physics", "workerId:worker-1"]);
        assert_eq!(connection.connection_status_code(), ConnectionStatusCode::Success);
        assert_eq!(connection.connection_status_details(), "");

        let frames = backend.sent();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].subject, "worker.connect");
        match frames[0].message().unwrap() {
            WorkerMessage::Handshake { parameters, .. } => {
                assert_eq!(parameters.worker_type(), "physics");
            }
            other => panic!("expected handshake, got {other:?}"),
        }
    }

    #[test]
    fn test_request_ids_start_at_one_and_increase() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        let _ = backend.take_sent();
        let first = connection.send_reserve_entity_ids_request(5, None).unwrap();
        let second = connection.send_delete_entity_request(EntityId(3), Some(100)).unwrap();
        assert_eq!(first, RequestId(1));
        assert_eq!(second, RequestId(2));

        let sent = messages(&backend);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].request_id(), Some(RequestId(1)));
        assert_eq!(
            sent[1],
            WorkerMessage::DeleteEntityRequest {
                request_id: RequestId(2),
                entity_id: EntityId(3),
                timeout_millis: Some(100),
            }
        );
    }

    #[test]
    fn test_cyclic_query_is_rejected_before_sending() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        let _ = backend.take_sent();

        let mut graph = ConstraintGraph::new();
        let or = graph.add(Node::Or(Vec::new())).unwrap();
        let not = graph.add(Node::Not(or)).unwrap();
        graph.replace(or, Node::Or(vec![not])).unwrap();
        let cyclic = EntityQuery::from_graph(graph, or, ResultType::Count);

        let result = connection.send_entity_query_request(&cyclic, None);
        assert!(matches!(
            result,
            Err(ConnectionError::Interop(InteropError::Query(QueryError::CyclicConstraint)))
        ));
        assert!(backend.sent().is_empty());

        let query = EntityQuery::new(&Constraint::entity_id(EntityId(7)), ResultType::Count);
        assert_eq!(connection.send_entity_query_request(&query, None).unwrap(), RequestId(1));
        match &messages(&backend)[0] {
            WorkerMessage::EntityQueryRequest { query, .. } => assert_eq!(query.result_type, 1),
            other => panic!("expected entity query, got {other:?}"),
        }
    }

    #[test]
    fn test_disconnect_op_closes_connection() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        let batch = OpBatchBuilder::new()
            .disconnect(ConnectionStatusCode::ServerShutdown, "bye")
            .unwrap()
            .encode()
            .unwrap();
        backend.push_batch(batch).unwrap();

        {
            let list = connection.get_op_list(0).unwrap();
            assert_eq!(list.count(), 1);
            assert_eq!(list.as_disconnect(0).unwrap().reason, "bye");
        }
        assert!(!connection.is_connected());
        assert_eq!(connection.connection_status_code(), ConnectionStatusCode::ServerShutdown);
        assert_eq!(connection.connection_status_details(), "bye");

        let log = LogMessage::new(LogLevel::Info, "test", "after");
        assert!(matches!(
            connection.send_log_message(&log),
            Err(ConnectionError::NotConnected)
        ));
        assert!(matches!(
            connection.send_reserve_entity_ids_request(1, None),
            Err(ConnectionError::NotConnected)
        ));
        assert!(connection.get_op_list(0).unwrap().is_empty());
    }

    #[test]
    fn test_closed_transport_is_a_network_error() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        drop(backend);
        assert!(connection.get_op_list(1).unwrap().is_empty());
        assert_eq!(connection.connection_status_code(), ConnectionStatusCode::NetworkError);
        assert!(!connection.is_connected());
    }

    #[test]
    fn test_flag_updates_are_tracked() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        let batch = OpBatchBuilder::new()
            .flag_update("tick_rate", Some("30"))
            .unwrap()
            .flag_update("debug", Some("on"))
            .unwrap()
            .encode()
            .unwrap();
        backend.push_batch(batch).unwrap();
        assert_eq!(connection.get_op_list(0).unwrap().count(), 2);
        assert_eq!(connection.get_worker_flag("tick_rate"), Some("30"));

        let batch = OpBatchBuilder::new()
            .flag_update("debug", None)
            .unwrap()
            .encode()
            .unwrap();
        backend.push_batch(batch).unwrap();
        assert_eq!(connection.get_op_list(0).unwrap().count(), 1);
        assert_eq!(connection.get_worker_flag("debug"), None);
        assert_eq!(connection.get_worker_flag("tick_rate"), Some("30"));
        assert_eq!(connection.get_worker_flag("missing"), None);
    }

    #[test]
    fn test_poll_timeout_gives_empty_list() {
        let (mut connection, _backend) = connect(&ConnectionParameters::default());
        assert!(connection.get_op_list(1).unwrap().is_empty());
        assert!(connection.is_connected());
    }

    #[test]
    fn test_malformed_batch_is_an_error() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        backend.push_batch(vec![0xC1]).unwrap();
        assert!(matches!(
            connection.get_op_list(0),
            Err(ConnectionError::OpList(_))
        ));
        assert!(connection.is_connected());
    }

    #[test]
    fn test_send_metrics_clears_histograms() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        let _ = backend.take_sent();

        let mut metrics = Metrics::new().with_load(0.5);
        metrics.set_gauge("entities", 12.0);
        metrics.histogram("tick_ms", [1.0, 10.0]).record_observation(4.0);
        connection.send_metrics(&mut metrics).unwrap();

        let sent: Vec<WorkerMessage<'static>> = messages(&backend);
        let WorkerMessage::Metrics(abi) = &sent[0] else {
            panic!("expected metrics, got {:?}", sent[0]);
        };
        let received = MetricsAbi::to_metrics(abi);
        assert_eq!(received.gauge_metrics["entities"], 12.0);
        assert_eq!(received.histogram_metrics["tick_ms"].sum(), 4.0);

        let cleared = &metrics.histogram_metrics["tick_ms"];
        assert_eq!(cleared.sum(), 0.0);
        assert!(cleared.buckets().iter().all(|bucket| bucket.samples == 0));
        assert_eq!(metrics.gauge_metrics["entities"], 12.0);
    }

    #[test]
    fn test_component_and_command_sends() {
        let (mut connection, backend) = connect(&ConnectionParameters::default());
        let _ = backend.take_sent();

        let mut update = SchemaComponentUpdate::new(54);
        update.fields_mut().add_int32(1, 9);
        connection
            .send_component_update(
                EntityId(1),
                &ComponentUpdate::from_schema(update),
                &UpdateParameters::default(),
            )
            .unwrap();

        connection
            .send_command_response(
                RequestId(40),
                &CommandResponse::from_schema(SchemaCommandResponse::new(54, 1)),
            )
            .unwrap();
        connection.send_command_failure(RequestId(41), "nope").unwrap();
        connection
            .send_authority_loss_imminent_acknowledgement(EntityId(1), ComponentId(54))
            .unwrap();
        connection
            .send_component_interest(
                EntityId(1),
                &[
                    (ComponentId(60), InterestOverride { is_interested: false }),
                    (ComponentId(54), InterestOverride { is_interested: true }),
                ],
            )
            .unwrap();
        connection.set_protocol_logging_enabled(true).unwrap();

        let subjects: Vec<String> = backend.sent().into_iter().map(|frame| frame.subject).collect();
        assert_eq!(
            subjects,
            [
                "worker.worker-1.component_update",
                "worker.worker-1.command_response",
                "worker.worker-1.command_failure",
                "worker.worker-1.authority_loss_imminent_ack",
                "worker.worker-1.component_interest",
                "worker.worker-1.protocol_logging",
            ]
        );

        let sent = messages(&backend);
        match &sent[0] {
            WorkerMessage::ComponentUpdate { update, loopback, .. } => {
                assert_eq!(update.component_id, 54);
                assert_eq!(*loopback, 1);
                let decoded: SchemaComponentUpdate = update.decode().unwrap();
                assert_eq!(decoded.fields().get_int32(1), 9);
            }
            other => panic!("expected component update, got {other:?}"),
        }
        match &sent[4] {
            WorkerMessage::ComponentInterest { overrides, .. } => {
                let ids: Vec<u32> = overrides.iter().map(|o| o.component_id).collect();
                assert_eq!(ids, [54, 60]);
            }
            other => panic!("expected component interest, got {other:?}"),
        }
        // Responses and failures do not take request ids.
        assert_eq!(
            connection.send_reserve_entity_ids_request(1, None).unwrap(),
            RequestId(1)
        );
    }

    #[test]
    fn test_create_entity_data_goes_through_codec() {
        #[derive(Debug, Clone, PartialEq)]
        struct Health(i32);

        let vtable = ComponentVtable::new().with_component_data(FnCodec::new(
            |id, health: &Health| {
                let mut data = SchemaComponentData::new(id.0);
                data.fields_mut().add_int32(1, health.0);
                data
            },
            |data: &SchemaComponentData| -> Result<Health, SchemaError> {
                Ok(Health(data.fields().get_int32(1)))
            },
        ));
        let params = ConnectionParameters::new("client")
            .with_vtables(VtableRegistry::new().with_vtable(ComponentId(54), vtable));
        let (mut connection, backend) = connect(&params);
        let _ = backend.take_sent();

        let mut entity = Entity::new();
        entity
            .add(ComponentData::from_handle(ComponentId(54), Health(75)))
            .unwrap();
        let request_id = connection
            .send_create_entity_request(&entity, Some(EntityId(10)), None)
            .unwrap();
        assert_eq!(request_id, RequestId(1));

        match &messages(&backend)[0] {
            WorkerMessage::CreateEntityRequest { entity, entity_id, .. } => {
                assert_eq!(*entity_id, Some(EntityId(10)));
                let data: SchemaComponentData = entity.components[0].decode().unwrap();
                assert_eq!(data.fields().get_int32(1), 75);
            }
            other => panic!("expected create entity, got {other:?}"),
        }
    }

    #[test]
    fn test_command_request_goes_through_codec() {
        #[derive(Debug, Clone, PartialEq)]
        struct Heal(i32);

        let vtable = ComponentVtable::new().with_command_request(FnCodec::new(
            |id, heal: &Heal| {
                let mut request = SchemaCommandRequest::new(id.0, 2);
                request.object_mut().add_int32(1, heal.0);
                request
            },
            |request: &SchemaCommandRequest| -> Result<Heal, SchemaError> {
                Ok(Heal(request.object().get_int32(1)))
            },
        ));
        let params = ConnectionParameters::new("client")
            .with_vtables(VtableRegistry::new().with_vtable(ComponentId(54), vtable));
        let (mut connection, backend) = connect(&params);
        let _ = backend.take_sent();

        let params = CommandParameters::default().with_short_circuiting(true);
        let request = CommandRequest::from_handle(ComponentId(54), Heal(25));
        assert_eq!(
            connection
                .send_command_request(EntityId(10), &request, Some(500), &params)
                .unwrap(),
            RequestId(1)
        );

        match &messages(&backend)[0] {
            WorkerMessage::CommandRequest {
                entity_id,
                request,
                timeout_millis,
                allow_short_circuiting,
                ..
            } => {
                assert_eq!(*entity_id, EntityId(10));
                assert_eq!(*timeout_millis, Some(500));
                assert_eq!(*allow_short_circuiting, 1);
                let payload: SchemaCommandRequest = request.decode().unwrap();
                assert_eq!(payload.command_index(), 2);
                assert_eq!(payload.object().get_int32(1), 25);
            }
            other => panic!("expected command request, got {other:?}"),
        }
    }

    #[test]
    fn test_callback_handles_released() {
        let registry = VtableRegistry::new()
            .with_vtable(ComponentId(54), ComponentVtable::new())
            .with_default(ComponentVtable::new());
        let params = ConnectionParameters::new("client").with_vtables(registry);
        let (mut connection, _backend) = connect(&params);
        assert_eq!(connection.callbacks.outstanding(), 2);
        connection.release_callbacks();
        assert_eq!(connection.callbacks.outstanding(), 0);
    }
}
