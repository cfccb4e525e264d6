//! Caller-facing connection and send parameters.
//!
//! Every struct implements [`Default`] with the runtime's documented
//! defaults and exposes `with_*` builders for the fields callers commonly
//! change.

use worker_component::{EntityId, VtableRegistry};

use crate::wire_enum;

// ── Defaults ────────────────────────────────────────────────────────────────

pub const DEFAULT_SEND_QUEUE_CAPACITY: u32 = 4096;
pub const DEFAULT_RECEIVE_QUEUE_CAPACITY: u32 = 4096;
pub const DEFAULT_LOG_MESSAGE_QUEUE_CAPACITY: u32 = 256;
pub const DEFAULT_BUILTIN_METRICS_REPORT_PERIOD_MILLIS: u32 = 5000;
pub const DEFAULT_LOG_PREFIX: &str = "protocol-log-";
pub const DEFAULT_MAX_LOG_FILES: u32 = 10;
pub const DEFAULT_MAX_LOG_FILE_SIZE_BYTES: u32 = 1024 * 1024;
pub const DEFAULT_RAKNET_HEARTBEAT_TIMEOUT_MILLIS: u32 = 60_000;
pub const DEFAULT_TCP_MULTIPLEX_LEVEL: u8 = 32;
pub const DEFAULT_TCP_BUFFER_SIZE: u32 = 65_536;
pub const DEFAULT_CONNECTION_TIMEOUT_MILLIS: u64 = 60_000;
pub const DEFAULT_COMMAND_TIMEOUT_MILLIS: u32 = 5000;

// ── Enums ───────────────────────────────────────────────────────────────────

wire_enum! {
    /// Severity of a worker log message.
    pub enum LogLevel: "log level" {
        Debug = 1,
        Info = 2,
        Warn = 3,
        Error = 4,
        Fatal = 5,
    }
}

wire_enum! {
    /// Transport used to reach the runtime.
    pub enum NetworkConnectionType: "network connection type" {
        Tcp = 0,
        RakNet = 1,
        Kcp = 2,
    }
}

wire_enum! {
    /// Whether a sent component update is also delivered back to the sender.
    pub enum ComponentUpdateLoopback: "component update loopback" {
        None = 0,
        ShortCircuited = 1,
    }
}

impl Default for NetworkConnectionType {
    fn default() -> Self {
        Self::Tcp
    }
}

impl Default for ComponentUpdateLoopback {
    fn default() -> Self {
        Self::ShortCircuited
    }
}

// ── Network ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RakNetNetworkParameters {
    pub heartbeat_timeout_millis: u32,
}

impl Default for RakNetNetworkParameters {
    fn default() -> Self {
        Self {
            heartbeat_timeout_millis: DEFAULT_RAKNET_HEARTBEAT_TIMEOUT_MILLIS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpNetworkParameters {
    pub multiplex_level: u8,
    pub send_buffer_size: u32,
    pub receive_buffer_size: u32,
    pub no_delay: bool,
}

impl Default for TcpNetworkParameters {
    fn default() -> Self {
        Self {
            multiplex_level: DEFAULT_TCP_MULTIPLEX_LEVEL,
            send_buffer_size: DEFAULT_TCP_BUFFER_SIZE,
            receive_buffer_size: DEFAULT_TCP_BUFFER_SIZE,
            no_delay: false,
        }
    }
}

/// Forward error correction for KCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasureCodecParameters {
    /// Consecutive packets sent before recovery packets.
    pub original_packet_count: u8,
    /// Recovery packets per group of original packets.
    pub recovery_packet_count: u8,
    /// Batches kept in memory.
    pub window_size: u8,
}

impl Default for ErasureCodecParameters {
    fn default() -> Self {
        Self {
            original_packet_count: 10,
            recovery_packet_count: 2,
            window_size: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatParameters {
    pub interval_millis: u64,
    pub timeout_millis: u64,
}

impl Default for HeartbeatParameters {
    fn default() -> Self {
        Self {
            interval_millis: 10_000,
            timeout_millis: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KcpNetworkParameters {
    pub fast_retransmission: bool,
    pub early_retransmission: bool,
    pub non_concessional_flow_control: bool,
    pub multiplex_level: u32,
    pub update_interval_millis: u32,
    /// Zero selects the transport's own minimum.
    pub min_rto_millis: u32,
    pub window_size: u32,
    pub enable_erasure_codec: bool,
    pub erasure_codec: ErasureCodecParameters,
    pub heartbeat: HeartbeatParameters,
}

impl Default for KcpNetworkParameters {
    fn default() -> Self {
        Self {
            fast_retransmission: true,
            early_retransmission: true,
            non_concessional_flow_control: true,
            multiplex_level: 32,
            update_interval_millis: 10,
            min_rto_millis: 10,
            window_size: 1000,
            enable_erasure_codec: false,
            erasure_codec: ErasureCodecParameters::default(),
            heartbeat: HeartbeatParameters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParameters {
    pub use_external_ip: bool,
    pub connection_type: NetworkConnectionType,
    pub raknet: RakNetNetworkParameters,
    pub tcp: TcpNetworkParameters,
    pub kcp: KcpNetworkParameters,
    pub connection_timeout_millis: u64,
    pub default_command_timeout_millis: u32,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            use_external_ip: false,
            connection_type: NetworkConnectionType::Tcp,
            raknet: RakNetNetworkParameters::default(),
            tcp: TcpNetworkParameters::default(),
            kcp: KcpNetworkParameters::default(),
            connection_timeout_millis: DEFAULT_CONNECTION_TIMEOUT_MILLIS,
            default_command_timeout_millis: DEFAULT_COMMAND_TIMEOUT_MILLIS,
        }
    }
}

// ── Connection ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolLoggingParameters {
    pub log_prefix: String,
    pub max_log_files: u32,
    pub max_log_file_size_bytes: u32,
}

impl Default for ProtocolLoggingParameters {
    fn default() -> Self {
        Self {
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            max_log_files: DEFAULT_MAX_LOG_FILES,
            max_log_file_size_bytes: DEFAULT_MAX_LOG_FILE_SIZE_BYTES,
        }
    }
}

/// CPU masks for the runtime's threads; zero leaves placement to the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadAffinityParameters {
    pub receive_threads_affinity_mask: u64,
    pub send_threads_affinity_mask: u64,
    pub temporary_threads_affinity_mask: u64,
}

/// Everything needed to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
    pub worker_type: String,
    pub network: NetworkParameters,
    pub send_queue_capacity: u32,
    pub receive_queue_capacity: u32,
    pub log_message_queue_capacity: u32,
    pub builtin_metrics_report_period_millis: u32,
    pub protocol_logging: ProtocolLoggingParameters,
    pub enable_protocol_logging_at_startup: bool,
    pub thread_affinity: ThreadAffinityParameters,
    /// Codecs used for payloads received on and sent over the connection.
    pub vtables: VtableRegistry,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            worker_type: String::new(),
            network: NetworkParameters::default(),
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            receive_queue_capacity: DEFAULT_RECEIVE_QUEUE_CAPACITY,
            log_message_queue_capacity: DEFAULT_LOG_MESSAGE_QUEUE_CAPACITY,
            builtin_metrics_report_period_millis: DEFAULT_BUILTIN_METRICS_REPORT_PERIOD_MILLIS,
            protocol_logging: ProtocolLoggingParameters::default(),
            enable_protocol_logging_at_startup: false,
            thread_affinity: ThreadAffinityParameters::default(),
            vtables: VtableRegistry::default(),
        }
    }
}

impl ConnectionParameters {
    /// Parameters for a worker of `worker_type`, otherwise default.
    #[must_use]
    pub fn new(worker_type: impl Into<String>) -> Self {
        Self {
            worker_type: worker_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_worker_type(mut self, worker_type: impl Into<String>) -> Self {
        self.worker_type = worker_type.into();
        self
    }

    #[must_use]
    pub fn with_connection_type(mut self, connection_type: NetworkConnectionType) -> Self {
        self.network.connection_type = connection_type;
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: NetworkParameters) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn with_queue_capacities(mut self, send: u32, receive: u32) -> Self {
        self.send_queue_capacity = send;
        self.receive_queue_capacity = receive;
        self
    }

    #[must_use]
    pub fn with_protocol_logging(mut self, logging: ProtocolLoggingParameters, at_startup: bool) -> Self {
        self.protocol_logging = logging;
        self.enable_protocol_logging_at_startup = at_startup;
        self
    }

    #[must_use]
    pub fn with_vtables(mut self, vtables: VtableRegistry) -> Self {
        self.vtables = vtables;
        self
    }
}

// ── Snapshot ────────────────────────────────────────────────────────────────

/// Options for opening snapshot streams.
#[derive(Debug, Clone, Default)]
pub struct SnapshotParameters {
    /// Codecs used to turn components into user handles on read and back
    /// into schema data on write.
    pub vtables: VtableRegistry,
}

impl SnapshotParameters {
    /// Parameters with no vtables: every component stays schema-backed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `vtables` for component conversion.
    #[must_use]
    pub fn with_vtables(mut self, vtables: VtableRegistry) -> Self {
        self.vtables = vtables;
        self
    }
}

// ── Per-send parameters ─────────────────────────────────────────────────────

/// A log message for the runtime's log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: LogLevel,
    pub logger_name: String,
    pub message: String,
    pub entity_id: Option<EntityId>,
}

impl LogMessage {
    #[must_use]
    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            logger_name: logger_name.into(),
            message: message.into(),
            entity_id: None,
        }
    }

    /// Attach the message to an entity.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateParameters {
    pub loopback: ComponentUpdateLoopback,
}

impl UpdateParameters {
    #[must_use]
    pub fn with_loopback(mut self, loopback: ComponentUpdateLoopback) -> Self {
        self.loopback = loopback;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandParameters {
    /// Let the runtime answer locally when this worker handles the command.
    pub allow_short_circuiting: bool,
}

impl CommandParameters {
    #[must_use]
    pub fn with_short_circuiting(mut self, allow: bool) -> Self {
        self.allow_short_circuiting = allow;
        self
    }
}

/// Per-component interest override for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestOverride {
    pub is_interested: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_defaults() {
        let params = ConnectionParameters::default();
        assert_eq!(params.worker_type, "");
        assert_eq!(params.send_queue_capacity, 4096);
        assert_eq!(params.receive_queue_capacity, 4096);
        assert_eq!(params.log_message_queue_capacity, 256);
        assert_eq!(params.builtin_metrics_report_period_millis, 5000);
        assert_eq!(params.protocol_logging.log_prefix, "protocol-log-");
        assert_eq!(params.protocol_logging.max_log_files, 10);
        assert_eq!(params.protocol_logging.max_log_file_size_bytes, 1 << 20);
        assert!(!params.enable_protocol_logging_at_startup);
        assert!(params.vtables.is_empty());
    }

    #[test]
    fn test_network_defaults() {
        let network = NetworkParameters::default();
        assert_eq!(network.connection_type, NetworkConnectionType::Tcp);
        assert_eq!(network.raknet.heartbeat_timeout_millis, 60_000);
        assert_eq!(network.tcp.multiplex_level, 32);
        assert_eq!(network.tcp.send_buffer_size, 65_536);
        assert!(!network.tcp.no_delay);
        assert_eq!(network.connection_timeout_millis, 60_000);
        assert_eq!(network.default_command_timeout_millis, 5000);

        let kcp = network.kcp;
        assert!(kcp.fast_retransmission && kcp.early_retransmission);
        assert!(kcp.non_concessional_flow_control);
        assert_eq!((kcp.update_interval_millis, kcp.min_rto_millis), (10, 10));
        assert_eq!(kcp.window_size, 1000);
        assert!(!kcp.enable_erasure_codec);
        assert_eq!(kcp.erasure_codec.window_size, 16);
        assert_eq!(kcp.heartbeat.interval_millis, 10_000);
    }

    #[test]
    fn test_builders() {
        let params = ConnectionParameters::new("GameClient")
            .with_connection_type(NetworkConnectionType::Kcp)
            .with_queue_capacities(16, 32);
        assert_eq!(params.worker_type, "GameClient");
        assert_eq!(params.network.connection_type, NetworkConnectionType::Kcp);
        assert_eq!(params.send_queue_capacity, 16);
        assert_eq!(params.receive_queue_capacity, 32);

        let update = UpdateParameters::default();
        assert_eq!(update.loopback, ComponentUpdateLoopback::ShortCircuited);
        let update = update.with_loopback(ComponentUpdateLoopback::None);
        assert_eq!(update.loopback.code(), 0);
    }

    #[test]
    fn test_enum_codes() {
        assert_eq!(LogLevel::ALL.len(), 5);
        assert_eq!(LogLevel::Fatal.code(), 5);
        assert_eq!(NetworkConnectionType::try_from(1).unwrap(), NetworkConnectionType::RakNet);
        assert!(matches!(
            LogLevel::try_from(0),
            Err(crate::InteropError::UnknownCode { kind: "log level", code: 0 })
        ));
    }
}
