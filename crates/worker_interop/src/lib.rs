//! # worker_interop
//!
//! Caller-facing parameters and the wire structs they convert into.
//!
//! This crate provides:
//!
//! - [`ConnectionParameters`] and the per-send parameter types, with the
//!   runtime's defaults.
//! - [`Metrics`] and [`LogLevel`], shared by the send path and the op decoder.
//! - [`cstr`]: UTF-8 C-string and packed multi-string helpers.
//! - [`abi`]: pointer-free wire structs, including [`WorkerMessage`].
//! - [`convert`]: scoped `with_*` conversions from caller values to wire
//!   structs.
//! - [`CallbackTable`]: registered vtables addressed by move-only handles.
//! - [`wire_enum!`]: one-byte enums with checked decoding.

pub mod abi;
pub mod convert;
pub mod cstr;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod params;
mod wire_enum;

pub use abi::{
    ConnectionParametersAbi, EntityAbi, LogMessageAbi, MetricsAbi, SchemaPayloadAbi,
    SnapshotParametersAbi, VtableAbi, WorkerMessage,
};
pub use convert::{
    with_connection_parameters, with_entity, with_entity_query, with_interest_overrides,
    with_log_message, with_metrics, with_schema_payload, with_snapshot_parameters,
};
pub use cstr::{PackedStrings, from_utf8_cstr, to_packed_utf8_cstr, to_utf8_cstr, unpack_utf8_cstr};
pub use error::InteropError;
pub use handles::{CallbackHandle, CallbackTable};
pub use metrics::{HistogramBucket, HistogramMetric, Metrics};
pub use params::{
    CommandParameters, ComponentUpdateLoopback, ConnectionParameters, InterestOverride,
    KcpNetworkParameters, LogLevel, LogMessage, NetworkConnectionType, NetworkParameters,
    ProtocolLoggingParameters, SnapshotParameters, TcpNetworkParameters, UpdateParameters,
};
