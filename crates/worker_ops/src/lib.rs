//! # worker_ops
//!
//! Decoding of the op batches a worker receives from the runtime.
//!
//! This crate provides:
//!
//! - [`OpKind`], [`StatusCode`], [`Authority`], [`ConnectionStatusCode`]:
//!   the one-byte enums carried in ops.
//! - [`OpBatch`] and [`OpBatchBuilder`]: the tagged wire form of a batch.
//! - [`OpList`]: bounds-checked, typed access to one batch.
//! - [`Op`] and one struct per op kind, with component payloads as
//!   [`ComponentRef`]s borrowed from the list.

pub mod error;
pub mod op;
pub mod op_list;
pub mod raw;
pub mod types;

pub use error::OpListError;
pub use op::{
    AddComponentOp, AddEntityOp, AuthorityChangeOp, CommandRequestOp, CommandResponseOp,
    ComponentRef, ComponentUpdateOp, CreateEntityResponseOp, CriticalSectionOp,
    DeleteEntityResponseOp, DisconnectOp, EntityQueryResponseOp, FlagUpdateOp, LogMessageOp,
    MetricsOp, Op, RemoveComponentOp, RemoveEntityOp, ReserveEntityIdResponseOp,
    ReserveEntityIdsResponseOp,
};
pub use op_list::OpList;
pub use raw::{OpBatch, OpBatchBuilder, RawOp, RawRecord};
pub use types::{Authority, ConnectionStatusCode, OpKind, StatusCode};
