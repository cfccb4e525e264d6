//! # worker_net
//!
//! Moves worker messages and op batches between a worker and the runtime.
//!
//! This crate provides:
//! - [`encode`] / [`decode`] and [`Frame`]: MessagePack framing for
//!   [`worker_interop::WorkerMessage`].
//! - [`subjects`]: the NATS subject hierarchy.
//! - [`Transport`]: the seam a connection talks through, implemented by
//!   [`NatsTransport`] and the in-process [`MemoryTransport`].
//! - [`NetError`]: the error type.

pub mod codec;
pub mod error;
pub mod nats;
pub mod subjects;
pub mod transport;

pub use codec::{Frame, decode, encode};
pub use error::NetError;
pub use nats::{DEFAULT_NATS_URL, NATS_URL_ENV, NatsTransport};
pub use transport::{MemoryBackend, MemoryTransport, Transport, memory_pair};
