//! Connection error types.

use worker_interop::InteropError;
use worker_net::NetError;
use worker_ops::OpListError;

/// Errors raised by a [`Connection`](crate::Connection).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection has been closed by a disconnect op or the transport.
    #[error("not connected")]
    NotConnected,

    /// Moving bytes failed.
    #[error(transparent)]
    Net(#[from] NetError),

    /// A value could not be converted to its wire form.
    #[error(transparent)]
    Interop(#[from] InteropError),

    /// An op batch could not be decoded.
    #[error(transparent)]
    OpList(#[from] OpListError),

    /// A connect future was dropped by its producer.
    #[error(transparent)]
    Future(#[from] FutureError),
}

/// Errors raised while waiting on a [`Future`](crate::Future).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FutureError {
    /// The producer went away without a value.
    #[error("future abandoned before completing")]
    Abandoned,
}
