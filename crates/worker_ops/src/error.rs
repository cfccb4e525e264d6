//! Op-list error types.

use worker_component::VtableError;
use worker_interop::InteropError;
use worker_schema::SchemaError;

use crate::types::OpKind;

/// Errors raised while decoding an op batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpListError {
    /// The batch or an op body is not valid MessagePack for its record.
    #[error("failed to decode op batch: {0}")]
    Decode(String),

    /// An op batch could not be encoded.
    #[error("failed to encode op batch: {0}")]
    Encode(String),

    /// An index outside `[0, count)`.
    #[error("op index {index} out of range for a list of {count} ops")]
    IndexOutOfRange { index: usize, count: usize },

    /// A typed accessor was used on an op of another kind.
    #[error("op {index} is {actual:?}, not {expected:?}")]
    KindMismatch {
        index: usize,
        expected: OpKind,
        actual: OpKind,
    },

    /// An op tag or enum field held an unknown code.
    #[error(transparent)]
    Interop(#[from] InteropError),

    /// An embedded schema payload is malformed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An embedded payload could not be acquired through its vtable.
    #[error(transparent)]
    Vtable(#[from] VtableError),
}
