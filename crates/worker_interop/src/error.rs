//! Conversion-layer error types.

use worker_component::VtableError;
use worker_query::QueryError;
use worker_schema::SchemaError;

/// Errors raised while converting caller values into wire structs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteropError {
    /// A user handle could not be serialized through its vtable.
    #[error("vtable error: {0}")]
    Vtable(#[from] VtableError),

    /// A schema payload could not be encoded.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An entity query constraint was rejected.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// A code outside an enum's range.
    #[error("unknown {kind} code {code}")]
    UnknownCode { kind: &'static str, code: u8 },
}
