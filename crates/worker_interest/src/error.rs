//! Interest-layer error types.

use worker_component::{ComponentId, VtableError};
use worker_schema::SchemaError;

/// Errors raised while encoding or decoding interest component data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterestError {
    /// The component data is not the interest component.
    #[error("expected interest component {expected}, got {actual}")]
    WrongComponent {
        expected: ComponentId,
        actual: ComponentId,
    },

    /// A nested interest object failed to parse.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A `QueryConstraint` nests deeper than the decoder accepts.
    #[error("query constraint nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    /// Handle-backed component data could not be serialized.
    #[error("vtable error: {0}")]
    Vtable(#[from] VtableError),
}
