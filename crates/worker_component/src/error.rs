//! Error types for component values.

use worker_schema::SchemaError;

use crate::component::ComponentId;

/// Errors raised while resolving or invoking component vtables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VtableError {
    /// Neither a component-specific nor a default vtable is registered.
    #[error("no vtable registered for {0} and no default vtable")]
    NoVtable(ComponentId),

    /// The vtable exists but has no codec for this payload kind.
    #[error("vtable for {component_id} has no {kind} codec")]
    MissingCodec {
        /// The component being converted.
        component_id: ComponentId,
        /// The payload kind (e.g. `"component data"`).
        kind: &'static str,
    },

    /// A user handle did not hold the type its codec expects.
    #[error("user handle for {component_id} is not a {expected}")]
    HandleType {
        /// The component being converted.
        component_id: ComponentId,
        /// The Rust type the codec expected.
        expected: &'static str,
    },

    /// The codec failed to read or write schema data.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
