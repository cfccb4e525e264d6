//! Schema-layer error types.

/// Errors raised while encoding or decoding schema objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The object graph could not be written to the wire format.
    #[error("failed to serialize schema object: {0}")]
    Serialization(String),

    /// A buffer could not be parsed as a schema object.
    #[error("failed to deserialize schema object: {0}")]
    Deserialization(String),
}
