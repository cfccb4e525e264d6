//! Query-layer error types.

/// Errors raised while validating, flattening or decoding constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A constraint node (transitively) contains itself.
    #[error("constraint graph contains a cycle")]
    CyclicConstraint,

    /// A node id does not belong to the graph.
    #[error("constraint node {0} does not exist")]
    UnknownNode(usize),

    /// A flattened node points outside the storage block.
    #[error("flat constraint references slots {first}..{end} but storage holds {len}")]
    InvalidOffset {
        /// First referenced slot.
        first: usize,
        /// One past the last referenced slot.
        end: usize,
        /// Number of storage slots.
        len: usize,
    },

    /// A flattened buffer references the same slots more than once.
    #[error("flat constraint visits more slots than it stores")]
    SlotReuse,

    /// The tree needs more slots than a flat offset can address.
    #[error("constraint needs {0} storage slots, more than a flat buffer can address")]
    TooLarge(usize),

    /// A constraint type code outside 1..=6.
    #[error("unknown constraint type {0}")]
    UnknownConstraintType(u8),

    /// A result type code outside 1..=2.
    #[error("unknown entity query result type {0}")]
    UnknownResultType(u8),
}
