//! # worker_query
//!
//! Constraint algebra for entity queries.
//!
//! This crate provides:
//!
//! - [`Constraint`]: an owned predicate tree with [`Constraint::matches`].
//! - [`ConstraintGraph`]: an index arena that can express shared and cyclic
//!   nodes, with cycle detection and storage sizing.
//! - [`FlatConstraints`]: the single-block layout used on the wire.
//! - [`EntityQuery`]: a constraint plus a [`ResultType`].

pub mod constraint;
pub mod entity_query;
pub mod error;
pub mod flat;
pub mod graph;

pub use constraint::{Constraint, ConstraintType, QueryCandidate};
pub use entity_query::{EntityQuery, FlatEntityQuery, ResultType};
pub use error::QueryError;
pub use flat::{FlatConstraint, FlatConstraints};
pub use graph::{ConstraintGraph, Node, NodeId};
