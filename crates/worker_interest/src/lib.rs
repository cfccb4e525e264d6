//! # worker_interest
//!
//! Query-based interest for entity templates.
//!
//! This crate provides:
//!
//! - [`InterestConstraint`]: absolute and relative shapes, ids and the
//!   `All`/`Any` combinators.
//! - [`InterestQuery`]: a constraint with a result filter and frequency cap.
//! - [`InterestBuilder`]: accumulates queries per component.
//! - [`InterestSnapshot`]: the built interest, encodable as the [`Interest`]
//!   component's data.

pub mod builder;
pub mod constraint;
pub mod error;
pub mod query;

pub use builder::{Interest, InterestBuilder, InterestSnapshot};
pub use constraint::InterestConstraint;
pub use error::InterestError;
pub use query::{ComponentInterest, InterestQuery};
