//! # worker_snapshot
//!
//! Snapshot files: a persisted sequence of entities.
//!
//! This crate provides:
//!
//! - [`SnapshotOutputStream`]: writes entities, serializing user handles
//!   through their registered codecs.
//! - [`SnapshotInputStream`]: reads entities back, as an explicit reader or
//!   an [`Iterator`].
//! - [`SnapshotError`]: I/O, format and codec failures.
//!
//! Both streams register the vtables of their
//! [`SnapshotParameters`](worker_interop::SnapshotParameters) in a callback
//! table when opened and release them when dropped.

pub mod error;
pub mod stream;

pub use error::SnapshotError;
pub use stream::{
    MAX_RECORD_BYTES, SNAPSHOT_MAGIC, SNAPSHOT_VERSION, SnapshotInputStream, SnapshotOutputStream,
};
pub use worker_interop::SnapshotParameters;
