//! # worker_schema
//!
//! Typed access to schema-encoded component data.
//!
//! This crate provides:
//!
//! - [`SchemaObject`]: a field-id keyed table with add/get/count/index/list
//!   accessors for every scalar kind, bytes, strings and nested objects.
//! - [`SchemaComponentData`], [`SchemaComponentUpdate`],
//!   [`SchemaCommandRequest`], [`SchemaCommandResponse`]: the roots that own
//!   object trees.
//! - [`wire`]: the varint/fixed/length-delimited primitives the encoding is
//!   built from.
//! - [`SchemaError`]: serialisation and deserialisation failures.

pub mod component;
pub mod error;
pub mod object;
pub mod wire;

pub use component::{
    SchemaCommandRequest, SchemaCommandResponse, SchemaComponentData, SchemaComponentUpdate,
};
pub use error::SchemaError;
pub use object::{FieldId, MAP_KEY_FIELD_ID, MAP_VALUE_FIELD_ID, MAX_FIELD_ID, SchemaObject};
