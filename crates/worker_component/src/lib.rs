//! # worker_component
//!
//! The data a worker exchanges with the runtime, independent of any
//! connection.
//!
//! This crate provides:
//!
//! - [`EntityId`], [`ComponentId`], [`RequestId`]: identifier newtypes.
//! - [`Component`] trait: ties a Rust type to its schema component id.
//! - [`ComponentVtable`] / [`VtableRegistry`]: per-component codecs between
//!   user handles and schema data.
//! - [`ComponentData`], [`ComponentUpdate`], [`CommandRequest`],
//!   [`CommandResponse`]: owned payloads, schema- or handle-backed.
//! - [`Entity`]: the component set of one entity.

pub mod component;
pub mod entity;
pub mod error;
pub mod ids;
pub mod value;
pub mod vtable;

pub use component::{Component, ComponentId};
pub use entity::Entity;
pub use error::VtableError;
pub use ids::{EntityId, RequestId};
pub use value::{
    CommandRequest, CommandResponse, ComponentData, ComponentUpdate, ComponentValue, Payload,
};
pub use vtable::{ComponentVtable, FnCodec, HandleCodec, SchemaRoot, UserHandle, VtableRegistry};
