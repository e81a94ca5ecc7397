//! A dynamic, arena-backed schema object model and protobuf-compatible wire codec for
//! entity-component state.
//!
//! An `Object` is an ordered multimap from small integer field IDs to typed values; every
//! `Object` reachable from a root shares that root's arena and is freed in one shot when the
//! root is dropped. Four root kinds cover the payloads a peer exchanges: [`CommandRequest`],
//! [`CommandResponse`], [`ComponentData`] and [`ComponentUpdate`].

mod arena;
mod error;
mod field_store;
mod object;
mod root;
mod value;
mod varint;
mod wire;

pub mod ffi;

pub use error::SchemaError;
pub use object::Object;
pub use root::{ClearedFieldList, CommandRequest, CommandResponse, ComponentData, ComponentUpdate};
pub use value::{EntityId, FieldId, SCHEMA_MAP_KEY_FIELD_ID, SCHEMA_MAP_VALUE_FIELD_ID};
