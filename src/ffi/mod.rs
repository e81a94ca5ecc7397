//! The `extern "C"` surface, generated into a C header by `cbindgen` at build time (see
//! `build.rs`). The actual `Schema_*` functions live alongside the domain types they operate on
//! (`crate::object::ffi`, `crate::root::ffi`); this module just re-exports them under one
//! namespace plus the ownership-transfer container types they lean on.

pub mod containers;

pub use crate::object::ffi::*;
pub use crate::root::ffi::*;
