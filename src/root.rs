//! The four root payload kinds and the cleared-field list that rides alongside a
//! `ComponentUpdate`.
//!
//! Each root owns exactly one [`Arena`] - there is no sharing between roots, and the whole
//! arena is freed as a unit when the root drops. Serialize/merge themselves live on [`Object`]
//! (any object in the tree, not just a root's top-level one, can be serialized or merged into
//! independently); these wrappers just own the arena, the ID(s) of the object(s) that hang
//! directly off it, and the per-root last-error slot.

use crate::field_store::FieldStore;
use crate::value::{FieldId, ObjectId, Value};
use crate::{arena::Arena, object::Object};

/// A command invocation sent to a component. Carries the fields of the command's request
/// type, plus the metadata needed to route and correlate the reply.
pub struct CommandRequest {
	arena: Arena,
	component_id: FieldId,
	command_index: u32,
	fields: ObjectId,
}

/// The reply to a [`CommandRequest`]. Same shape as a request: header metadata plus one
/// top-level `Object` of fields.
pub struct CommandResponse {
	arena: Arena,
	component_id: FieldId,
	command_index: u32,
	fields: ObjectId,
}

/// A snapshot of one component's full state: header metadata plus one top-level `Object`.
pub struct ComponentData {
	arena: Arena,
	component_id: FieldId,
	fields: ObjectId,
}

/// A partial update to a component's state: a `fields` object holding newly-set values, an
/// `events` object holding any events raised alongside the update, and a [`ClearedFieldList`]
/// recording which field IDs the sender explicitly cleared (distinct from simply not
/// mentioning a field).
pub struct ComponentUpdate {
	arena: Arena,
	component_id: FieldId,
	fields: ObjectId,
	events: ObjectId,
	cleared: ClearedFieldList,
}

/// An append-only list of field IDs a `ComponentUpdate` declares explicitly cleared. Lives
/// outside the normal field store (it is never itself wire-encoded as part of `fields`/`events` -
/// transport of the cleared-field list is left to the RPC layer) and, like the rest of the
/// update's state, is allowed to record the same field ID more than once; callers that care
/// about uniqueness dedupe on read.
pub struct ClearedFieldList {
	store: FieldStore,
}

/// Reserved slot the cleared-field list threads its entries through via `FieldStore`'s chain
/// index. The list never holds more than one logical field (every entry collapses onto this
/// key), so the choice of ID is arbitrary.
const CLEARED_SLOT: FieldId = 1;

impl ClearedFieldList {
	fn new() -> Self {
		Self { store: FieldStore::default() }
	}

	/// Records `field_id` as cleared. Does not deduplicate against earlier entries.
	pub fn add(&self, field_id: FieldId) {
		self.store.append(CLEARED_SLOT, Value::Varint(field_id as u64));
	}

	pub fn count(&self) -> u32 {
		self.store.count(CLEARED_SLOT)
	}

	pub fn get(&self, index: u32) -> FieldId {
		match self.store.index(CLEARED_SLOT, index) {
			Some(Value::Varint(raw)) => raw as FieldId,
			_ => 0,
		}
	}

	pub fn to_vec(&self) -> Vec<FieldId> {
		let mut out = Vec::with_capacity(self.count() as usize);
		for i in 0..self.count() {
			out.push(self.get(i));
		}
		out
	}

	pub fn clear(&self) {
		self.store.clear_field(CLEARED_SLOT);
	}
}

macro_rules! last_error_accessor {
	() => {
		/// The message set by the most recent failed `merge_from_buffer` call on any object
		/// belonging to this root, if any. Never cleared by a successful call.
		pub fn last_error(&self) -> Option<std::cell::Ref<'_, str>> {
			self.arena.last_error().message()
		}
	};
}

impl CommandRequest {
	pub fn new(component_id: FieldId, command_index: u32) -> Self {
		let arena = Arena::new();
		let fields = arena.allocate_object();
		Self { arena, component_id, command_index, fields }
	}

	pub fn component_id(&self) -> FieldId {
		self.component_id
	}

	/// 1-based index identifying which command on the component this request invokes.
	pub fn command_index(&self) -> u32 {
		self.command_index
	}

	pub fn fields(&self) -> Object<'_> {
		Object { arena: &self.arena, id: self.fields }
	}

	last_error_accessor!();
}

impl CommandResponse {
	pub fn new(component_id: FieldId, command_index: u32) -> Self {
		let arena = Arena::new();
		let fields = arena.allocate_object();
		Self { arena, component_id, command_index, fields }
	}

	pub fn component_id(&self) -> FieldId {
		self.component_id
	}

	pub fn command_index(&self) -> u32 {
		self.command_index
	}

	pub fn fields(&self) -> Object<'_> {
		Object { arena: &self.arena, id: self.fields }
	}

	last_error_accessor!();
}

impl ComponentData {
	pub fn new(component_id: FieldId) -> Self {
		let arena = Arena::new();
		let fields = arena.allocate_object();
		Self { arena, component_id, fields }
	}

	pub fn component_id(&self) -> FieldId {
		self.component_id
	}

	pub fn fields(&self) -> Object<'_> {
		Object { arena: &self.arena, id: self.fields }
	}

	last_error_accessor!();
}

impl ComponentUpdate {
	pub fn new(component_id: FieldId) -> Self {
		let arena = Arena::new();
		let fields = arena.allocate_object();
		let events = arena.allocate_object();
		Self { arena, component_id, fields, events, cleared: ClearedFieldList::new() }
	}

	pub fn component_id(&self) -> FieldId {
		self.component_id
	}

	pub fn fields(&self) -> Object<'_> {
		Object { arena: &self.arena, id: self.fields }
	}

	pub fn events(&self) -> Object<'_> {
		Object { arena: &self.arena, id: self.events }
	}

	pub fn cleared_fields(&self) -> &ClearedFieldList {
		&self.cleared
	}

	last_error_accessor!();
}

/// The `extern "C"` shim over the four root kinds: lifecycle (create/destroy), root-to-object
/// navigation, and the cleared-field list. Each root is
/// exposed as a boxed, heap-stable pointer (the root owns its arena and everything hanging off
/// it, so unlike `Object` it has a genuinely stable address to hand out).
pub mod ffi {
	use super::{ClearedFieldList, CommandRequest, CommandResponse, ComponentData, ComponentUpdate};
	use crate::object::ffi::ObjectHandle;
	use crate::value::FieldId;
	use std::os::raw::c_char;

	#[no_mangle]
	pub extern "C" fn Schema_CreateCommandRequest(component_id: FieldId, command_index: u32) -> *mut CommandRequest {
		std::boxed::Box::into_raw(std::boxed::Box::new(CommandRequest::new(component_id, command_index)))
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_DestroyCommandRequest(handle: *mut CommandRequest) {
		if !handle.is_null() {
			drop(unsafe { std::boxed::Box::from_raw(handle) });
		}
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandRequestObject(handle: *const CommandRequest) -> ObjectHandle {
		unsafe { &*handle }.fields().into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandRequestComponentId(handle: *const CommandRequest) -> FieldId {
		unsafe { &*handle }.component_id()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandRequestCommandIndex(handle: *const CommandRequest) -> u32 {
		unsafe { &*handle }.command_index()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandRequestLastError(handle: *const CommandRequest) -> *const c_char {
		unsafe { &*handle }.arena.last_error().as_c_str()
	}

	#[no_mangle]
	pub extern "C" fn Schema_CreateCommandResponse(component_id: FieldId, command_index: u32) -> *mut CommandResponse {
		std::boxed::Box::into_raw(std::boxed::Box::new(CommandResponse::new(component_id, command_index)))
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_DestroyCommandResponse(handle: *mut CommandResponse) {
		if !handle.is_null() {
			drop(unsafe { std::boxed::Box::from_raw(handle) });
		}
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandResponseObject(handle: *const CommandResponse) -> ObjectHandle {
		unsafe { &*handle }.fields().into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandResponseComponentId(handle: *const CommandResponse) -> FieldId {
		unsafe { &*handle }.component_id()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandResponseCommandIndex(handle: *const CommandResponse) -> u32 {
		unsafe { &*handle }.command_index()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetCommandResponseLastError(handle: *const CommandResponse) -> *const c_char {
		unsafe { &*handle }.arena.last_error().as_c_str()
	}

	#[no_mangle]
	pub extern "C" fn Schema_CreateComponentData(component_id: FieldId) -> *mut ComponentData {
		std::boxed::Box::into_raw(std::boxed::Box::new(ComponentData::new(component_id)))
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_DestroyComponentData(handle: *mut ComponentData) {
		if !handle.is_null() {
			drop(unsafe { std::boxed::Box::from_raw(handle) });
		}
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentDataObject(handle: *const ComponentData) -> ObjectHandle {
		unsafe { &*handle }.fields().into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentDataComponentId(handle: *const ComponentData) -> FieldId {
		unsafe { &*handle }.component_id()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentDataLastError(handle: *const ComponentData) -> *const c_char {
		unsafe { &*handle }.arena.last_error().as_c_str()
	}

	#[no_mangle]
	pub extern "C" fn Schema_CreateComponentUpdate(component_id: FieldId) -> *mut ComponentUpdate {
		std::boxed::Box::into_raw(std::boxed::Box::new(ComponentUpdate::new(component_id)))
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_DestroyComponentUpdate(handle: *mut ComponentUpdate) {
		if !handle.is_null() {
			drop(unsafe { std::boxed::Box::from_raw(handle) });
		}
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentUpdateFields(handle: *const ComponentUpdate) -> ObjectHandle {
		unsafe { &*handle }.fields().into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentUpdateEvents(handle: *const ComponentUpdate) -> ObjectHandle {
		unsafe { &*handle }.events().into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentUpdateComponentId(handle: *const ComponentUpdate) -> FieldId {
		unsafe { &*handle }.component_id()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetComponentUpdateLastError(handle: *const ComponentUpdate) -> *const c_char {
		unsafe { &*handle }.arena.last_error().as_c_str()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_AddClearedField(handle: *const ComponentUpdate, field_id: FieldId) {
		unsafe { &*handle }.cleared_fields().add(field_id);
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_ClearClearedFields(handle: *const ComponentUpdate) {
		unsafe { &*handle }.cleared_fields().clear();
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetClearedFieldCount(handle: *const ComponentUpdate) -> u32 {
		unsafe { &*handle }.cleared_fields().count()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_IndexClearedField(handle: *const ComponentUpdate, index: u32) -> FieldId {
		unsafe { &*handle }.cleared_fields().get(index)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetClearedFieldList(handle: *const ComponentUpdate, out: *mut FieldId, out_len: usize) -> usize {
		let list: &ClearedFieldList = unsafe { &*handle }.cleared_fields();
		let values = list.to_vec();
		let n = values.len().min(out_len);
		if n > 0 && !out.is_null() {
			unsafe { std::ptr::copy_nonoverlapping(values.as_ptr(), out, n) };
		}
		values.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn command_request_round_trip() {
		let req = CommandRequest::new(12, 1);
		req.fields().add_int32(1, 99);
		let len = req.fields().write_buffer_length();
		let mut buf = vec![0u8; len];
		req.fields().write_to_buffer(&mut buf);

		let dst = CommandRequest::new(12, 1);
		assert!(dst.fields().merge_from_buffer(&buf));
		assert_eq!(dst.fields().get_int32(1), 99);
		assert!(dst.last_error().is_none());
	}

	#[test]
	fn merge_failure_sets_last_error() {
		let dst = ComponentData::new(3);
		let bad = [0x00u8]; // field id 0 is reserved
		assert!(!dst.fields().merge_from_buffer(&bad));
		assert!(dst.last_error().is_some());
	}

	#[test]
	fn component_update_cleared_field_list_is_independent_of_fields() {
		let update = ComponentUpdate::new(7);
		update.fields().add_int32(4, 1);
		update.cleared_fields().add(4);
		update.cleared_fields().add(4);
		assert_eq!(update.cleared_fields().count(), 2);
		assert_eq!(update.cleared_fields().get(0), 4);
		assert_eq!(update.cleared_fields().get(1), 4);
		// The cleared list and the fields object are fully independent: recording a field ID
		// as cleared does not touch the actual field store.
		assert_eq!(update.fields().get_int32_count(4), 1);
	}

	#[test]
	fn component_update_fields_and_events_are_distinct_objects() {
		let update = ComponentUpdate::new(1);
		update.fields().add_int32(1, 10);
		update.events().add_int32(1, 20);
		assert_eq!(update.fields().get_int32(1), 10);
		assert_eq!(update.events().get_int32(1), 20);
	}
}
