//! The safe, ergonomic surface over a field store: `Add`/`Get`/`Index`/`Clear`/`ShallowCopy`
//! plus the arena escape hatches (`AllocateObject`, `AllocateBuffer`).

use crate::arena::Arena;
use crate::field_store::FieldStore;
use crate::value::{
	BytesView, EntityId, FieldId, ObjectId, PackedKind, PackedListView, Value,
};
use crate::varint::{zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64};

/// A node in the object tree: an ordered multimap from field ID to typed values, borrowed
/// from the arena that owns it. `Copy` - it's just an `(&'a Arena, ObjectId)` pair, not a
/// pointer into moveable storage.
#[derive(Copy, Clone)]
pub struct Object<'a> {
	pub(crate) arena: &'a Arena,
	pub(crate) id: ObjectId,
}

impl<'a> Object<'a> {
	#[inline]
	fn store(&self) -> std::cell::Ref<'a, FieldStore> {
		self.arena.field_store(self.id)
	}

	/// Allocates an orphaned `Object` owned by the same root as `self`, reachable only if the
	/// caller stores its handle somewhere.
	pub fn allocate_object(&self) -> Object<'a> {
		Object { arena: self.arena, id: self.arena.allocate_object() }
	}

	/// Allocates `len` zero-initialized bytes from the arena owned by this object's root,
	/// for staging a buffer that will outlive the root (e.g. before `merge_from_buffer`).
	pub fn allocate_buffer(&self, len: usize) -> &'a mut [u8] {
		self.arena.allocate_buffer(len)
	}

	/// Removes every entry from this object, leaving it allocated but empty.
	pub fn clear(&self) {
		self.store().clear();
	}

	/// Removes every entry with the given field ID.
	pub fn clear_field(&self, field_id: FieldId) {
		self.store().clear_field(field_id);
	}

	pub fn unique_field_id_count(&self) -> usize {
		self.store().unique_field_id_count()
	}

	/// Sorted, deduplicated field IDs present on this object.
	pub fn unique_field_ids(&self) -> Vec<FieldId> {
		self.store().unique_field_ids()
	}

	/// Appends copies of every live entry of `self` onto `dst`. No-op if `self` and `dst` are
	/// the same object or belong to different roots.
	pub fn shallow_copy_to(&self, dst: &Object<'a>) {
		if !std::ptr::eq(self.arena, dst.arena) || self.id == dst.id {
			return;
		}
		for (id, value) in self.store().live_entries() {
			dst.store().append(id, value);
		}
	}

	/// Like [`Self::shallow_copy_to`], but only for entries matching `field_id`.
	pub fn shallow_copy_field_to(&self, dst: &Object<'a>, field_id: FieldId) {
		if !std::ptr::eq(self.arena, dst.arena) || self.id == dst.id {
			return;
		}
		let mut values = Vec::new();
		self.store().collect_into(field_id, &mut values);
		for value in values {
			dst.store().append(field_id, value);
		}
	}

	// -- Serialize / merge -------------------------------------------------------------------

	/// Number of bytes [`Self::write_to_buffer`] will write for this object's subtree.
	pub fn write_buffer_length(&self) -> usize {
		crate::wire::write_buffer_length(self.arena, self.id)
	}

	/// Serializes this object's subtree into `buf`, which must be at least
	/// [`Self::write_buffer_length`] bytes. Returns the number of bytes written.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn write_to_buffer(&self, buf: &mut [u8]) -> usize {
		crate::wire::write_to_buffer(self.arena, self.id, buf)
	}

	/// Merges the wire-encoded fields in `buf` into this object, in field-declaration order
	/// (later entries for a repeated field are appended after any already present). `buf` is
	/// aliased, not copied - the caller must keep it alive for this object's root's lifetime.
	///
	/// On failure, any entries parsed before the error was hit are already appended (merge does
	/// not buffer and commit atomically, matching ordinary streaming-decoder behavior); the
	/// owning root's last-error slot is set and this returns `false`.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn merge_from_buffer(&self, buf: &[u8]) -> bool {
		let result = crate::wire::validate_nesting_depth(buf).and_then(|()| crate::wire::merge_object(self.arena, self.id, buf));
		match result {
			Ok(()) => true,
			Err(err) => {
				self.arena.last_error().set(err);
				false
			}
		}
	}

	pub(crate) fn append_raw(&self, field_id: FieldId, value: Value) {
		self.store().append(field_id, value);
	}

	pub(crate) fn last_raw(&self, field_id: FieldId) -> Option<Value> {
		self.store().last(field_id)
	}

	pub(crate) fn index_raw(&self, field_id: FieldId, index: u32) -> Option<Value> {
		self.store().index(field_id, index)
	}

	pub(crate) fn count_raw(&self, field_id: FieldId) -> u32 {
		self.store().count(field_id)
	}

	pub(crate) fn collect_raw(&self, field_id: FieldId) -> Vec<Value> {
		let mut out = Vec::new();
		self.store().collect_into(field_id, &mut out);
		out
	}

	// Packed-scalar-aware variants of the four helpers above: a merged length-delimited entry
	// (stored as a raw `Value::Bytes` span - see wire.rs) is additionally reinterpreted as a
	// packed list of `kind`, so a scalar family's accessors see it the same as a directly
	// `AddXList`-built `Value::PackedList` entry.

	pub(crate) fn last_raw_as(&self, field_id: FieldId, kind: PackedKind) -> Option<Value> {
		self.store().last_as(field_id, kind)
	}

	pub(crate) fn index_raw_as(&self, field_id: FieldId, index: u32, kind: PackedKind) -> Option<Value> {
		self.store().index_as(field_id, index, kind)
	}

	pub(crate) fn count_raw_as(&self, field_id: FieldId, kind: PackedKind) -> u32 {
		self.store().count_as(field_id, kind)
	}

	pub(crate) fn collect_raw_as(&self, field_id: FieldId, kind: PackedKind) -> Vec<Value> {
		let mut out = Vec::new();
		self.store().collect_into_as(field_id, kind, &mut out);
		out
	}

	// -- Bytes -----------------------------------------------------------------------------

	pub fn add_bytes(&self, field_id: FieldId, data: &[u8]) {
		self.append_raw(field_id, Value::Bytes(BytesView { ptr: data.as_ptr(), len: data.len() as u32 }));
	}

	pub fn get_bytes_count(&self, field_id: FieldId) -> u32 {
		self.count_raw(field_id)
	}

	pub fn get_bytes_length(&self, field_id: FieldId) -> u32 {
		self.get_bytes(field_id).len() as u32
	}

	pub fn get_bytes(&self, field_id: FieldId) -> &'a [u8] {
		match self.last_raw(field_id) {
			Some(Value::Bytes(view)) => unsafe { view.as_slice() },
			_ => &[],
		}
	}

	pub fn index_bytes_length(&self, field_id: FieldId, index: u32) -> u32 {
		self.index_bytes(field_id, index).len() as u32
	}

	pub fn index_bytes(&self, field_id: FieldId, index: u32) -> &'a [u8] {
		match self.index_raw(field_id, index) {
			Some(Value::Bytes(view)) => unsafe { view.as_slice() },
			_ => &[],
		}
	}

	// -- Object ------------------------------------------------------------------------------

	/// Appends a freshly allocated child object under `field_id` and returns it.
	pub fn add_object(&self, field_id: FieldId) -> Object<'a> {
		let child = self.allocate_object();
		self.append_raw(field_id, Value::Object(child.id));
		child
	}

	pub fn get_object_count(&self, field_id: FieldId) -> u32 {
		self.count_raw(field_id)
	}

	/// Returns the last child object under `field_id`, or a canonical empty object if the
	/// field is absent. Repeated calls for the same `(parent, field_id)` pair while the field
	/// stays absent return the *same* empty object (see `FieldStore::canonical_empty_existing`),
	/// not a fresh orphan each time.
	pub fn get_object(&self, field_id: FieldId) -> Object<'a> {
		match self.last_raw(field_id) {
			Some(Value::Object(id)) => Object { arena: self.arena, id },
			Some(Value::Bytes(view)) => self.parse_merged_object(view),
			_ => Object { arena: self.arena, id: self.canonical_empty_object(field_id) },
		}
	}

	pub fn index_object(&self, field_id: FieldId, index: u32) -> Object<'a> {
		match self.index_raw(field_id, index) {
			Some(Value::Object(id)) => Object { arena: self.arena, id },
			Some(Value::Bytes(view)) => self.parse_merged_object(view),
			_ => Object { arena: self.arena, id: self.canonical_empty_object(field_id) },
		}
	}

	/// Looks up (or, on first call for this `field_id`, allocates and records) the memoized
	/// empty-object placeholder. Split into a lookup and a separate allocate-then-insert step so
	/// the `arena.objects` borrow taken by `Arena::allocate_object` never overlaps the
	/// `FieldStore` borrow taken by `self.store()` - `self.store()` borrows the same `RefCell`
	/// that backs every `FieldStore` in the arena, so holding it across an allocation would
	/// panic with a `BorrowMutError`.
	fn canonical_empty_object(&self, field_id: FieldId) -> ObjectId {
		if let Some(id) = self.store().canonical_empty_existing(field_id) {
			return id;
		}
		let new_id = self.arena.allocate_object();
		self.store().canonical_empty_insert(field_id, new_id)
	}

	/// A merged length-delimited field arrives as an undifferentiated `Value::Bytes` span (see
	/// `wire::merge_object`). Reinterpreting it as a child object is done here, lazily, on the
	/// first call that actually asks for it as one - a fresh arena object is parsed each call,
	/// which is cheap relative to eagerly parsing every length-delimited field as an object
	/// during merge regardless of whether the caller ever reads it that way.
	fn parse_merged_object(&self, view: BytesView) -> Object<'a> {
		let child = self.allocate_object();
		let bytes = unsafe { view.as_slice() };
		let _ = crate::wire::merge_object(self.arena, child.id, bytes);
		child
	}

	// -- Packed-list construction helpers -----------------------------------------------------

	fn add_packed_alias<T>(&self, field_id: FieldId, values: &[T], kind: PackedKind) {
		self.append_raw(
			field_id,
			Value::PackedList(PackedListView {
				ptr: values.as_ptr() as *const u8,
				count: values.len() as u32,
				kind,
			}),
		);
	}

	fn add_packed_zigzag32(&self, field_id: FieldId, values: &[i32]) {
		let encoded: Vec<u32> = values.iter().map(|&v| zigzag_encode32(v)).collect();
		let owned = self.arena.alloc_slice_copy(&encoded);
		self.append_raw(
			field_id,
			Value::PackedList(PackedListView { ptr: owned.as_ptr() as *const u8, count: owned.len() as u32, kind: PackedKind::Varint32 }),
		);
	}

	fn add_packed_zigzag64(&self, field_id: FieldId, values: &[i64]) {
		let encoded: Vec<u64> = values.iter().map(|&v| zigzag_encode64(v)).collect();
		let owned = self.arena.alloc_slice_copy(&encoded);
		self.append_raw(
			field_id,
			Value::PackedList(PackedListView { ptr: owned.as_ptr() as *const u8, count: owned.len() as u32, kind: PackedKind::Varint64 }),
		);
	}
}

/// Generates the `AddX`/`GetXCount`/`GetX`/`IndexX`/`GetXList` family for a scalar type whose
/// in-memory representation is a raw `Value::Varint` and whose list form aliases the caller's
/// buffer with no transform (every varint family except the two `sint` ones). `$suffix` is the
/// snake_case name fragment shared by all six generated methods, e.g. `int32` for `add_int32`.
macro_rules! varint_family {
	($suffix:ident, $Ty:ty, $kind:expr, $enc:expr, $dec:expr) => {
		paste::paste! {
			impl<'a> Object<'a> {
				pub fn [<add_ $suffix>](&self, field_id: FieldId, value: $Ty) {
					let encode: fn($Ty) -> u64 = $enc;
					self.append_raw(field_id, Value::Varint(encode(value)));
				}

				pub fn [<add_ $suffix _list>](&self, field_id: FieldId, values: &[$Ty]) {
					self.add_packed_alias(field_id, values, $kind);
				}

				pub fn [<get_ $suffix _count>](&self, field_id: FieldId) -> u32 {
					self.count_raw_as(field_id, $kind)
				}

				pub fn [<get_ $suffix>](&self, field_id: FieldId) -> $Ty {
					let decode: fn(u64) -> $Ty = $dec;
					match self.last_raw_as(field_id, $kind) {
						Some(Value::Varint(raw)) => decode(raw),
						_ => <$Ty>::default(),
					}
				}

				pub fn [<index_ $suffix>](&self, field_id: FieldId, index: u32) -> $Ty {
					let decode: fn(u64) -> $Ty = $dec;
					match self.index_raw_as(field_id, index, $kind) {
						Some(Value::Varint(raw)) => decode(raw),
						_ => <$Ty>::default(),
					}
				}

				pub fn [<get_ $suffix _list>](&self, field_id: FieldId, out: &mut Vec<$Ty>) {
					let decode: fn(u64) -> $Ty = $dec;
					for value in self.collect_raw_as(field_id, $kind) {
						if let Value::Varint(raw) = value {
							out.push(decode(raw));
						}
					}
				}
			}
		}
	};
}

/// Generates the family for a `fixed32`-shaped scalar (`Value::Fixed32` storage).
macro_rules! fixed32_family {
	($suffix:ident, $Ty:ty, $enc:expr, $dec:expr) => {
		paste::paste! {
			impl<'a> Object<'a> {
				pub fn [<add_ $suffix>](&self, field_id: FieldId, value: $Ty) {
					let encode: fn($Ty) -> u32 = $enc;
					self.append_raw(field_id, Value::Fixed32(encode(value)));
				}

				pub fn [<add_ $suffix _list>](&self, field_id: FieldId, values: &[$Ty]) {
					self.add_packed_alias(field_id, values, PackedKind::Fixed32);
				}

				pub fn [<get_ $suffix _count>](&self, field_id: FieldId) -> u32 {
					self.count_raw_as(field_id, PackedKind::Fixed32)
				}

				pub fn [<get_ $suffix>](&self, field_id: FieldId) -> $Ty {
					let decode: fn(u32) -> $Ty = $dec;
					match self.last_raw_as(field_id, PackedKind::Fixed32) {
						Some(Value::Fixed32(raw)) => decode(raw),
						_ => <$Ty>::default(),
					}
				}

				pub fn [<index_ $suffix>](&self, field_id: FieldId, index: u32) -> $Ty {
					let decode: fn(u32) -> $Ty = $dec;
					match self.index_raw_as(field_id, index, PackedKind::Fixed32) {
						Some(Value::Fixed32(raw)) => decode(raw),
						_ => <$Ty>::default(),
					}
				}

				pub fn [<get_ $suffix _list>](&self, field_id: FieldId, out: &mut Vec<$Ty>) {
					let decode: fn(u32) -> $Ty = $dec;
					for value in self.collect_raw_as(field_id, PackedKind::Fixed32) {
						if let Value::Fixed32(raw) = value {
							out.push(decode(raw));
						}
					}
				}
			}
		}
	};
}

/// Generates the family for a `fixed64`-shaped scalar (`Value::Fixed64` storage).
macro_rules! fixed64_family {
	($suffix:ident, $Ty:ty, $enc:expr, $dec:expr) => {
		paste::paste! {
			impl<'a> Object<'a> {
				pub fn [<add_ $suffix>](&self, field_id: FieldId, value: $Ty) {
					let encode: fn($Ty) -> u64 = $enc;
					self.append_raw(field_id, Value::Fixed64(encode(value)));
				}

				pub fn [<add_ $suffix _list>](&self, field_id: FieldId, values: &[$Ty]) {
					self.add_packed_alias(field_id, values, PackedKind::Fixed64);
				}

				pub fn [<get_ $suffix _count>](&self, field_id: FieldId) -> u32 {
					self.count_raw_as(field_id, PackedKind::Fixed64)
				}

				pub fn [<get_ $suffix>](&self, field_id: FieldId) -> $Ty {
					let decode: fn(u64) -> $Ty = $dec;
					match self.last_raw_as(field_id, PackedKind::Fixed64) {
						Some(Value::Fixed64(raw)) => decode(raw),
						_ => <$Ty>::default(),
					}
				}

				pub fn [<index_ $suffix>](&self, field_id: FieldId, index: u32) -> $Ty {
					let decode: fn(u64) -> $Ty = $dec;
					match self.index_raw_as(field_id, index, PackedKind::Fixed64) {
						Some(Value::Fixed64(raw)) => decode(raw),
						_ => <$Ty>::default(),
					}
				}

				pub fn [<get_ $suffix _list>](&self, field_id: FieldId, out: &mut Vec<$Ty>) {
					let decode: fn(u64) -> $Ty = $dec;
					for value in self.collect_raw_as(field_id, PackedKind::Fixed64) {
						if let Value::Fixed64(raw) = value {
							out.push(decode(raw));
						}
					}
				}
			}
		}
	};
}

varint_family!(int32, i32, PackedKind::Varint32, |v| v as u32 as u64, |raw| raw as u32 as i32);
varint_family!(uint32, u32, PackedKind::Varint32, |v| v as u64, |raw| raw as u32);
varint_family!(int64, i64, PackedKind::Varint64, |v| v as u64, |raw| raw as i64);
varint_family!(uint64, u64, PackedKind::Varint64, |v| v, |raw| raw);
varint_family!(bool, bool, PackedKind::Bool, |v| v as u64, |raw| raw != 0);
varint_family!(entity_id, EntityId, PackedKind::Varint64, |v| v as u64, |raw| raw as i64);

// `enum` is a reserved keyword, so this family is spelled out by hand rather than through
// `varint_family!`'s identifier concatenation.
impl<'a> Object<'a> {
	pub fn add_enum(&self, field_id: FieldId, value: u32) {
		self.append_raw(field_id, Value::Varint(value as u64));
	}

	pub fn add_enum_list(&self, field_id: FieldId, values: &[u32]) {
		self.add_packed_alias(field_id, values, PackedKind::Varint32);
	}

	pub fn get_enum_count(&self, field_id: FieldId) -> u32 {
		self.count_raw_as(field_id, PackedKind::Varint32)
	}

	pub fn get_enum(&self, field_id: FieldId) -> u32 {
		match self.last_raw_as(field_id, PackedKind::Varint32) {
			Some(Value::Varint(raw)) => raw as u32,
			_ => 0,
		}
	}

	pub fn index_enum(&self, field_id: FieldId, index: u32) -> u32 {
		match self.index_raw_as(field_id, index, PackedKind::Varint32) {
			Some(Value::Varint(raw)) => raw as u32,
			_ => 0,
		}
	}

	pub fn get_enum_list(&self, field_id: FieldId, out: &mut Vec<u32>) {
		for value in self.collect_raw_as(field_id, PackedKind::Varint32) {
			if let Value::Varint(raw) = value {
				out.push(raw as u32);
			}
		}
	}
}

fixed32_family!(fixed32, u32, |v| v, |raw| raw);
fixed32_family!(sfixed32, i32, |v| v as u32, |raw| raw as i32);
fixed32_family!(float, f32, |v: f32| v.to_bits(), |raw: u32| f32::from_bits(raw));

fixed64_family!(fixed64, u64, |v| v, |raw| raw);
fixed64_family!(sfixed64, i64, |v| v as u64, |raw| raw as i64);
fixed64_family!(double, f64, |v: f64| v.to_bits(), |raw: u64| f64::from_bits(raw));

// sint32/sint64 share varint storage but need a zigzag-decode at read time and (for lists) a
// zigzag-encode at write time, which precludes the zero-copy alias the other varint families
// use for AddXList (see DESIGN.md).
impl<'a> Object<'a> {
	pub fn add_sint32(&self, field_id: FieldId, value: i32) {
		self.append_raw(field_id, Value::Varint(zigzag_encode32(value) as u64));
	}

	pub fn add_sint32_list(&self, field_id: FieldId, values: &[i32]) {
		self.add_packed_zigzag32(field_id, values);
	}

	pub fn get_sint32_count(&self, field_id: FieldId) -> u32 {
		self.count_raw_as(field_id, PackedKind::Varint32)
	}

	pub fn get_sint32(&self, field_id: FieldId) -> i32 {
		match self.last_raw_as(field_id, PackedKind::Varint32) {
			Some(Value::Varint(raw)) => zigzag_decode32(raw as u32),
			_ => 0,
		}
	}

	pub fn index_sint32(&self, field_id: FieldId, index: u32) -> i32 {
		match self.index_raw_as(field_id, index, PackedKind::Varint32) {
			Some(Value::Varint(raw)) => zigzag_decode32(raw as u32),
			_ => 0,
		}
	}

	pub fn get_sint32_list(&self, field_id: FieldId, out: &mut Vec<i32>) {
		for value in self.collect_raw_as(field_id, PackedKind::Varint32) {
			if let Value::Varint(raw) = value {
				out.push(zigzag_decode32(raw as u32));
			}
		}
	}

	pub fn add_sint64(&self, field_id: FieldId, value: i64) {
		self.append_raw(field_id, Value::Varint(zigzag_encode64(value)));
	}

	pub fn add_sint64_list(&self, field_id: FieldId, values: &[i64]) {
		self.add_packed_zigzag64(field_id, values);
	}

	pub fn get_sint64_count(&self, field_id: FieldId) -> u32 {
		self.count_raw_as(field_id, PackedKind::Varint64)
	}

	pub fn get_sint64(&self, field_id: FieldId) -> i64 {
		match self.last_raw_as(field_id, PackedKind::Varint64) {
			Some(Value::Varint(raw)) => zigzag_decode64(raw),
			_ => 0,
		}
	}

	pub fn index_sint64(&self, field_id: FieldId, index: u32) -> i64 {
		match self.index_raw_as(field_id, index, PackedKind::Varint64) {
			Some(Value::Varint(raw)) => zigzag_decode64(raw),
			_ => 0,
		}
	}

	pub fn get_sint64_list(&self, field_id: FieldId, out: &mut Vec<i64>) {
		for value in self.collect_raw_as(field_id, PackedKind::Varint64) {
			if let Value::Varint(raw) = value {
				out.push(zigzag_decode64(raw));
			}
		}
	}
}

/// The `extern "C"` shim over [`Object`]. Every function here is a thin, panic-free wrapper
/// that resolves an [`ffi::ObjectHandle`] back into a borrowed `Object` and forwards to the
/// safe method of the same shape, following the `ffi::containers` convention of exposing
/// ownership-transfer types (`Box<T>`, `Slice`, `BoxSlice`) at the boundary rather than
/// re-deriving safety there.
pub mod ffi {
	use super::Object;
	use crate::arena::Arena;
	use crate::value::{EntityId, FieldId, ObjectId};

	/// Opaque handle to an object node. A stable `(arena, id)` pair rather than a raw pointer to
	/// the node itself, since `Object` nodes live inside an arena-owned `Vec` and are identified
	/// by index, not by address (see arena.rs). Valid for as long as the owning root is alive.
	#[repr(C)]
	#[derive(Copy, Clone)]
	pub struct ObjectHandle {
		arena: *const Arena,
		id: u32,
	}

	impl<'a> From<Object<'a>> for ObjectHandle {
		fn from(obj: Object<'a>) -> Self {
			ObjectHandle { arena: obj.arena as *const Arena, id: obj.id.0 }
		}
	}

	impl ObjectHandle {
		/// # Safety
		/// `self` must have been produced from a root that is still alive.
		unsafe fn resolve<'a>(self) -> Object<'a> {
			Object { arena: unsafe { &*self.arena }, id: ObjectId(self.id) }
		}
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_AllocateObject(obj: ObjectHandle) -> ObjectHandle {
		unsafe { obj.resolve() }.allocate_object().into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_AllocateBuffer(obj: ObjectHandle, len: usize) -> *mut u8 {
		unsafe { obj.resolve() }.allocate_buffer(len).as_mut_ptr()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_Clear(obj: ObjectHandle) {
		unsafe { obj.resolve() }.clear();
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_ClearField(obj: ObjectHandle, field_id: FieldId) {
		unsafe { obj.resolve() }.clear_field(field_id);
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetUniqueFieldIdCount(obj: ObjectHandle) -> usize {
		unsafe { obj.resolve() }.unique_field_id_count()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetUniqueFieldIds(obj: ObjectHandle, out: *mut FieldId, out_len: usize) -> usize {
		let ids = unsafe { obj.resolve() }.unique_field_ids();
		let n = ids.len().min(out_len);
		if n > 0 && !out.is_null() {
			unsafe { std::ptr::copy_nonoverlapping(ids.as_ptr(), out, n) };
		}
		ids.len()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_ShallowCopy(src: ObjectHandle, dst: ObjectHandle) {
		unsafe { src.resolve() }.shallow_copy_to(&unsafe { dst.resolve() });
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_ShallowCopyField(src: ObjectHandle, dst: ObjectHandle, field_id: FieldId) {
		unsafe { src.resolve() }.shallow_copy_field_to(&unsafe { dst.resolve() }, field_id);
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetWriteBufferLength(obj: ObjectHandle) -> usize {
		unsafe { obj.resolve() }.write_buffer_length()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_WriteToBuffer(obj: ObjectHandle, buf: *mut u8, len: usize) -> usize {
		if buf.is_null() {
			return 0;
		}
		let slice = unsafe { std::slice::from_raw_parts_mut(buf, len) };
		unsafe { obj.resolve() }.write_to_buffer(slice)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_MergeFromBuffer(obj: ObjectHandle, buf: *const u8, len: usize) -> bool {
		if buf.is_null() {
			return false;
		}
		let slice = unsafe { std::slice::from_raw_parts(buf, len) };
		unsafe { obj.resolve() }.merge_from_buffer(slice)
	}

	// -- Bytes ---------------------------------------------------------------------------------

	#[no_mangle]
	pub unsafe extern "C" fn Schema_AddBytes(obj: ObjectHandle, field_id: FieldId, data: *const u8, len: usize) {
		let slice = unsafe { std::slice::from_raw_parts(data, len) };
		unsafe { obj.resolve() }.add_bytes(field_id, slice);
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetBytesCount(obj: ObjectHandle, field_id: FieldId) -> u32 {
		unsafe { obj.resolve() }.get_bytes_count(field_id)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetBytesLength(obj: ObjectHandle, field_id: FieldId) -> u32 {
		unsafe { obj.resolve() }.get_bytes_length(field_id)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetBytes(obj: ObjectHandle, field_id: FieldId) -> crate::ffi::containers::Slice<'static, u8> {
		unsafe { obj.resolve() }.get_bytes(field_id).into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_IndexBytesLength(obj: ObjectHandle, field_id: FieldId, index: u32) -> u32 {
		unsafe { obj.resolve() }.index_bytes_length(field_id, index)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_IndexBytes(obj: ObjectHandle, field_id: FieldId, index: u32) -> crate::ffi::containers::Slice<'static, u8> {
		unsafe { obj.resolve() }.index_bytes(field_id, index).into()
	}

	// -- Object ----------------------------------------------------------------------------------

	#[no_mangle]
	pub unsafe extern "C" fn Schema_AddObject(obj: ObjectHandle, field_id: FieldId) -> ObjectHandle {
		unsafe { obj.resolve() }.add_object(field_id).into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetObjectCount(obj: ObjectHandle, field_id: FieldId) -> u32 {
		unsafe { obj.resolve() }.get_object_count(field_id)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetObject(obj: ObjectHandle, field_id: FieldId) -> ObjectHandle {
		unsafe { obj.resolve() }.get_object(field_id).into()
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_IndexObject(obj: ObjectHandle, field_id: FieldId, index: u32) -> ObjectHandle {
		unsafe { obj.resolve() }.index_object(field_id, index).into()
	}

	/// Generates the four lifecycle/accessor functions plus `GetXList` for one scalar family,
	/// forwarding to the safe method of the same name on `Object`. `$Camel` is the C-visible
	/// name fragment (`Int32` in `Schema_AddInt32`); `$snake` is the `Object` method fragment
	/// (`int32` in `add_int32`).
	macro_rules! scalar_family {
		($Camel:ident, $snake:ident, $Ty:ty) => {
			paste::paste! {
				#[no_mangle]
				pub unsafe extern "C" fn [<Schema_Add $Camel>](obj: ObjectHandle, field_id: FieldId, value: $Ty) {
					unsafe { obj.resolve() }.[<add_ $snake>](field_id, value);
				}

				#[no_mangle]
				pub unsafe extern "C" fn [<Schema_Add $Camel List>](obj: ObjectHandle, field_id: FieldId, values: *const $Ty, count: usize) {
					let slice = unsafe { std::slice::from_raw_parts(values, count) };
					unsafe { obj.resolve() }.[<add_ $snake _list>](field_id, slice);
				}

				#[no_mangle]
				pub unsafe extern "C" fn [<Schema_Get $Camel Count>](obj: ObjectHandle, field_id: FieldId) -> u32 {
					unsafe { obj.resolve() }.[<get_ $snake _count>](field_id)
				}

				#[no_mangle]
				pub unsafe extern "C" fn [<Schema_Get $Camel>](obj: ObjectHandle, field_id: FieldId) -> $Ty {
					unsafe { obj.resolve() }.[<get_ $snake>](field_id)
				}

				#[no_mangle]
				pub unsafe extern "C" fn [<Schema_Index $Camel>](obj: ObjectHandle, field_id: FieldId, index: u32) -> $Ty {
					unsafe { obj.resolve() }.[<index_ $snake>](field_id, index)
				}

				#[no_mangle]
				pub unsafe extern "C" fn [<Schema_Get $Camel List>](obj: ObjectHandle, field_id: FieldId, out: *mut $Ty, out_len: usize) -> usize {
					let mut values = Vec::new();
					unsafe { obj.resolve() }.[<get_ $snake _list>](field_id, &mut values);
					let n = values.len().min(out_len);
					if n > 0 && !out.is_null() {
						unsafe { std::ptr::copy_nonoverlapping(values.as_ptr(), out, n) };
					}
					values.len()
				}
			}
		};
	}

	scalar_family!(Int32, int32, i32);
	scalar_family!(Uint32, uint32, u32);
	scalar_family!(Int64, int64, i64);
	scalar_family!(Uint64, uint64, u64);
	scalar_family!(Bool, bool, bool);
	scalar_family!(EntityId, entity_id, EntityId);
	scalar_family!(Fixed32, fixed32, u32);
	scalar_family!(Sfixed32, sfixed32, i32);
	scalar_family!(Float, float, f32);
	scalar_family!(Fixed64, fixed64, u64);
	scalar_family!(Sfixed64, sfixed64, i64);
	scalar_family!(Double, double, f64);
	scalar_family!(Sint32, sint32, i32);
	scalar_family!(Sint64, sint64, i64);

	// `enum` is a reserved keyword, so this family can't be fed through `scalar_family!`'s
	// identifier concatenation.
	#[no_mangle]
	pub unsafe extern "C" fn Schema_AddEnum(obj: ObjectHandle, field_id: FieldId, value: u32) {
		unsafe { obj.resolve() }.add_enum(field_id, value);
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_AddEnumList(obj: ObjectHandle, field_id: FieldId, values: *const u32, count: usize) {
		let slice = unsafe { std::slice::from_raw_parts(values, count) };
		unsafe { obj.resolve() }.add_enum_list(field_id, slice);
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetEnumCount(obj: ObjectHandle, field_id: FieldId) -> u32 {
		unsafe { obj.resolve() }.get_enum_count(field_id)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetEnum(obj: ObjectHandle, field_id: FieldId) -> u32 {
		unsafe { obj.resolve() }.get_enum(field_id)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_IndexEnum(obj: ObjectHandle, field_id: FieldId, index: u32) -> u32 {
		unsafe { obj.resolve() }.index_enum(field_id, index)
	}

	#[no_mangle]
	pub unsafe extern "C" fn Schema_GetEnumList(obj: ObjectHandle, field_id: FieldId, out: *mut u32, out_len: usize) -> usize {
		let mut values = Vec::new();
		unsafe { obj.resolve() }.get_enum_list(field_id, &mut values);
		let n = values.len().min(out_len);
		if n > 0 && !out.is_null() {
			unsafe { std::ptr::copy_nonoverlapping(values.as_ptr(), out, n) };
		}
		values.len()
	}
}

#[cfg(test)]
mod tests {
	use crate::arena::Arena;
	use crate::object::Object;

	fn root_object(arena: &Arena) -> Object<'_> {
		Object { arena, id: arena.allocate_object() }
	}

	#[test]
	fn append_ordering() {
		let arena = Arena::new();
		let obj = root_object(&arena);
		obj.add_int32(1, 7);
		obj.add_int32(1, -3);
		assert_eq!(obj.get_int32_count(1), 2);
		assert_eq!(obj.index_int32(1, 0), 7);
		assert_eq!(obj.index_int32(1, 1), -3);
		assert_eq!(obj.get_int32(1), -3);
	}

	#[test]
	fn sint_zigzag() {
		let arena = Arena::new();
		let obj = root_object(&arena);
		obj.add_sint32(5, -1);
		assert_eq!(obj.index_sint32(5, 0), -1);
	}

	#[test]
	fn packed_equivalence() {
		let arena = Arena::new();
		let a = root_object(&arena);
		let b = root_object(&arena);
		a.add_int32(10, 1);
		a.add_int32(10, 2);
		a.add_int32(10, 3);
		b.add_int32_list(10, &[1, 2, 3]);
		assert_eq!(a.get_int32_count(10), b.get_int32_count(10));
		for i in 0..3 {
			assert_eq!(a.index_int32(10, i), b.index_int32(10, i));
		}
	}

	#[test]
	fn clear_field_idempotent() {
		let arena = Arena::new();
		let obj = root_object(&arena);
		obj.add_int32(1, 1);
		obj.clear_field(1);
		obj.clear_field(1);
		assert_eq!(obj.get_int32_count(1), 0);
	}

	#[test]
	fn shallow_copy_cross_root_is_noop() {
		let arena_a = Arena::new();
		let arena_b = Arena::new();
		let src = root_object(&arena_a);
		let dst = root_object(&arena_b);
		src.add_int32(1, 42);
		src.shallow_copy_to(&dst);
		assert_eq!(dst.get_int32_count(1), 0);
	}

	#[test]
	fn unique_field_ids_sorted() {
		let arena = Arena::new();
		let obj = root_object(&arena);
		obj.add_int32(5, 1);
		obj.add_int32(2, 1);
		obj.add_int32(9, 1);
		obj.add_int32(2, 2);
		assert_eq!(obj.unique_field_ids(), vec![2, 5, 9]);
		assert_eq!(obj.unique_field_id_count(), 3);
	}

	#[test]
	fn get_object_on_absent_field_is_stable() {
		let arena = Arena::new();
		let obj = root_object(&arena);
		let first = obj.get_object(3);
		let second = obj.get_object(3);
		assert_eq!(first.id, second.id);
		assert_eq!(obj.get_object_count(3), 0);
	}
}
