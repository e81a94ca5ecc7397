//! The tagged union stored per field-entry plus the small integer aliases that make up the
//! rest of the data model.

/// Caller-assigned field identifier; also the protobuf field number on the wire. ID 0 is
/// reserved and never appears in a live entry.
pub type FieldId = u32;

/// Alias over the int64 wire type.
pub type EntityId = i64;

/// Reserved field ID for the key half of a map-as-repeated-object convention.
pub const SCHEMA_MAP_KEY_FIELD_ID: FieldId = 1;
/// Reserved field ID for the value half of a map-as-repeated-object convention.
pub const SCHEMA_MAP_VALUE_FIELD_ID: FieldId = 2;

/// Opaque handle to a child [`crate::object::Object`], valid only relative to the arena that
/// produced it. Just an index - `Object` is backed by arena-owned storage rather than raw
/// pointers, so a stable handle has to be an index, not a reference.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
	#[inline]
	pub(crate) fn raw(self) -> u32 {
		self.0
	}
}

/// A pointer+length view into memory that outlives the root: either a caller-pinned buffer
/// (merge, `AddBytes`) or arena memory (`AllocateBuffer`). Never owned separately.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct BytesView {
	pub(crate) ptr: *const u8,
	pub(crate) len: u32,
}

impl BytesView {
	pub(crate) const EMPTY: BytesView = BytesView { ptr: std::ptr::null(), len: 0 };

	/// # Safety
	/// The caller must ensure the memory `ptr..ptr+len` is still alive and was never mutated
	/// out from under this view since creation.
	#[inline]
	pub(crate) unsafe fn as_slice<'a>(&self) -> &'a [u8] {
		if self.len == 0 {
			return &[];
		}
		unsafe { std::slice::from_raw_parts(self.ptr, self.len as usize) }
	}
}

/// The physical element representation backing a [`PackedListView`]. Note that `Int32` and
/// `Sint32` share `Varint32` storage (likewise the 64-bit and fixed-width families) - see
/// DESIGN.md for why the in-memory representation is oblivious to int-vs-sint at this layer.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum PackedKind {
	Varint32,
	Varint64,
	Fixed32,
	Fixed64,
	Bool,
}

impl PackedKind {
	#[inline]
	pub(crate) fn elem_size(self) -> usize {
		match self {
			PackedKind::Varint32 | PackedKind::Fixed32 => 4,
			PackedKind::Varint64 | PackedKind::Fixed64 => 8,
			PackedKind::Bool => 1,
		}
	}
}

/// A single logical entry added via one of the `AddXList` functions: a no-copy view over
/// either the caller's pinned native array or an arena buffer eagerly decoded at merge time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct PackedListView {
	pub(crate) ptr: *const u8,
	pub(crate) count: u32,
	pub(crate) kind: PackedKind,
}

impl PackedListView {
	/// # Safety
	/// Same contract as [`BytesView::as_slice`].
	#[inline]
	unsafe fn elem_ptr(&self, index: usize) -> *const u8 {
		unsafe { self.ptr.add(index * self.kind.elem_size()) }
	}

	/// # Safety
	/// `index` must be `< self.count`, and the backing memory must still be alive.
	pub(crate) unsafe fn read_u32(&self, index: usize) -> u32 {
		debug_assert!(matches!(self.kind, PackedKind::Varint32 | PackedKind::Fixed32));
		unsafe { (self.elem_ptr(index) as *const u32).read_unaligned() }
	}

	/// # Safety
	/// `index` must be `< self.count`, and the backing memory must still be alive.
	pub(crate) unsafe fn read_u64(&self, index: usize) -> u64 {
		debug_assert!(matches!(self.kind, PackedKind::Varint64 | PackedKind::Fixed64));
		unsafe { (self.elem_ptr(index) as *const u64).read_unaligned() }
	}

	/// # Safety
	/// `index` must be `< self.count`, and the backing memory must still be alive.
	pub(crate) unsafe fn read_bool(&self, index: usize) -> bool {
		debug_assert_eq!(self.kind, PackedKind::Bool);
		unsafe { *self.elem_ptr(index) != 0 }
	}
}

/// The tagged union over every wire-representable value kind.
///
/// Varint-family scalars (`int32`, `int64`, `uint32`, `uint64`, `sint32`, `sint64`, `bool`,
/// `EntityId`, `enum`) collapse onto a single `Varint(u64)` representation holding the raw,
/// already-zigzagged-if-applicable bits, so in-process `Add`/`Get` calls and wire
/// `merge`/accessor calls agree on one representation. Likewise `fixed32`/`sfixed32`/`float`
/// share `Fixed32(u32)` bit patterns, and `fixed64`/`sfixed64`/`double` share `Fixed64(u64)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Value {
	Varint(u64),
	Fixed32(u32),
	Fixed64(u64),
	Bytes(BytesView),
	Object(ObjectId),
	PackedList(PackedListView),
}

/// Reads the `i`-th element out of a packed-list entry and re-wraps it as the scalar `Value`
/// variant a singleton entry of the same logical shape would use, so `IndexX`/`GetXList` can
/// treat singleton and packed-list entries identically once flattened.
///
/// # Safety
/// `i` must be `< view.count`, and the view's backing memory must still be alive.
pub(crate) fn packed_list_element(view: &PackedListView, i: u32) -> Value {
	unsafe {
		match view.kind {
			PackedKind::Varint32 => Value::Varint(view.read_u32(i as usize) as u64),
			PackedKind::Varint64 => Value::Varint(view.read_u64(i as usize)),
			PackedKind::Fixed32 => Value::Fixed32(view.read_u32(i as usize)),
			PackedKind::Fixed64 => Value::Fixed64(view.read_u64(i as usize)),
			PackedKind::Bool => Value::Varint(view.read_bool(i as usize) as u64),
		}
	}
}

impl Value {
	/// The number of scalar values this single entry contributes to a flattened count - 1 for
	/// every variant except a packed list, which contributes its element count.
	#[inline]
	pub(crate) fn flattened_len(&self) -> u32 {
		match self {
			Value::PackedList(view) => view.count,
			_ => 1,
		}
	}
}
