//! The bump allocator tied to a root.
//!
//! `bumpalo::Bump` already gives us geometric chained-block growth with stable pointers for
//! the arena's lifetime. The only addition here is the object pool: rather than threading a
//! self-referential lifetime through every `Object` (impossible without unsafe, since the
//! arena that owns the `Bump` would also need to hand out a lifetime tied to itself),
//! `Object`s are tracked by a plain index into an arena-owned `Vec`.

use std::cell::RefCell;

use bumpalo::Bump;

use crate::error::LastError;
use crate::field_store::FieldStore;
use crate::value::ObjectId;

/// Minimum first block size.
const MIN_BLOCK_SIZE: usize = 4096;

pub(crate) struct Arena {
	bump: Bump,
	objects: RefCell<Vec<FieldStore>>,
	/// One per root, not process-wide, living here rather than on the root wrapper since
	/// every `Object` already carries a `&Arena` and needs to report errors from
	/// `merge_from_buffer`.
	last_error: LastError,
}

impl Arena {
	pub(crate) fn new() -> Self {
		Self {
			bump: Bump::with_capacity(MIN_BLOCK_SIZE),
			objects: RefCell::new(Vec::new()),
			last_error: LastError::default(),
		}
	}

	pub(crate) fn last_error(&self) -> &LastError {
		&self.last_error
	}

	/// Allocates a new, empty `Object` header, returning a stable handle to it.
	pub(crate) fn allocate_object(&self) -> ObjectId {
		let mut objects = self.objects.borrow_mut();
		let id = objects.len() as u32;
		objects.push(FieldStore::default());
		ObjectId(id)
	}

	pub(crate) fn field_store(&self, id: ObjectId) -> std::cell::Ref<'_, FieldStore> {
		std::cell::Ref::map(self.objects.borrow(), |objects| &objects[id.0 as usize])
	}

	/// Allocates `len` bytes (8-byte aligned) from the arena, zero-initialized, with a pointer
	/// stable for the root's lifetime. Useful for staging bytes that will become a bytes-view
	/// without a copy.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub(crate) fn allocate_buffer(&self, len: usize) -> &mut [u8] {
		if len == 0 {
			return &mut [];
		}
		let layout = std::alloc::Layout::from_size_align(len, 8).unwrap_or_else(|_| {
			std::alloc::Layout::from_size_align(len, 1).expect("len fits in isize")
		});
		let ptr = self.bump.alloc_layout(layout);
		unsafe {
			std::ptr::write_bytes(ptr.as_ptr(), 0, len);
			std::slice::from_raw_parts_mut(ptr.as_ptr(), len)
		}
	}

	/// Copies `data` into a fresh arena allocation and returns the owned copy.
	pub(crate) fn copy_bytes(&self, data: &[u8]) -> &mut [u8] {
		let buf = self.allocate_buffer(data.len());
		buf.copy_from_slice(data);
		buf
	}

	/// Copies `data` into a fresh arena allocation, 8-byte aligned, returning the owned copy.
	/// Used for zigzag-transformed packed lists, where a zero-copy alias of the caller's
	/// buffer isn't possible (see DESIGN.md).
	pub(crate) fn alloc_slice_copy<T: Copy>(&self, data: &[T]) -> &mut [T] {
		self.bump.alloc_slice_copy(data)
	}
}
