use std::cell::RefCell;
use std::ffi::CString;
use std::fmt::{Debug, Display, Formatter};
use std::os::raw::c_char;

/// Everything that can go wrong while merging a buffer into an [`crate::object::Object`].
///
/// A plain enum with a hand-written `Display`, not `thiserror` - there is nothing here a
/// derive macro would buy us.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SchemaError {
	/// A varint ran past 10 bytes without a terminating byte, or a length-delimited block's
	/// declared length overruns the remaining input.
	Truncated,
	/// A length-delimited block claims a length that doesn't fit in what's left of the buffer.
	LengthOverrun,
	/// Wire type 3 or 4 (the deprecated group start/end markers) was seen.
	InvalidWireType(u8),
	/// Field ID 0 is reserved and never valid on the wire.
	ZeroFieldId,
	/// Nested object depth exceeded [`crate::wire::MAX_NESTING_DEPTH`].
	NestingTooDeep,
}

impl Display for SchemaError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Truncated => f.write_str("truncated varint or length-delimited block"),
			Self::LengthOverrun => f.write_str("length-delimited payload longer than remaining input"),
			Self::InvalidWireType(wt) => write!(f, "reserved wire type {wt}"),
			Self::ZeroFieldId => f.write_str("field ID 0 is reserved"),
			Self::NestingTooDeep => f.write_str("object nesting exceeded the implementation limit"),
		}
	}
}

/// Per-root last-error slot, not process-wide.
///
/// Successful operations never clear it; callers are expected to check the fallible
/// operation's own return value before consulting this. Stored as a `CString` rather than a
/// plain `Box<str>` so the FFI layer can hand out a null-terminated `*const c_char` directly,
/// valid until the next failing operation on the same root replaces it.
#[derive(Default)]
pub(crate) struct LastError(RefCell<Option<CString>>);

impl LastError {
	pub(crate) fn set(&self, err: SchemaError) {
		*self.0.borrow_mut() = CString::new(err.to_string()).ok();
	}

	pub fn message(&self) -> Option<std::cell::Ref<'_, str>> {
		let borrow = self.0.borrow();
		std::cell::Ref::filter_map(borrow, |o| o.as_deref().and_then(|c| c.to_str().ok())).ok()
	}

	/// Null-terminated pointer to the current message, or null if none has been set. Valid
	/// until the next call to [`Self::set`] on this same slot.
	pub(crate) fn as_c_str(&self) -> *const c_char {
		match &*self.0.borrow() {
			Some(c) => c.as_ptr(),
			None => std::ptr::null(),
		}
	}
}

impl Debug for LastError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(&*self.0.borrow(), f)
	}
}
