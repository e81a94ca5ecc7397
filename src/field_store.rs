//! Per-object storage: an append-only list of `(field_id, value)` entries plus a lazily
//! maintained index from field ID to the head/tail of its occurrence chain.

use std::cell::RefCell;
use nohash_hasher::BuildNoHashHasher;
use std::collections::HashMap;

use crate::value::{FieldId, ObjectId, PackedKind, Value};

/// `next == u32::MAX` marks the end of a chain. Field ID 0 is reserved, so it doubles as the
/// tombstone marker for a cleared entry - see `FieldStore::clear_field`.
const CHAIN_END: u32 = u32::MAX;
const TOMBSTONE: FieldId = 0;

struct FieldEntry {
	id: FieldId,
	value: Value,
	next: u32,
}

#[derive(Copy, Clone)]
struct Chain {
	head: u32,
	tail: u32,
}

#[derive(Default)]
pub(crate) struct FieldStore {
	entries: RefCell<Vec<FieldEntry>>,
	index: RefCell<HashMap<FieldId, Chain, BuildNoHashHasher<FieldId>>>,
	/// Memoized placeholder returned by `Object::get_object`/`index_object` for an absent
	/// field, keyed by field ID. Never touched by `append`/`index`/`collect_into` - it exists
	/// purely so repeated reads of an absent object field are referentially stable, without
	/// inflating `unique_field_ids`/`GetObjectCount`.
	canonical_empty: RefCell<HashMap<FieldId, ObjectId, BuildNoHashHasher<FieldId>>>,
}

impl FieldStore {
	pub(crate) fn append(&self, id: FieldId, value: Value) {
		let mut entries = self.entries.borrow_mut();
		let new_idx = entries.len() as u32;
		entries.push(FieldEntry { id, value, next: CHAIN_END });

		let mut index = self.index.borrow_mut();
		match index.get_mut(&id) {
			Some(chain) => {
				entries[chain.tail as usize].next = new_idx;
				chain.tail = new_idx;
			}
			None => {
				index.insert(id, Chain { head: new_idx, tail: new_idx });
			}
		}
	}

	/// Number of logical scalar elements one entry's value contributes, given how a merged
	/// raw `Bytes` span should be reinterpreted (`None` for non-scalar families such as Bytes
	/// and Object, `Some(kind)` for a packed-scalar family - see `wire::bytes_packed_len`).
	fn flattened_len(value: &Value, reinterpret: Option<PackedKind>) -> u32 {
		match (value, reinterpret) {
			(Value::Bytes(view), Some(kind)) => crate::wire::bytes_packed_len(view, kind),
			_ => value.flattened_len(),
		}
	}

	fn flatten_element(value: Value, i: u32, reinterpret: Option<PackedKind>) -> Value {
		match (value, reinterpret) {
			(Value::PackedList(view), _) => crate::value::packed_list_element(&view, i),
			(Value::Bytes(view), Some(kind)) => {
				crate::wire::bytes_packed_element(&view, kind, i).unwrap_or(value)
			}
			(other, _) => other,
		}
	}

	/// Total number of scalar values across singleton and packed-list entries for `id`.
	pub(crate) fn count(&self, id: FieldId) -> u32 {
		self.count_reinterpreting(id, None)
	}

	/// Like [`Self::count`], but a merged `Bytes` entry for `id` is additionally counted as a
	/// packed list of `kind` (used by the scalar packed-list accessor families, since a merged
	/// length-delimited field arrives as an undifferentiated byte span).
	pub(crate) fn count_as(&self, id: FieldId, kind: PackedKind) -> u32 {
		self.count_reinterpreting(id, Some(kind))
	}

	fn count_reinterpreting(&self, id: FieldId, reinterpret: Option<PackedKind>) -> u32 {
		let index = self.index.borrow();
		let Some(chain) = index.get(&id) else { return 0 };
		let entries = self.entries.borrow();
		let mut total = 0u32;
		let mut cursor = chain.head;
		loop {
			let entry = &entries[cursor as usize];
			total += Self::flattened_len(&entry.value, reinterpret);
			if entry.next == CHAIN_END {
				break;
			}
			cursor = entry.next;
		}
		total
	}

	/// The flattened value at position `i` for `id`, or `None` if out of range / absent.
	pub(crate) fn index(&self, id: FieldId, i: u32) -> Option<Value> {
		self.index_reinterpreting(id, i, None)
	}

	pub(crate) fn index_as(&self, id: FieldId, i: u32, kind: PackedKind) -> Option<Value> {
		self.index_reinterpreting(id, i, Some(kind))
	}

	fn index_reinterpreting(&self, id: FieldId, mut i: u32, reinterpret: Option<PackedKind>) -> Option<Value> {
		let index = self.index.borrow();
		let chain = index.get(&id)?;
		let entries = self.entries.borrow();
		let mut cursor = chain.head;
		loop {
			let entry = &entries[cursor as usize];
			let len = Self::flattened_len(&entry.value, reinterpret);
			if i < len {
				return Some(Self::flatten_element(entry.value, i, reinterpret));
			}
			i -= len;
			if entry.next == CHAIN_END {
				return None;
			}
			cursor = entry.next;
		}
	}

	/// The last occurrence's value for `id` (the singular shortcut for a repeated field), or
	/// `None`.
	pub(crate) fn last(&self, id: FieldId) -> Option<Value> {
		self.last_as_opt(id, None)
	}

	pub(crate) fn last_as(&self, id: FieldId, kind: PackedKind) -> Option<Value> {
		self.last_as_opt(id, Some(kind))
	}

	fn last_as_opt(&self, id: FieldId, reinterpret: Option<PackedKind>) -> Option<Value> {
		let count = self.count_reinterpreting(id, reinterpret);
		if count == 0 {
			return None;
		}
		self.index_reinterpreting(id, count - 1, reinterpret)
	}

	/// Copies every flattened value for `id`, in order, into `out`. `out` must already have
	/// `count(id)` elements reserved; this only pushes, it never truncates.
	pub(crate) fn collect_into(&self, id: FieldId, out: &mut Vec<Value>) {
		self.collect_reinterpreting(id, None, out)
	}

	pub(crate) fn collect_into_as(&self, id: FieldId, kind: PackedKind, out: &mut Vec<Value>) {
		self.collect_reinterpreting(id, Some(kind), out)
	}

	fn collect_reinterpreting(&self, id: FieldId, reinterpret: Option<PackedKind>, out: &mut Vec<Value>) {
		let index = self.index.borrow();
		let Some(chain) = index.get(&id) else { return };
		let entries = self.entries.borrow();
		let mut cursor = chain.head;
		loop {
			let entry = &entries[cursor as usize];
			let len = Self::flattened_len(&entry.value, reinterpret);
			for i in 0..len {
				out.push(Self::flatten_element(entry.value, i, reinterpret));
			}
			if entry.next == CHAIN_END {
				break;
			}
			cursor = entry.next;
		}
	}

	pub(crate) fn clear_field(&self, id: FieldId) {
		let mut index = self.index.borrow_mut();
		let Some(chain) = index.remove(&id) else { return };
		let mut entries = self.entries.borrow_mut();
		let mut cursor = chain.head;
		loop {
			let next = entries[cursor as usize].next;
			entries[cursor as usize].id = TOMBSTONE;
			if next == CHAIN_END {
				break;
			}
			cursor = next;
		}
	}

	pub(crate) fn clear(&self) {
		self.index.borrow_mut().clear();
		for entry in self.entries.borrow_mut().iter_mut() {
			entry.id = TOMBSTONE;
		}
	}

	pub(crate) fn unique_field_ids(&self) -> Vec<FieldId> {
		let mut ids: Vec<FieldId> = self.index.borrow().keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	pub(crate) fn unique_field_id_count(&self) -> usize {
		self.index.borrow().len()
	}

	/// Returns the already-memoized empty-object placeholder for `id`, if one has been recorded.
	/// Takes no `Arena` reference and never allocates, so it's safe to call while a borrow of
	/// this `FieldStore` (itself borrowed out of `Arena::objects`) is held.
	pub(crate) fn canonical_empty_existing(&self, id: FieldId) -> Option<ObjectId> {
		self.canonical_empty.borrow().get(&id).copied()
	}

	/// Records `new_id` as the placeholder for `id` unless one was already recorded - in which
	/// case the existing entry wins and `new_id` is discarded. Callers allocate `new_id` via
	/// `Arena::allocate_object` *before* calling this, and only after `canonical_empty_existing`
	/// came back empty, so the arena's own borrow is never held re-entrantly through this one.
	pub(crate) fn canonical_empty_insert(&self, id: FieldId, new_id: ObjectId) -> ObjectId {
		*self.canonical_empty.borrow_mut().entry(id).or_insert(new_id)
	}

	/// Live `(id, value)` entries in original insertion order - used by the wire serializer
	/// (field order must be stable) and by `ShallowCopy` (every live entry, verbatim).
	pub(crate) fn live_entries(&self) -> Vec<(FieldId, Value)> {
		self.entries
			.borrow()
			.iter()
			.filter(|e| e.id != TOMBSTONE)
			.map(|e| (e.id, e.value))
			.collect()
	}
}
