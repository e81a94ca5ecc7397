//! Protobuf-compatible wire codec: tag/length encoding, two-pass serialize, and merge.
//!
//! Length-delimited (wire type 2) fields are ambiguous on the wire alone - bytes, a nested
//! object, and a packed scalar list are all "varint length + payload". Rather than guess at
//! merge time, `merge_object` always stores the raw span as `Value::Bytes`; the specific typed
//! accessor the caller actually invokes (`Object::get_object`, or a packed-list family's
//! `GetXList`/`IndexX`) reinterprets it on demand rather than guessing eagerly at merge time.
//! Nesting depth is bounded separately, once, by a speculative structural scan over the whole
//! buffer before any value is materialized - see `validate_nesting_depth`.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::error::SchemaError;
use crate::value::{BytesView, FieldId, ObjectId, PackedKind, PackedListView, Value};
use crate::varint::{read_varint, varint_len, write_varint};

/// Recommended nesting depth limit.
pub(crate) const MAX_NESTING_DEPTH: u32 = 100;

#[inline]
fn tag_len(field_id: FieldId, wire_type: u8) -> usize {
	varint_len(((field_id as u64) << 3) | wire_type as u64)
}

#[inline]
fn value_wire_type(value: &Value) -> u8 {
	match value {
		Value::Varint(_) => 0,
		Value::Fixed64(_) => 1,
		Value::Bytes(_) | Value::Object(_) | Value::PackedList(_) => 2,
		Value::Fixed32(_) => 5,
	}
}

// -- Packed-list <-> raw-bytes reinterpretation --------------------------------------------

/// Number of logical elements a merged raw span holds if read back as a packed list of `kind`.
/// Fixed-width kinds are an exact division; varint kinds require a scan since elements are
/// variable width.
pub(crate) fn bytes_packed_len(view: &BytesView, kind: PackedKind) -> u32 {
	let buf = unsafe { view.as_slice() };
	match kind {
		PackedKind::Fixed32 | PackedKind::Fixed64 | PackedKind::Bool => {
			(buf.len() / kind.elem_size()) as u32
		}
		PackedKind::Varint32 | PackedKind::Varint64 => {
			let mut pos = 0;
			let mut count = 0u32;
			while pos < buf.len() {
				if read_varint(buf, &mut pos).is_err() {
					break;
				}
				count += 1;
			}
			count
		}
	}
}

/// The `i`-th element of a merged raw span read back as a packed list of `kind`, or `None` if
/// `i` is out of range or the span is malformed as that kind.
pub(crate) fn bytes_packed_element(view: &BytesView, kind: PackedKind, i: u32) -> Option<Value> {
	let buf = unsafe { view.as_slice() };
	match kind {
		PackedKind::Fixed32 => {
			let off = i as usize * 4;
			let bytes: [u8; 4] = buf.get(off..off + 4)?.try_into().ok()?;
			Some(Value::Fixed32(u32::from_le_bytes(bytes)))
		}
		PackedKind::Fixed64 => {
			let off = i as usize * 8;
			let bytes: [u8; 8] = buf.get(off..off + 8)?.try_into().ok()?;
			Some(Value::Fixed64(u64::from_le_bytes(bytes)))
		}
		PackedKind::Bool => {
			let byte = *buf.get(i as usize)?;
			Some(Value::Varint((byte != 0) as u64))
		}
		PackedKind::Varint32 | PackedKind::Varint64 => {
			let mut pos = 0;
			for _ in 0..i {
				read_varint(buf, &mut pos).ok()?;
			}
			let raw = read_varint(buf, &mut pos).ok()?;
			Some(Value::Varint(raw))
		}
	}
}

fn packed_payload_len(view: &PackedListView) -> u32 {
	match view.kind {
		PackedKind::Fixed32 | PackedKind::Fixed64 | PackedKind::Bool => {
			view.count * view.kind.elem_size() as u32
		}
		PackedKind::Varint32 => (0..view.count)
			.map(|i| varint_len(unsafe { view.read_u32(i as usize) } as u64) as u32)
			.sum(),
		PackedKind::Varint64 => (0..view.count)
			.map(|i| varint_len(unsafe { view.read_u64(i as usize) }) as u32)
			.sum(),
	}
}

fn write_packed_payload(view: &PackedListView, buf: &mut [u8], pos: &mut usize) {
	match view.kind {
		PackedKind::Varint32 => {
			for i in 0..view.count {
				let v = unsafe { view.read_u32(i as usize) };
				*pos += write_varint(v as u64, &mut buf[*pos..]);
			}
		}
		PackedKind::Varint64 => {
			for i in 0..view.count {
				let v = unsafe { view.read_u64(i as usize) };
				*pos += write_varint(v, &mut buf[*pos..]);
			}
		}
		PackedKind::Fixed32 => {
			for i in 0..view.count {
				let v = unsafe { view.read_u32(i as usize) };
				buf[*pos..*pos + 4].copy_from_slice(&v.to_le_bytes());
				*pos += 4;
			}
		}
		PackedKind::Fixed64 => {
			for i in 0..view.count {
				let v = unsafe { view.read_u64(i as usize) };
				buf[*pos..*pos + 8].copy_from_slice(&v.to_le_bytes());
				*pos += 8;
			}
		}
		PackedKind::Bool => {
			for i in 0..view.count {
				let v = unsafe { view.read_bool(i as usize) };
				buf[*pos] = v as u8;
				*pos += 1;
			}
		}
	}
}

// -- Serialize (length pass then write pass) ------------------------------------------------

fn entry_len(arena: &Arena, field_id: FieldId, value: &Value, lengths: &mut HashMap<u32, u32>) -> u32 {
	let mut len = tag_len(field_id, value_wire_type(value)) as u32;
	len += match *value {
		Value::Varint(v) => varint_len(v) as u32,
		Value::Fixed32(_) => 4,
		Value::Fixed64(_) => 8,
		Value::Bytes(view) => varint_len(view.len as u64) as u32 + view.len,
		Value::PackedList(ref view) => {
			let payload = packed_payload_len(view);
			varint_len(payload as u64) as u32 + payload
		}
		Value::Object(id) => {
			let child_len = object_length(arena, id, lengths);
			varint_len(child_len as u64) as u32 + child_len
		}
	};
	len
}

/// Computes (and memoizes in `lengths`) the serialized byte length of `id`'s subtree, so the
/// write pass can look up a nested object's length in O(1).
pub(crate) fn object_length(arena: &Arena, id: ObjectId, lengths: &mut HashMap<u32, u32>) -> u32 {
	if let Some(&cached) = lengths.get(&id.raw()) {
		return cached;
	}
	let entries = arena.field_store(id).live_entries();
	let total = entries.iter().map(|(fid, value)| entry_len(arena, *fid, value, lengths)).sum();
	lengths.insert(id.raw(), total);
	total
}

fn write_entry(arena: &Arena, field_id: FieldId, value: Value, buf: &mut [u8], pos: &mut usize, lengths: &HashMap<u32, u32>) {
	let tag = ((field_id as u64) << 3) | value_wire_type(&value) as u64;
	*pos += write_varint(tag, &mut buf[*pos..]);
	match value {
		Value::Varint(v) => *pos += write_varint(v, &mut buf[*pos..]),
		Value::Fixed32(v) => {
			buf[*pos..*pos + 4].copy_from_slice(&v.to_le_bytes());
			*pos += 4;
		}
		Value::Fixed64(v) => {
			buf[*pos..*pos + 8].copy_from_slice(&v.to_le_bytes());
			*pos += 8;
		}
		Value::Bytes(view) => {
			let data = unsafe { view.as_slice() };
			*pos += write_varint(data.len() as u64, &mut buf[*pos..]);
			buf[*pos..*pos + data.len()].copy_from_slice(data);
			*pos += data.len();
		}
		Value::PackedList(view) => {
			let payload = packed_payload_len(&view);
			*pos += write_varint(payload as u64, &mut buf[*pos..]);
			write_packed_payload(&view, buf, pos);
		}
		Value::Object(id) => {
			let child_len = *lengths.get(&id.raw()).expect("object_length ran over the whole tree first");
			*pos += write_varint(child_len as u64, &mut buf[*pos..]);
			write_object(arena, id, buf, pos, lengths);
		}
	}
}

fn write_object(arena: &Arena, id: ObjectId, buf: &mut [u8], pos: &mut usize, lengths: &HashMap<u32, u32>) {
	for (field_id, value) in arena.field_store(id).live_entries() {
		write_entry(arena, field_id, value, buf, pos, lengths);
	}
}

/// `GetWriteBufferLength`: exact encoded size of `id`'s subtree.
pub(crate) fn write_buffer_length(arena: &Arena, id: ObjectId) -> usize {
	let mut lengths = HashMap::new();
	object_length(arena, id, &mut lengths) as usize
}

/// `WriteToBuffer`: serializes `id`'s subtree into `buf`, which must be at least
/// `write_buffer_length(arena, id)` bytes. Returns the number of bytes written.
pub(crate) fn write_to_buffer(arena: &Arena, id: ObjectId, buf: &mut [u8]) -> usize {
	let mut lengths = HashMap::new();
	object_length(arena, id, &mut lengths);
	let mut pos = 0;
	write_object(arena, id, buf, &mut pos, &lengths);
	pos
}

// -- Merge -----------------------------------------------------------------------------------

/// Parses `buf` as a flat sequence of tag/value entries appended onto `id`. Never recurses: a
/// length-delimited field is always appended as a raw `Value::Bytes` span, reinterpreted
/// lazily by whichever typed accessor the caller calls.
pub(crate) fn merge_object(arena: &Arena, id: ObjectId, buf: &[u8]) -> Result<(), SchemaError> {
	let store = arena.field_store(id);
	let mut pos = 0usize;
	while pos < buf.len() {
		let tag = read_varint(buf, &mut pos)?;
		let field_id = (tag >> 3) as FieldId;
		let wire_type = (tag & 0x7) as u8;
		if field_id == 0 {
			return Err(SchemaError::ZeroFieldId);
		}
		match wire_type {
			0 => {
				let v = read_varint(buf, &mut pos)?;
				store.append(field_id, Value::Varint(v));
			}
			1 => {
				let end = pos.checked_add(8).filter(|&e| e <= buf.len()).ok_or(SchemaError::Truncated)?;
				let bytes: [u8; 8] = buf[pos..end].try_into().unwrap();
				store.append(field_id, Value::Fixed64(u64::from_le_bytes(bytes)));
				pos = end;
			}
			5 => {
				let end = pos.checked_add(4).filter(|&e| e <= buf.len()).ok_or(SchemaError::Truncated)?;
				let bytes: [u8; 4] = buf[pos..end].try_into().unwrap();
				store.append(field_id, Value::Fixed32(u32::from_le_bytes(bytes)));
				pos = end;
			}
			2 => {
				let len = read_varint(buf, &mut pos)? as usize;
				let end = pos.checked_add(len).filter(|&e| e <= buf.len()).ok_or(SchemaError::LengthOverrun)?;
				let span = &buf[pos..end];
				store.append(field_id, Value::Bytes(BytesView { ptr: span.as_ptr(), len: span.len() as u32 }));
				pos = end;
			}
			other => return Err(SchemaError::InvalidWireType(other)),
		}
	}
	Ok(())
}

/// Speculatively walks every possible length-delimited nesting path in `buf` to bound worst-case
/// depth before any value is materialized, independent of whether a given length-delimited field
/// turns out to be bytes, a packed list, or a real nested object once the caller actually reads
/// it. A branch that stops parsing as valid tag/value pairs just ends quietly - only nesting that
/// stays structurally valid past [`MAX_NESTING_DEPTH`] levels is an error.
pub(crate) fn validate_nesting_depth(buf: &[u8]) -> Result<(), SchemaError> {
	scan_depth(buf, 0)
}

fn scan_depth(buf: &[u8], depth: u32) -> Result<(), SchemaError> {
	if depth > MAX_NESTING_DEPTH {
		return Err(SchemaError::NestingTooDeep);
	}
	let mut pos = 0usize;
	while pos < buf.len() {
		let Ok(tag) = read_varint(buf, &mut pos) else { return Ok(()) };
		match (tag & 0x7) as u8 {
			0 => {
				if read_varint(buf, &mut pos).is_err() {
					return Ok(());
				}
			}
			1 => {
				let Some(end) = pos.checked_add(8).filter(|&e| e <= buf.len()) else { return Ok(()) };
				pos = end;
			}
			5 => {
				let Some(end) = pos.checked_add(4).filter(|&e| e <= buf.len()) else { return Ok(()) };
				pos = end;
			}
			2 => {
				let Ok(len) = read_varint(buf, &mut pos) else { return Ok(()) };
				let Some(end) = pos.checked_add(len as usize).filter(|&e| e <= buf.len()) else { return Ok(()) };
				scan_depth(&buf[pos..end], depth + 1)?;
				pos = end;
			}
			_ => return Ok(()),
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::arena::Arena;

	#[test]
	fn scalar_round_trip() {
		let arena = Arena::new();
		let id = arena.allocate_object();
		{
			let store = arena.field_store(id);
			store.append(1, Value::Varint(7));
			store.append(1, Value::Varint((-3i32) as u32 as u64));
			store.append(2, Value::Varint(1));
		}
		let len = write_buffer_length(&arena, id);
		let mut buf = vec![0u8; len];
		let written = write_to_buffer(&arena, id, &mut buf);
		assert_eq!(written, len);

		let dst_arena = Arena::new();
		let dst = dst_arena.allocate_object();
		validate_nesting_depth(&buf).unwrap();
		merge_object(&dst_arena, dst, &buf).unwrap();
		let store = dst_arena.field_store(dst);
		assert_eq!(store.count(1), 2);
		assert_eq!(store.index(1, 0), Some(Value::Varint(7)));
		assert_eq!(store.index(1, 1), Some(Value::Varint((-3i32) as u32 as u64)));
		assert_eq!(store.index(2, 0), Some(Value::Varint(1)));
	}

	#[test]
	fn sint_tag_byte() {
		// AddSint32(5, -1): field 5, wire type 0 -> tag = (5 << 3) | 0 = 40 = 0x28.
		let tag = ((5u64) << 3) | 0;
		assert_eq!(tag, 0x28);
		let zz = crate::varint::zigzag_encode32(-1);
		assert_eq!(zz, 1);
	}

	#[test]
	fn packed_list_byte_length() {
		let arena = Arena::new();
		let id = arena.allocate_object();
		let values = [1i32, 2, 3, 300];
		{
			let store = arena.field_store(id);
			store.append(
				10,
				Value::PackedList(PackedListView { ptr: values.as_ptr() as *const u8, count: 4, kind: PackedKind::Varint32 }),
			);
		}
		// tag(1) + length(1) + varints for 1,2,3,300 (1+1+1+2 bytes) = 7.
		assert_eq!(write_buffer_length(&arena, id), 7);
	}

	#[test]
	fn nested_object_round_trip() {
		let arena = Arena::new();
		let parent = arena.allocate_object();
		let child = arena.allocate_object();
		{
			let child_store = arena.field_store(child);
			child_store.append(1, Value::Varint(42));
		}
		{
			let parent_store = arena.field_store(parent);
			parent_store.append(7, Value::Object(child));
		}
		let len = write_buffer_length(&arena, parent);
		let mut buf = vec![0u8; len];
		write_to_buffer(&arena, parent, &mut buf);

		let dst_arena = Arena::new();
		let dst = dst_arena.allocate_object();
		merge_object(&dst_arena, dst, &buf).unwrap();
		let dst_store = dst_arena.field_store(dst);
		assert_eq!(dst_store.count(7), 1);
		let Some(Value::Bytes(child_view)) = dst_store.index(7, 0) else { panic!("expected raw span") };
		let nested_child = dst_arena.allocate_object();
		merge_object(&dst_arena, nested_child, unsafe { child_view.as_slice() }).unwrap();
		assert_eq!(dst_arena.field_store(nested_child).index(1, 0), Some(Value::Varint(42)));
	}

	#[test]
	fn truncated_varint_errors() {
		let arena = Arena::new();
		let id = arena.allocate_object();
		let buf = [0x08u8, 0x80]; // tag for field 1 wire 0, then a truncated varint payload
		assert_eq!(merge_object(&arena, id, &buf), Err(SchemaError::Truncated));
	}

	#[test]
	fn reserved_wire_type_errors() {
		let arena = Arena::new();
		let id = arena.allocate_object();
		let buf = [0x0Bu8]; // tag = (1 << 3) | 3, reserved wire type 3
		assert_eq!(merge_object(&arena, id, &buf), Err(SchemaError::InvalidWireType(3)));
	}

	#[test]
	fn zero_field_id_errors() {
		let arena = Arena::new();
		let id = arena.allocate_object();
		let buf = [0x00u8]; // tag = 0 -> field id 0
		assert_eq!(merge_object(&arena, id, &buf), Err(SchemaError::ZeroFieldId));
	}
}
