//! Cross-cutting property tests that exercise the public API end-to-end, as opposed to the
//! per-module unit tests colocated with `src/*.rs`.

use schema_object::{ComponentData, ComponentUpdate};

#[test]
fn scalar_round_trip_scenario() {
	let src = ComponentData::new(1);
	src.fields().add_int32(1, 7);
	src.fields().add_int32(1, -3);
	src.fields().add_bool(2, true);

	let len = src.fields().write_buffer_length();
	let mut buf = vec![0u8; len];
	let written = src.fields().write_to_buffer(&mut buf);
	assert_eq!(written, len);

	let dst = ComponentData::new(1);
	assert!(dst.fields().merge_from_buffer(&buf));
	assert_eq!(dst.fields().get_int32_count(1), 2);
	assert_eq!(dst.fields().index_int32(1, 0), 7);
	assert_eq!(dst.fields().index_int32(1, 1), -3);
	assert!(dst.fields().get_bool(2));
}

#[test]
fn packed_list_byte_length_scenario() {
	let data = ComponentData::new(1);
	data.fields().add_int32_list(10, &[1, 2, 3, 300]);
	assert_eq!(data.fields().get_int32_count(10), 4);
	assert_eq!(data.fields().index_int32(10, 2), 3);
	// tag(1) + length(1) + varints for 1, 2, 3, 300 (1+1+1+2 bytes) = 7.
	assert_eq!(data.fields().write_buffer_length(), 7);
}

#[test]
fn nested_object_scenario() {
	let data = ComponentData::new(1);
	let child = data.fields().add_object(7);
	child.add_int32(1, 42);

	let len = data.fields().write_buffer_length();
	let mut buf = vec![0u8; len];
	data.fields().write_to_buffer(&mut buf);

	let dst = ComponentData::new(1);
	assert!(dst.fields().merge_from_buffer(&buf));
	assert_eq!(dst.fields().get_object_count(7), 1);
	assert_eq!(dst.fields().index_object(7, 0).get_int32(1), 42);
}

#[test]
fn bytes_aliasing_scenario() {
	// AddBytes(3, ptr, 5) with a caller buffer containing "HELLO"; serialize into a second
	// root, then merge the wire bytes into a third, fully independent root.
	let src = ComponentData::new(1);
	src.fields().add_bytes(3, b"HELLO");

	let len = src.fields().write_buffer_length();
	let mut wire = vec![0u8; len];
	src.fields().write_to_buffer(&mut wire);

	let dst = ComponentData::new(1);
	assert!(dst.fields().merge_from_buffer(&wire));
	assert_eq!(dst.fields().get_bytes_length(3), 5);
	assert_eq!(dst.fields().get_bytes(3), &b"HELLO"[..]);
}

#[test]
fn merge_monotonicity_scenario() {
	let src = ComponentData::new(1);
	src.fields().add_int32(1, 1);
	src.fields().add_int32(1, 2);
	let len = src.fields().write_buffer_length();
	let mut buf = vec![0u8; len];
	src.fields().write_to_buffer(&mut buf);

	// Merging twice into an empty object is a concatenation, not an overwrite.
	let dst = ComponentData::new(1);
	assert!(dst.fields().merge_from_buffer(&buf));
	assert!(dst.fields().merge_from_buffer(&buf));
	assert_eq!(dst.fields().get_int32_count(1), 4);
	assert_eq!(dst.fields().index_int32(1, 2), 1);
	assert_eq!(dst.fields().index_int32(1, 3), 2);
}

#[test]
fn update_cleared_field_list_scenario() {
	let update = ComponentUpdate::new(1);
	update.cleared_fields().add(4);
	update.cleared_fields().add(9);
	update.cleared_fields().add(4);
	assert_eq!(update.cleared_fields().count(), 3);
	assert_eq!(update.cleared_fields().get(0), 4);
	assert_eq!(update.cleared_fields().get(1), 9);
	assert_eq!(update.cleared_fields().get(2), 4);

	update.cleared_fields().clear();
	assert_eq!(update.cleared_fields().count(), 0);
}

#[test]
fn cross_root_shallow_copy_is_noop() {
	let src = ComponentData::new(1);
	let dst = ComponentData::new(2);
	src.fields().add_int32(1, 42);
	src.fields().shallow_copy_to(&dst.fields());
	assert_eq!(dst.fields().get_int32_count(1), 0);
}
