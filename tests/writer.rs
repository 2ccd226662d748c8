//! Encoding engine: every operation against hand-built records.

use binaryfile::{
    decode_bytes, encode, encode_to_vec, Codec, CodecError, Endianness, Record, Section, Size, Value,
    SKIPPED_KEY,
};

fn skipped(regions: &[&[u8]]) -> Value {
    Value::List(regions.iter().map(|r| Value::Bytes(r.to_vec())).collect())
}

fn two_skips(f: &mut dyn Section) -> binaryfile::Result<()> {
    f.skip(1)?;
    f.skip(3)?;
    Ok(())
}

#[test]
fn skip_without_recorded_regions_writes_zeros() {
    let out = encode_to_vec(&Record::new(), two_skips).expect("encode");
    assert_eq!(out, b"\x00\x00\x00\x00");
}

#[test]
fn skip_replays_recorded_regions() {
    let data = Record::new().with(SKIPPED_KEY, skipped(&[b"1", b"234"]));
    let out = encode_to_vec(&data, two_skips).expect("encode");
    assert_eq!(out, b"1234");
}

#[test]
fn skipped_region_of_wrong_size_is_mismatch() {
    let data = Record::new().with(SKIPPED_KEY, skipped(&[b"123"]));
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.skip(2)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }), "{:?}", err);
}

#[test]
fn running_out_of_skipped_regions_is_mismatch() {
    let data = Record::new().with(SKIPPED_KEY, skipped(&[b"1"]));
    let err = encode_to_vec(&data, two_skips).unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn bytes_then_remaining() {
    let data = Record::new().with("first", b"1").with("rest", b"234");
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        assert_eq!(f.bytes("first", 1)?, b"1");
        assert_eq!(f.remaining("rest")?, b"234");
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"1234");
}

#[test]
fn bytes_of_wrong_length_is_mismatch() {
    let data = Record::new().with("first", b"12");
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.bytes("first", 1)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
    assert_eq!(err.field(), Some("root.first"));

    let data = Record::new().with("first", b"");
    assert!(encode_to_vec(&data, |f: &mut dyn Section| f.bytes("first", 1).map(drop)).is_err());
}

#[test]
fn uint_is_zero_extended() {
    let data = Record::new().with("uint", 65535u32);
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        assert_eq!(f.uint("uint", 4)?, 65535);
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x00\x00\xff\xff");
}

#[test]
fn int_is_twos_complement() {
    let data = Record::new().with("int", -65536i64);
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        assert_eq!(f.int("int", 4)?, -65536);
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\xff\xff\x00\x00");
}

#[test]
fn uint_overflow_is_mismatch() {
    let data = Record::new().with("uint", 65540u32);
    let err = encode_to_vec(&data, |f: &mut dyn Section| f.uint("uint", 2).map(drop)).unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }), "{:?}", err);

    let data = Record::new().with("uint", 65535u32);
    let out = encode_to_vec(&data, |f: &mut dyn Section| f.uint("uint", 2).map(drop))
        .expect("encode");
    assert_eq!(out, b"\xff\xff");
}

#[test]
fn int_overflow_is_mismatch() {
    let data = Record::new().with("int", 128i64);
    let err = encode_to_vec(&data, |f: &mut dyn Section| f.int("int", 1).map(drop)).unwrap_err();
    assert!(err.is_data_error());
    let data = Record::new().with("int", -128i64);
    let out = encode_to_vec(&data, |f: &mut dyn Section| f.int("int", 1).map(drop)).expect("encode");
    assert_eq!(out, b"\x80");
}

#[test]
fn negative_into_uint_is_mismatch() {
    let data = Record::new().with("u", -1i64);
    let err = encode_to_vec(&data, |f: &mut dyn Section| f.uint("u", 4).map(drop)).unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn unbounded_integers_use_natural_width() {
    let data = Record::new()
        .with("a", 0x0102u32)
        .with("b", 0u32)
        .with("c", -1i64)
        .with("d", 128i64);
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        f.uint_sized("a", Size::Remaining, None)?;
        f.uint_sized("b", Size::Remaining, None)?;
        f.int_sized("c", Size::Remaining, None)?;
        f.int_sized("d", Size::Remaining, None)?;
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x01\x02\xff\x00\x80");
}

#[test]
fn packed_struct() {
    let data = Record::new().with(
        "struct",
        Value::Tuple(vec![Value::Bool(false), Value::Bytes(b"yes".to_vec())]),
    );
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        let items = f.packed("struct", ">?3s")?;
        assert_eq!(items, vec![Value::Bool(false), Value::Bytes(b"yes".to_vec())]);
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x00yes");
}

#[test]
fn packed_struct_from_bytes_is_mismatch() {
    let data = Record::new().with("struct", b"hello");
    let err = encode_to_vec(&data, |f: &mut dyn Section| f.packed("struct", ">4B").map(drop))
        .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }), "{:?}", err);
}

#[test]
fn packed_struct_arity_and_range() {
    let short = Record::new().with("s", Value::Tuple(vec![Value::UInt(1)]));
    let err = encode_to_vec(&short, |f: &mut dyn Section| f.packed("s", ">BB").map(drop))
        .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));

    let wide = Record::new().with("s", Value::Tuple(vec![Value::UInt(1), Value::UInt(300)]));
    let err = encode_to_vec(&wide, |f: &mut dyn Section| f.packed("s", ">BB").map(drop))
        .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn section() {
    let mut entered = false;
    let data = Record::new().with("section", Record::new().with("byte", b"Q"));
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        let section = f.section("section", &mut |f: &mut dyn Section| {
            entered = true;
            f.bytes("byte", 1)?;
            Ok(())
        })?;
        assert_eq!(section, Record::new().with("byte", b"Q"));
        Ok(())
    })
    .expect("encode");
    assert!(entered);
    assert_eq!(out, b"Q");
}

#[test]
fn section_holding_scalar_is_mismatch() {
    let data = Record::new().with("section", 1u8);
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.section("section", &mut |_: &mut dyn Section| -> binaryfile::Result<()> { Ok(()) })?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn array_consumes_elements_in_order() {
    let data = Record::new().with(
        "uints",
        Value::List((1..=4u8).map(Value::from).collect()),
    );
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        f.array("uints")?;
        for _ in 0..4 {
            f.uint("uints", 1)?;
        }
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x01\x02\x03\x04");
}

#[test]
fn array_shorter_than_description_is_mismatch() {
    let data = Record::new().with(
        "uints",
        Value::List((1..=3u8).map(Value::from).collect()),
    );
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.array("uints")?;
        for _ in 0..4 {
            f.uint("uints", 1)?;
        }
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
    assert_eq!(err.field(), Some("root.uints[3]"));
}

#[test]
fn array_declared_twice_is_description_error() {
    let data = Record::new().with("a", Value::List(vec![]));
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.array("a")?;
        f.array("a")?;
        Ok(())
    })
    .unwrap_err();
    assert!(err.is_description_error());
}

#[test]
fn eof_means_declared_arrays_are_consumed() {
    let data = Record::new().with(
        "items",
        Value::List((7..=9u8).map(Value::from).collect()),
    );
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        assert!(f.eof()?);
        f.array("items")?;
        while !f.eof()? {
            f.uint("items", 1)?;
        }
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x07\x08\x09");
}

#[test]
fn repeat_replays_every_element() {
    let item = |v: u8| Value::Record(Record::new().with("v", v));
    let data = Record::new().with("values", Value::List(vec![item(1), item(2), item(0)]));
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        let items = f.repeat(
            "values",
            &mut |f: &mut dyn Section| f.uint("v", 1).map(drop),
            &mut |r: &Record| r.uint("v") == Some(0),
        )?;
        assert_eq!(items.len(), 3);
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x01\x02\x00");
}

#[test]
fn count_is_derived_from_target() {
    let description = |f: &mut dyn Section| -> binaryfile::Result<()> {
        let n = f.count("n", "payload", 1)?;
        f.bytes("payload", n as usize)?;
        Ok(())
    };
    let data = Record::new().with("n", 99u8).with("payload", b"xyz");
    assert_eq!(encode_to_vec(&data, description).expect("encode"), b"\x03xyz");

    let without_count = Record::new().with("payload", b"ab");
    assert_eq!(
        encode_to_vec(&without_count, description).expect("encode"),
        b"\x02ab"
    );
}

#[test]
fn count_of_array_target() {
    let data = Record::new().with(
        "items",
        Value::List((1..=3u8).map(Value::from).collect()),
    );
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        let n = f.count("n", "items", 2)?;
        f.array("items")?;
        for _ in 0..n {
            f.uint("items", 1)?;
        }
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x00\x03\x01\x02\x03");
}

#[test]
fn count_of_missing_target_is_mismatch() {
    let err = encode_to_vec(&Record::new(), |f: &mut dyn Section| {
        f.count("n", "payload", 1)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn count_too_large_for_width_is_mismatch() {
    let data = Record::new().with("payload", vec![0u8; 256]);
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        let n = f.count("n", "payload", 1)?;
        f.bytes("payload", n as usize)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn missing_field_is_mismatch() {
    let err = encode_to_vec(&Record::new(), |f: &mut dyn Section| f.uint("x", 1).map(drop))
        .unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
    assert_eq!(err.field(), Some("root.x"));
}

#[test]
fn wrong_value_kind_is_mismatch() {
    let data = Record::new().with("x", b"ab");
    let err = encode_to_vec(&data, |f: &mut dyn Section| f.uint("x", 2).map(drop)).unwrap_err();
    assert!(matches!(err, CodecError::Mismatch { .. }));
}

#[test]
fn mismatch_names_nested_array_field() {
    let chunk = |w: u32| Value::Record(Record::new().with("data", Record::new().with("width", w)));
    let data = Record::new().with("chunks", Value::List(vec![chunk(1), chunk(2), chunk(70000)]));
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.array("chunks")?;
        while !f.eof()? {
            f.section("chunks", &mut |f: &mut dyn Section| {
                f.section("data", &mut |f: &mut dyn Section| f.uint("width", 2).map(drop))?;
                Ok(())
            })?;
        }
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.field(), Some("root.chunks[2].data.width"));
}

#[test]
fn byte_order_is_scoped_to_section() {
    let data = Record::new()
        .with("outer", 1u16)
        .with("le", Record::new().with("inner", 1u16));
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        f.uint("outer", 2)?;
        f.section("le", &mut |f: &mut dyn Section| {
            f.set_byte_order(Endianness::Little);
            f.uint("inner", 2).map(drop)
        })?;
        Ok(())
    })
    .expect("encode");
    assert_eq!(out, b"\x00\x01\x01\x00");
}

#[test]
fn little_endian_codec() {
    let data = Record::new().with("v", 1u16);
    let out = Codec::new()
        .with_byte_order(Endianness::Little)
        .encode_to_vec(&data, |f: &mut dyn Section| f.uint("v", 2).map(drop))
        .expect("encode");
    assert_eq!(out, b"\x01\x00");
}

#[test]
fn failed_encode_leaves_written_prefix() {
    let data = Record::new().with("a", b"ok").with("b", 300u32);
    let mut out = Vec::new();
    let err = encode(&mut out, &data, |f: &mut dyn Section| {
        f.bytes("a", 2)?;
        f.uint("b", 1)?;
        Ok(())
    })
    .unwrap_err();
    assert!(err.is_data_error());
    assert_eq!(out, b"ok");
}

#[test]
fn skip_loop_until_eof_replays_every_region() {
    let description = |f: &mut dyn Section| -> binaryfile::Result<()> {
        f.bytes("magic", 2)?;
        while !f.eof()? {
            f.skip(2)?;
        }
        Ok(())
    };
    let input = b"MZ\x01\x02\x03\x04";
    let record = decode_bytes(input, description).expect("decode");
    assert_eq!(record.skipped().map(|r| r.len()), Some(2));
    assert_eq!(encode_to_vec(&record, description).expect("encode"), input);

    let bare = Record::new().with("magic", b"MZ");
    assert_eq!(encode_to_vec(&bare, description).expect("encode"), b"MZ");
}

#[test]
fn empty_skipped_regions_do_not_hold_eof_open() {
    let data = Record::new().with(SKIPPED_KEY, skipped(&[b""]));
    let out = encode_to_vec(&data, |f: &mut dyn Section| {
        assert!(f.eof()?);
        f.skip(0)?;
        Ok(())
    })
    .expect("encode");
    assert!(out.is_empty());
}

#[test]
fn redeclared_field_is_description_error() {
    let description = |f: &mut dyn Section| -> binaryfile::Result<()> {
        f.uint("x", 1)?;
        f.uint("x", 1)?;
        Ok(())
    };
    let mut out = Vec::new();
    let err = encode(&mut out, &Record::new().with("x", 7u8), description).unwrap_err();
    assert!(err.is_description_error(), "{:?}", err);
    assert_eq!(err.field(), Some("root.x"));
    assert_eq!(out, b"\x07");

    let decoded = decode_bytes(b"\x07\x07", description).unwrap_err();
    assert!(decoded.is_description_error());
}

#[test]
fn redeclaration_across_operations_is_description_error() {
    let data = Record::new().with("n", 1u8).with("payload", b"a");
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.count("n", "payload", 1)?;
        f.uint("n", 1)?;
        Ok(())
    })
    .unwrap_err();
    assert!(err.is_description_error(), "{:?}", err);

    let data = Record::new().with("s", Record::new());
    let err = encode_to_vec(&data, |f: &mut dyn Section| {
        f.section("s", &mut |_: &mut dyn Section| -> binaryfile::Result<()> { Ok(()) })?;
        f.array("s")?;
        Ok(())
    })
    .unwrap_err();
    assert!(err.is_description_error(), "{:?}", err);
}
