//! Property-based tests using proptest

use binaryfile::{decode_bytes, encode_to_vec, Record, Result, Section, Size, Value};
use proptest::prelude::*;

fn item(f: &mut dyn Section) -> Result<()> {
    let n = f.count("length", "data", 1)?;
    f.bytes("data", n as usize)?;
    Ok(())
}

fn items(f: &mut dyn Section) -> Result<()> {
    f.skip(2)?;
    f.array("items")?;
    while !f.eof()? {
        f.section("items", &mut item)?;
    }
    Ok(())
}

fn items_unskipped(f: &mut dyn Section) -> Result<()> {
    f.array("items")?;
    while !f.eof()? {
        f.section("items", &mut item)?;
    }
    Ok(())
}

fn frame(header: &[u8; 2], payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut out = header.to_vec();
    for p in payloads {
        out.push(p.len() as u8);
        out.extend_from_slice(p);
    }
    out
}

proptest! {
    #[test]
    fn prop_round_trip_well_formed(
        header in any::<[u8; 2]>(),
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..255), 0..16)
    ) {
        let input = frame(&header, &payloads);
        let record = decode_bytes(&input, items).unwrap();
        prop_assert_eq!(record.list("items").map(|l| l.len()), Some(payloads.len()));
        let output = encode_to_vec(&record, items).unwrap();
        prop_assert_eq!(output, input);
    }

    #[test]
    fn prop_round_trip_whenever_decode_succeeds(
        data in prop::collection::vec(any::<u8>(), 0..512)
    ) {
        if let Ok(record) = decode_bytes(&data, items) {
            prop_assert_eq!(encode_to_vec(&record, items).unwrap(), data);
        }
    }

    #[test]
    fn prop_decode_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        let result = decode_bytes(&data, items);
        prop_assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn prop_construction_law(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..255), 0..16)
    ) {
        let built = Record::new().with(
            "items",
            Value::List(
                payloads
                    .iter()
                    .map(|p| Value::Record(Record::new().with("data", p.clone())))
                    .collect(),
            ),
        );
        let bytes = encode_to_vec(&built, items_unskipped).unwrap();
        let decoded = decode_bytes(&bytes, items_unskipped).unwrap();

        let mut expected = built.clone();
        for (i, p) in payloads.iter().enumerate() {
            expected.item_mut("items", i).unwrap().insert("length", p.len() as u64);
        }
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn prop_uint_fits_iff_in_range(v in 0u64..200_000) {
        let record = Record::new().with("x", v);
        let result = encode_to_vec(&record, |f: &mut dyn Section| f.uint("x", 2).map(drop));
        prop_assert_eq!(result.is_ok(), v <= 0xffff);
    }

    #[test]
    fn prop_unbounded_int_round_trips(v in any::<i64>()) {
        let record = Record::new().with("x", v);
        let description = |f: &mut dyn Section| -> Result<()> {
            f.int_sized("x", Size::Remaining, None)?;
            Ok(())
        };
        let bytes = encode_to_vec(&record, description).unwrap();
        let decoded = decode_bytes(&bytes, description).unwrap();
        prop_assert_eq!(decoded.int("x"), Some(v));
    }
}
