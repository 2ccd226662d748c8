//! Decode fuzz target: feed arbitrary bytes to a length-prefixed chunk layout.
//! Decoding must not panic, and any input that decodes must encode back to
//! the same bytes.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use binaryfile::{Record, Result, Section};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn chunk(f: &mut dyn Section) -> Result<()> {
    let n = f.uint("length", 2)?;
    let kind = f.bytes("type", 1)?;
    if kind == b"S" {
        f.section("data", &mut |f: &mut dyn Section| {
            f.skip(1)?;
            f.packed("fields", "<hBc")?;
            Ok(())
        })?;
    } else {
        f.bytes("data", n as usize)?;
    }
    Ok(())
}

#[cfg(fuzzing)]
fn file(f: &mut dyn Section) -> Result<()> {
    f.skip(2)?;
    f.repeat("chunks", &mut chunk, &mut |c: &Record| c.bytes("type") == Some(&b"E"[..]))?;
    f.remaining("trailer")?;
    Ok(())
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if let Ok(record) = binaryfile::decode_bytes(data, file) {
        let out = binaryfile::encode_to_vec(&record, file).expect("re-encode decoded record");
        assert_eq!(out, data);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
