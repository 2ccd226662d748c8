//! # binaryfile: one layout description, two directions
//!
//! Describe the byte layout of a binary file once, as a plain Rust function
//! over the [`Section`] trait, then use that same function both to decode a
//! byte stream into a [`Record`] and to encode a [`Record`] back into bytes.
//!
//! ## Guarantees
//!
//! - **Round trip:** for any input a description decodes without error,
//!   encoding the result with the same description reproduces the input
//!   byte for byte, including regions the description only `skip`s.
//! - **Construction:** a hand-built record that satisfies the description
//!   encodes to bytes that decode back to the same record (count fields are
//!   re-derived from their target on every encode).
//!
//! ## Operations
//!
//! | Operation | Decode | Encode |
//! |-----------|--------|--------|
//! | `skip(n)` | keep `n` raw bytes under `__skipped` | write the next kept region, or `n` zeros |
//! | `section(name, d)` | nested record | nested record |
//! | `array(name)` | later `name` fields append | later `name` fields consume elements |
//! | `bytes(name, n)` / `remaining(name)` | raw bytes | must be exactly `n` bytes |
//! | `int` / `uint` | two's complement / unsigned | range-checked |
//! | `packed(name, fmt)` | tuple of items | tuple of items, arity and range checked |
//! | `count(name, target, n)` | stored value | live length of `target` |
//! | `eof()` | end of input | declared arrays and recorded skips all consumed |
//!
//! ## Example
//!
//! ```
//! use binaryfile::{decode_bytes, encode_to_vec, CodecError, Section};
//!
//! fn chunk(f: &mut dyn Section) -> Result<(), CodecError> {
//!     let len = f.uint("length", 4)?;
//!     let kind = f.bytes("type", 4)?;
//!     if kind == b"HEAD" {
//!         f.section("data", &mut |f: &mut dyn Section| {
//!             f.uint("width", 2)?;
//!             f.uint("height", 2)?;
//!             Ok(())
//!         })?;
//!     } else {
//!         f.bytes("data", len as usize)?;
//!     }
//!     Ok(())
//! }
//!
//! fn file(f: &mut dyn Section) -> Result<(), CodecError> {
//!     f.bytes("magic", 2)?;
//!     f.repeat("chunks", &mut chunk, &mut |_| false)?;
//!     Ok(())
//! }
//!
//! let input = b"MZ\0\0\0\x04HEAD\0\x03\0\x02\0\0\0\x02DATAhi";
//! let record = decode_bytes(input, file).unwrap();
//! let head = record.item("chunks", 0).unwrap();
//! assert_eq!(head.record("data").unwrap().uint("width"), Some(3));
//! assert_eq!(encode_to_vec(&record, file).unwrap(), input);
//! ```

pub mod codec;
pub mod decode;
pub mod dump;
pub mod encode;
pub mod packed;
pub mod record;
pub mod section;
pub mod stream;
pub mod value;

pub use codec::{Codec, CodecError, Endianness, Result};
pub use decode::SectionReader;
pub use dump::dump_record;
pub use encode::SectionWriter;
pub use record::{Record, SKIPPED_KEY};
pub use section::{Description, Section, SectionContext, Size};
pub use value::Value;

use std::io::{Read, Write};

/// Decode `input` with the default [`Codec`] (big endian, root named `root`).
pub fn decode<R, D>(input: R, description: D) -> Result<Record>
where
    R: Read,
    D: FnMut(&mut dyn Section) -> Result<()>,
{
    Codec::default().decode(input, description)
}

pub fn decode_bytes<D>(bytes: &[u8], description: D) -> Result<Record>
where
    D: FnMut(&mut dyn Section) -> Result<()>,
{
    Codec::default().decode_bytes(bytes, description)
}

/// Encode `record` with the default [`Codec`].
pub fn encode<W, D>(output: W, record: &Record, description: D) -> Result<()>
where
    W: Write,
    D: FnMut(&mut dyn Section) -> Result<()>,
{
    Codec::default().encode(output, record, description)
}

pub fn encode_to_vec<D>(record: &Record, description: D) -> Result<Vec<u8>>
where
    D: FnMut(&mut dyn Section) -> Result<()>,
{
    Codec::default().encode_to_vec(record, description)
}
