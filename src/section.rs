//! The symmetric section protocol.
//!
//! A format description is a function over `&mut dyn Section`. The decoding
//! engine ([`SectionReader`](crate::decode::SectionReader)) and the encoding
//! engine ([`SectionWriter`](crate::encode::SectionWriter)) both implement
//! [`Section`], so the same description drives both directions. Every
//! operation returns the value it read or wrote, letting the description
//! branch on earlier fields identically in both directions.
//!
//! ```
//! use binaryfile::{Codec, CodecError, Section};
//!
//! fn header(f: &mut dyn Section) -> Result<(), CodecError> {
//!     let n = f.count("n", "payload", 1)?;
//!     f.bytes("payload", n as usize)?;
//!     Ok(())
//! }
//!
//! let codec = Codec::new();
//! let record = codec.decode_bytes(b"\x05ABCDE", header).unwrap();
//! assert_eq!(record.bytes("payload"), Some(&b"ABCDE"[..]));
//! assert_eq!(codec.encode_to_vec(&record, header).unwrap(), b"\x05ABCDE");
//! ```

use crate::codec::{Endianness, Result};
use crate::record::Record;
use crate::value::Value;
use std::rc::Rc;

/// A format description (or the body of a nested section).
pub type Description<'a> = dyn FnMut(&mut dyn Section) -> Result<()> + 'a;

/// Declared size of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Exact(usize),
    /// Decode: everything left in the stream. Encode: whatever the value needs.
    Remaining,
}

impl From<usize> for Size {
    fn from(n: usize) -> Self {
        Size::Exact(n)
    }
}

/// Naming and byte-order state for one section of one traversal.
///
/// Each context owns a shared handle to its full path rather than a link to
/// the parent section, so children never borrow their parents.
#[derive(Debug, Clone)]
pub struct SectionContext {
    path: Rc<[String]>,
    pub byte_order: Endianness,
}

impl SectionContext {
    pub fn root(name: &str, byte_order: Endianness) -> Self {
        SectionContext {
            path: Rc::from(vec![name.to_string()]),
            byte_order,
        }
    }

    /// Context for a nested section; inherits the current byte order.
    pub fn child(&self, name: &str) -> Self {
        let mut path = self.path.to_vec();
        path.push(name.to_string());
        SectionContext {
            path: Rc::from(path),
            byte_order: self.byte_order,
        }
    }

    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Section names from the root down to this section.
    pub fn qualified_name(&self) -> &[String] {
        &self.path
    }

    /// Dotted name of `field` inside this section, for diagnostics.
    pub fn field_name(&self, field: &str) -> String {
        let mut s = self.path.join(".");
        s.push('.');
        s.push_str(field);
        s
    }
}

/// Operations a format description may declare, in order.
///
/// Field names are unique per section unless declared with [`array`](Section::array)
/// first; the reserved name [`SKIPPED_KEY`](crate::record::SKIPPED_KEY) is
/// maintained by [`skip`](Section::skip) and cannot be declared directly.
pub trait Section {
    fn context(&self) -> &SectionContext;

    fn context_mut(&mut self) -> &mut SectionContext;

    /// Uninterpreted bytes, preserved for round-tripping.
    fn skip(&mut self, size: usize) -> Result<Vec<u8>>;

    /// Nested sub-record named `name`, laid out by `description`.
    fn section(&mut self, name: &str, description: &mut Description<'_>) -> Result<Record>;

    /// Declare `name` as repeatable; later declarations of `name` append
    /// (decode) or consume successive elements (encode).
    fn array(&mut self, name: &str) -> Result<()>;

    fn bytes_sized(&mut self, name: &str, size: Size) -> Result<Vec<u8>>;

    /// Two's-complement signed integer; `order` overrides the section byte order.
    fn int_sized(&mut self, name: &str, size: Size, order: Option<Endianness>) -> Result<i64>;

    fn uint_sized(&mut self, name: &str, size: Size, order: Option<Endianness>) -> Result<u64>;

    /// Packed struct described by a format string such as `">?3s"`.
    fn packed(&mut self, name: &str, format: &str) -> Result<Vec<Value>>;

    /// Unsigned length of `target`. Decode reads it as stored; encode derives
    /// it from the current length of `target` in the record.
    fn count_sized(
        &mut self,
        name: &str,
        target: &str,
        size: Size,
        order: Option<Endianness>,
    ) -> Result<u64>;

    /// True when no more data remains. On decode this is end of input. On
    /// encode every declared array of this section is fully consumed and no
    /// recorded skip region is left to replay.
    fn eof(&mut self) -> Result<bool>;

    fn byte_order(&self) -> Endianness {
        self.context().byte_order
    }

    /// Change the byte order for this section and sections declared after this call.
    fn set_byte_order(&mut self, order: Endianness) {
        self.context_mut().byte_order = order;
    }

    fn qualified_name(&self) -> Vec<String> {
        self.context().qualified_name().to_vec()
    }

    fn bytes(&mut self, name: &str, size: usize) -> Result<Vec<u8>> {
        self.bytes_sized(name, Size::Exact(size))
    }

    /// All remaining input on decode; the stored value as-is on encode.
    fn remaining(&mut self, name: &str) -> Result<Vec<u8>> {
        self.bytes_sized(name, Size::Remaining)
    }

    fn int(&mut self, name: &str, size: usize) -> Result<i64> {
        self.int_sized(name, Size::Exact(size), None)
    }

    fn uint(&mut self, name: &str, size: usize) -> Result<u64> {
        self.uint_sized(name, Size::Exact(size), None)
    }

    fn count(&mut self, name: &str, target: &str, size: usize) -> Result<u64> {
        self.count_sized(name, target, Size::Exact(size), None)
    }

    /// Array of sub-records named `name[0]`, `name[1]`, ... repeated until
    /// [`eof`](Section::eof), or until `stop` returns true for the element just
    /// processed.
    fn repeat(
        &mut self,
        name: &str,
        description: &mut Description<'_>,
        stop: &mut dyn FnMut(&Record) -> bool,
    ) -> Result<Vec<Record>> {
        self.array(name)?;
        let mut items = Vec::new();
        while !self.eof()? {
            let item = self.section(name, description)?;
            let done = stop(&item);
            items.push(item);
            if done {
                break;
            }
        }
        Ok(items)
    }
}
