//! Shared primitives for both traversal directions: byte order, errors,
//! fixed-width integer conversion, and the [`Codec`] entry point.
//!
//! A [`Codec`] carries the traversal defaults (root section name, initial byte
//! order) and runs a description against either a byte stream (decode) or a
//! [`Record`] (encode).

use crate::decode::SectionReader;
use crate::encode::SectionWriter;
use crate::record::Record;
use crate::section::{Section, SectionContext};
use crate::stream::{CountingWriter, PeekReader};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{Read, Write};
use tracing::debug;

/// Widest integer field (in bytes) that `int`/`uint`/`count` accept.
pub const MAX_INT_WIDTH: usize = 8;

/// Default name of the root section in qualified names.
pub const DEFAULT_ROOT_NAME: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Most significant byte first.
    #[default]
    Big,
    Little,
}

impl Endianness {
    /// Byte order of the host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// Failure of one decode or encode traversal.
///
/// `field` is always the dotted qualified name of the offending field,
/// e.g. `root.chunks[2].data.width`.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Input ended before a fixed-size read completed.
    #[error("Truncated input at {field}: expected {expected} bytes, got {actual}")]
    Truncated {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// The description itself is malformed, independent of the data.
    #[error("Description error at {field}: {reason}")]
    Description { field: String, reason: String },
    /// Supplied data disagrees with what the description declares.
    #[error("Format mismatch at {field}: {reason}")]
    Mismatch { field: String, reason: String },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn description(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::Description {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::Mismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the format description has a bug (not the data).
    pub fn is_description_error(&self) -> bool {
        matches!(self, CodecError::Description { .. })
    }

    /// True when the data is at fault: truncated input or encode mismatch.
    pub fn is_data_error(&self) -> bool {
        matches!(self, CodecError::Truncated { .. } | CodecError::Mismatch { .. })
    }

    /// Qualified field name, when the error is tied to a field.
    pub fn field(&self) -> Option<&str> {
        match self {
            CodecError::Truncated { field, .. }
            | CodecError::Description { field, .. }
            | CodecError::Mismatch { field, .. } => Some(field),
            CodecError::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Traversal defaults plus decode/encode entry points.
#[derive(Debug, Clone)]
pub struct Codec {
    pub endianness: Endianness,
    pub root_name: String,
}

impl Default for Codec {
    fn default() -> Self {
        Codec {
            endianness: Endianness::Big,
            root_name: DEFAULT_ROOT_NAME.to_string(),
        }
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte order of the root section (children inherit it).
    pub fn with_byte_order(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Name of the root section as it appears in qualified names.
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    fn root_context(&self) -> SectionContext {
        SectionContext::root(&self.root_name, self.endianness)
    }

    /// Run `description` against `input` and return the decoded record.
    pub fn decode<R, D>(&self, input: R, mut description: D) -> Result<Record>
    where
        R: Read,
        D: FnMut(&mut dyn Section) -> Result<()>,
    {
        let mut input = PeekReader::new(input);
        let mut root = SectionReader::new(&mut input, self.root_context());
        description(&mut root)?;
        let record = root.into_record();
        debug!(
            root = %self.root_name,
            consumed = input.position(),
            fields = record.len(),
            "decode complete"
        );
        Ok(record)
    }

    pub fn decode_bytes<D>(&self, bytes: &[u8], description: D) -> Result<Record>
    where
        D: FnMut(&mut dyn Section) -> Result<()>,
    {
        self.decode(bytes, description)
    }

    /// Run `description` against `record`, writing bytes to `output`.
    /// On failure `output` may already hold a prefix of the encoding.
    pub fn encode<W, D>(&self, output: W, record: &Record, mut description: D) -> Result<()>
    where
        W: Write,
        D: FnMut(&mut dyn Section) -> Result<()>,
    {
        let mut output = CountingWriter::new(output);
        let mut root = SectionWriter::new(&mut output, record, self.root_context());
        description(&mut root)?;
        output.flush()?;
        debug!(
            root = %self.root_name,
            written = output.written(),
            "encode complete"
        );
        Ok(())
    }

    pub fn encode_to_vec<D>(&self, record: &Record, description: D) -> Result<Vec<u8>>
    where
        D: FnMut(&mut dyn Section) -> Result<()>,
    {
        let mut out = Vec::new();
        self.encode(&mut out, record, description)?;
        Ok(out)
    }
}

/// Unsigned integer from `buf` (0 to 8 bytes).
pub(crate) fn bytes_to_u64(buf: &[u8], endianness: Endianness) -> u64 {
    if buf.is_empty() {
        return 0;
    }
    match endianness {
        Endianness::Big => BigEndian::read_uint(buf, buf.len()),
        Endianness::Little => LittleEndian::read_uint(buf, buf.len()),
    }
}

/// Two's-complement signed integer from `buf` (0 to 8 bytes).
pub(crate) fn bytes_to_i64(buf: &[u8], endianness: Endianness) -> i64 {
    if buf.is_empty() {
        return 0;
    }
    match endianness {
        Endianness::Big => BigEndian::read_int(buf, buf.len()),
        Endianness::Little => LittleEndian::read_int(buf, buf.len()),
    }
}

/// Caller must check [`uint_fits`] first.
pub(crate) fn u64_to_bytes(v: u64, len: usize, endianness: Endianness) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        match endianness {
            Endianness::Big => BigEndian::write_uint(&mut buf, v, len),
            Endianness::Little => LittleEndian::write_uint(&mut buf, v, len),
        }
    }
    buf
}

/// Caller must check [`int_fits`] first.
pub(crate) fn i64_to_bytes(v: i64, len: usize, endianness: Endianness) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        match endianness {
            Endianness::Big => BigEndian::write_int(&mut buf, v, len),
            Endianness::Little => LittleEndian::write_int(&mut buf, v, len),
        }
    }
    buf
}

pub(crate) fn uint_fits(v: u64, len: usize) -> bool {
    match len {
        0 => v == 0,
        n if n >= MAX_INT_WIDTH => true,
        n => v >> (8 * n) == 0,
    }
}

pub(crate) fn int_fits(v: i64, len: usize) -> bool {
    match len {
        0 => v == 0,
        n if n >= MAX_INT_WIDTH => true,
        n => {
            let bits = 8 * n as u32;
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            (min..=max).contains(&v)
        }
    }
}

/// Fewest bytes that hold `v` unsigned (0 for 0).
pub(crate) fn min_uint_width(v: u64) -> usize {
    (64 - v.leading_zeros() as usize).div_ceil(8)
}

/// Fewest bytes that hold `v` in two's complement (0 for 0).
pub(crate) fn min_int_width(v: i64) -> usize {
    (0..=MAX_INT_WIDTH)
        .find(|&n| int_fits(v, n))
        .unwrap_or(MAX_INT_WIDTH)
}
