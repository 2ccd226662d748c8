//! Packed struct format strings: parse (PEST), unpack, pack.
//!
//! A format is an optional byte-order marker followed by items; each item is an
//! optional count and a type code.
//!
//! | Marker | Byte order |
//! |--------|------------|
//! | `@`, `=` (or none) | native |
//! | `<` | little endian |
//! | `>`, `!` | big endian |
//!
//! | Code | Value | Bytes |
//! |------|-------|-------|
//! | `x` | none (pad, written as zero) | 1 |
//! | `c` | `Bytes` of length 1 | 1 |
//! | `?` | `Bool` | 1 |
//! | `b` / `B` | `Int` / `UInt` | 1 |
//! | `h` / `H` | `Int` / `UInt` | 2 |
//! | `i` `l` / `I` `L` | `Int` / `UInt` | 4 |
//! | `q` / `Q` | `Int` / `UInt` | 8 |
//! | `f` / `d` | `Float` | 4 / 8 |
//! | `s` | `Bytes`, count is the length | count |
//!
//! Sizes are always the standard ones; no alignment padding is inserted.

use crate::codec::{
    bytes_to_i64, bytes_to_u64, i64_to_bytes, int_fits, u64_to_bytes, uint_fits, Endianness,
};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use pest::Parser;
use pest_derive::Parser as PestParser;

/// Upper bound on the bytes one format may describe.
pub const MAX_FORMAT_SIZE: usize = 1 << 20;

#[derive(PestParser)]
#[grammar = "packed.pest"]
struct FormatParser;

/// One fixed-width item of a packed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    Pad,
    Char,
    Bool,
    Int { width: usize, signed: bool },
    F32,
    F64,
    Bytes(usize),
}

impl Item {
    pub fn width(&self) -> usize {
        match self {
            Item::Pad | Item::Char | Item::Bool => 1,
            Item::Int { width, .. } => *width,
            Item::F32 => 4,
            Item::F64 => 8,
            Item::Bytes(n) => *n,
        }
    }

    /// Pad bytes take up space but produce no value.
    pub fn has_value(&self) -> bool {
        !matches!(self, Item::Pad)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFormat {
    pub endianness: Endianness,
    pub items: Vec<Item>,
}

/// Parse a format string into its items.
pub fn parse(source: &str) -> Result<PackedFormat, String> {
    let pairs = FormatParser::parse(Rule::format, source)
        .map_err(|e| format!("Parse error in format {:?}: {}", source, e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    let mut endianness = Endianness::native();
    let mut items = Vec::new();
    let mut size = 0usize;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::order => endianness = build_order(inner.as_str()),
            Rule::item => {
                let (item, repeat) = build_item(inner)?;
                size = item
                    .width()
                    .checked_mul(repeat)
                    .and_then(|span| span.checked_add(size))
                    .filter(|&total| total <= MAX_FORMAT_SIZE)
                    .ok_or_else(|| {
                        format!("format {:?} exceeds {} bytes", source, MAX_FORMAT_SIZE)
                    })?;
                items.extend(std::iter::repeat(item).take(repeat));
            }
            _ => {}
        }
    }
    Ok(PackedFormat { endianness, items })
}

fn build_order(marker: &str) -> Endianness {
    match marker {
        "<" => Endianness::Little,
        ">" | "!" => Endianness::Big,
        _ => Endianness::native(),
    }
}

/// One item and how many times it repeats (`s` is a single item of `count` bytes).
fn build_item(pair: pest::iterators::Pair<Rule>) -> Result<(Item, usize), String> {
    let mut count = 1usize;
    let mut code = "";
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::count => {
                count = part
                    .as_str()
                    .parse()
                    .map_err(|e| format!("count {:?}: {}", part.as_str(), e))?;
            }
            Rule::code => code = part.as_str(),
            _ => {}
        }
    }
    let item = match code {
        "s" => return Ok((Item::Bytes(count), 1)),
        "x" => Item::Pad,
        "c" => Item::Char,
        "?" => Item::Bool,
        "b" => Item::Int { width: 1, signed: true },
        "B" => Item::Int { width: 1, signed: false },
        "h" => Item::Int { width: 2, signed: true },
        "H" => Item::Int { width: 2, signed: false },
        "i" | "l" => Item::Int { width: 4, signed: true },
        "I" | "L" => Item::Int { width: 4, signed: false },
        "q" => Item::Int { width: 8, signed: true },
        "Q" => Item::Int { width: 8, signed: false },
        "f" => Item::F32,
        "d" => Item::F64,
        other => return Err(format!("unknown type code {:?}", other)),
    };
    Ok((item, count))
}

impl PackedFormat {
    /// Total encoded size in bytes.
    pub fn size(&self) -> usize {
        self.items.iter().map(Item::width).sum()
    }

    /// Number of values the format produces / consumes.
    pub fn arity(&self) -> usize {
        self.items.iter().filter(|i| i.has_value()).count()
    }

    pub fn unpack(&self, buf: &[u8]) -> Result<Vec<Value>, String> {
        if buf.len() != self.size() {
            return Err(format!(
                "unpack requires {} bytes, got {}",
                self.size(),
                buf.len()
            ));
        }
        let mut out = Vec::with_capacity(self.arity());
        let mut offset = 0;
        for item in &self.items {
            let b = &buf[offset..offset + item.width()];
            offset += item.width();
            match *item {
                Item::Pad => {}
                Item::Char | Item::Bytes(_) => out.push(Value::Bytes(b.to_vec())),
                Item::Bool => out.push(Value::Bool(b[0] != 0)),
                Item::Int { signed: true, .. } => {
                    out.push(Value::Int(bytes_to_i64(b, self.endianness)))
                }
                Item::Int { signed: false, .. } => {
                    out.push(Value::UInt(bytes_to_u64(b, self.endianness)))
                }
                Item::F32 => {
                    let x = match self.endianness {
                        Endianness::Big => BigEndian::read_f32(b),
                        Endianness::Little => LittleEndian::read_f32(b),
                    };
                    out.push(Value::Float(x as f64));
                }
                Item::F64 => {
                    let x = match self.endianness {
                        Endianness::Big => BigEndian::read_f64(b),
                        Endianness::Little => LittleEndian::read_f64(b),
                    };
                    out.push(Value::Float(x));
                }
            }
        }
        Ok(out)
    }

    pub fn pack(&self, values: &[Value]) -> Result<Vec<u8>, String> {
        if values.len() != self.arity() {
            return Err(format!(
                "format takes {} items, got {}",
                self.arity(),
                values.len()
            ));
        }
        let mut out = Vec::with_capacity(self.size());
        let mut values = values.iter().enumerate();
        for item in &self.items {
            self.pack_item(*item, &mut values, &mut out)?;
        }
        Ok(out)
    }

    /// Append one item. Padding is written as zero and takes no value.
    fn pack_item<'v>(
        &self,
        item: Item,
        values: &mut impl Iterator<Item = (usize, &'v Value)>,
        out: &mut Vec<u8>,
    ) -> Result<(), String> {
        let mut next = || values.next().ok_or_else(|| "ran out of items".to_string());
        match item {
            Item::Pad => out.push(0),
            Item::Char => {
                let (i, v) = next()?;
                match v.as_bytes() {
                    Some(b) if b.len() == 1 => out.extend_from_slice(b),
                    _ => return Err(at(i, format!("char requires 1 byte, got {}", describe(v)))),
                }
            }
            Item::Bytes(n) => {
                let (i, v) = next()?;
                match v.as_bytes() {
                    Some(b) if b.len() == n => out.extend_from_slice(b),
                    _ => return Err(at(i, format!("requires {} bytes, got {}", n, describe(v)))),
                }
            }
            Item::Bool => {
                let (i, v) = next()?;
                let b = v
                    .as_bool()
                    .ok_or_else(|| at(i, format!("requires bool, got {}", describe(v))))?;
                out.push(b as u8);
            }
            Item::Int { width, signed: false } => {
                let (i, v) = next()?;
                let x = v.as_u64().ok_or_else(|| {
                    at(i, format!("requires unsigned integer, got {}", describe(v)))
                })?;
                if !uint_fits(x, width) {
                    return Err(at(i, format!("{} out of range for {}-byte unsigned", x, width)));
                }
                out.extend(u64_to_bytes(x, width, self.endianness));
            }
            Item::Int { width, signed: true } => {
                let (i, v) = next()?;
                let x = v.as_i64().ok_or_else(|| {
                    at(i, format!("requires signed integer, got {}", describe(v)))
                })?;
                if !int_fits(x, width) {
                    return Err(at(i, format!("{} out of range for {}-byte signed", x, width)));
                }
                out.extend(i64_to_bytes(x, width, self.endianness));
            }
            Item::F32 => {
                let (i, v) = next()?;
                let x = float_of(v).map_err(|e| at(i, e))?;
                let mut buf = [0u8; 4];
                match self.endianness {
                    Endianness::Big => BigEndian::write_f32(&mut buf, x as f32),
                    Endianness::Little => LittleEndian::write_f32(&mut buf, x as f32),
                }
                out.extend_from_slice(&buf);
            }
            Item::F64 => {
                let (i, v) = next()?;
                let x = float_of(v).map_err(|e| at(i, e))?;
                let mut buf = [0u8; 8];
                match self.endianness {
                    Endianness::Big => BigEndian::write_f64(&mut buf, x),
                    Endianness::Little => LittleEndian::write_f64(&mut buf, x),
                }
                out.extend_from_slice(&buf);
            }
        }
        Ok(())
    }
}

fn at(index: usize, reason: String) -> String {
    format!("item {}: {}", index, reason)
}

fn float_of(v: &Value) -> Result<f64, String> {
    v.as_f64()
        .or_else(|| v.as_i64().map(|x| x as f64))
        .ok_or_else(|| format!("requires number, got {}", describe(v)))
}

fn describe(v: &Value) -> String {
    match v {
        Value::Bytes(b) => format!("{} bytes", b.len()),
        Value::Int(x) => format!("int {}", x),
        Value::UInt(x) => format!("uint {}", x),
        other => other.kind().to_string(),
    }
}
