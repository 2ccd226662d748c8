//! Decoding engine: runs a description against a byte stream and builds a [`Record`].

use crate::codec::{bytes_to_i64, bytes_to_u64, CodecError, Endianness, Result, MAX_INT_WIDTH};
use crate::packed;
use crate::record::{Record, SKIPPED_KEY};
use crate::section::{Description, Section, SectionContext, Size};
use crate::stream::PeekReader;
use crate::value::Value;
use std::collections::HashSet;
use std::io::Read;
use tracing::trace;

/// Largest single read while filling a fixed-size field.
const READ_CHUNK: usize = 8 * 1024;

/// One section of a decode traversal. Children share the parent's stream.
pub struct SectionReader<'r, R> {
    input: &'r mut PeekReader<R>,
    context: SectionContext,
    record: Record,
    /// Names declared with `array()`; later writes append instead of failing.
    arrays: HashSet<String>,
}

impl<'r, R: Read> SectionReader<'r, R> {
    pub fn new(input: &'r mut PeekReader<R>, context: SectionContext) -> Self {
        SectionReader {
            input,
            context,
            record: Record::new(),
            arrays: HashSet::new(),
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Name used in diagnostics; array elements get their index.
    fn label(&self, name: &str) -> String {
        match self.record.list(name) {
            Some(list) if self.arrays.contains(name) => format!("{}[{}]", name, list.len()),
            _ => name.to_string(),
        }
    }

    /// Fails unless `name` may receive a value; checked before any byte is read.
    fn check_declarable(&self, name: &str) -> Result<()> {
        if name == SKIPPED_KEY {
            return Err(CodecError::description(
                self.context.field_name(name),
                "reserved for skipped regions",
            ));
        }
        if self.record.contains(name) && !self.arrays.contains(name) {
            return Err(CodecError::description(
                self.context.field_name(name),
                "declared more than once without array()",
            ));
        }
        Ok(())
    }

    fn store(&mut self, name: &str, value: Value) -> Result<()> {
        if self.arrays.contains(name) {
            match self.record.list_mut(name) {
                Some(list) => list.push(value),
                None => {
                    return Err(CodecError::description(
                        self.context.field_name(name),
                        "array field no longer holds a list",
                    ))
                }
            }
        } else {
            self.record.insert(name, value);
        }
        Ok(())
    }

    fn read_field(&mut self, label: &str, size: Size) -> Result<Vec<u8>> {
        match size {
            Size::Remaining => {
                let mut buf = Vec::new();
                self.input.read_to_end(&mut buf)?;
                Ok(buf)
            }
            Size::Exact(n) => {
                // Sizes may come from the input itself; grow with the data actually read.
                let mut buf = Vec::with_capacity(n.min(READ_CHUNK));
                let mut chunk = [0u8; READ_CHUNK];
                while buf.len() < n {
                    let want = (n - buf.len()).min(READ_CHUNK);
                    let got = self.input.read_up_to(&mut chunk[..want])?;
                    buf.extend_from_slice(&chunk[..got]);
                    if got < want {
                        break;
                    }
                }
                if buf.len() < n {
                    return Err(CodecError::Truncated {
                        field: self.context.field_name(label),
                        expected: n,
                        actual: buf.len(),
                    });
                }
                Ok(buf)
            }
        }
    }

    fn check_int_width(&self, label: &str, size: Size) -> Result<()> {
        match size {
            Size::Exact(n) if n > MAX_INT_WIDTH => Err(CodecError::description(
                self.context.field_name(label),
                format!("integer width {} exceeds {} bytes", n, MAX_INT_WIDTH),
            )),
            _ => Ok(()),
        }
    }

    /// Read the raw bytes of an integer field of either signedness.
    fn read_int_bytes(&mut self, name: &str, size: Size) -> Result<Vec<u8>> {
        self.check_declarable(name)?;
        let label = self.label(name);
        self.check_int_width(&label, size)?;
        let buf = self.read_field(&label, size)?;
        if buf.len() > MAX_INT_WIDTH {
            return Err(CodecError::mismatch(
                self.context.field_name(&label),
                format!("{} remaining bytes do not fit an integer", buf.len()),
            ));
        }
        Ok(buf)
    }

    fn order(&self, order: Option<Endianness>) -> Endianness {
        order.unwrap_or(self.context.byte_order)
    }
}

impl<'r, R: Read> Section for SectionReader<'r, R> {
    fn context(&self) -> &SectionContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut SectionContext {
        &mut self.context
    }

    fn skip(&mut self, size: usize) -> Result<Vec<u8>> {
        let buf = self.read_field(SKIPPED_KEY, Size::Exact(size))?;
        match self.record.get_mut(SKIPPED_KEY) {
            Some(Value::List(regions)) => regions.push(Value::Bytes(buf.clone())),
            _ => {
                self.record
                    .insert(SKIPPED_KEY, Value::List(vec![Value::Bytes(buf.clone())]));
            }
        }
        Ok(buf)
    }

    fn section(&mut self, name: &str, description: &mut Description<'_>) -> Result<Record> {
        self.check_declarable(name)?;
        let label = self.label(name);
        let context = self.context.child(&label);
        trace!(section = %context.qualified_name().join("."), "decode section");
        let mut child = SectionReader::new(&mut *self.input, context);
        description(&mut child)?;
        let record = child.into_record();
        self.store(name, Value::Record(record.clone()))?;
        Ok(record)
    }

    fn array(&mut self, name: &str) -> Result<()> {
        if name == SKIPPED_KEY || self.record.contains(name) {
            return Err(CodecError::description(
                self.context.field_name(name),
                "array() must come before any other declaration of the field",
            ));
        }
        self.arrays.insert(name.to_string());
        self.record.insert(name, Value::List(Vec::new()));
        Ok(())
    }

    fn bytes_sized(&mut self, name: &str, size: Size) -> Result<Vec<u8>> {
        self.check_declarable(name)?;
        let label = self.label(name);
        let buf = self.read_field(&label, size)?;
        self.store(name, Value::Bytes(buf.clone()))?;
        Ok(buf)
    }

    fn int_sized(&mut self, name: &str, size: Size, order: Option<Endianness>) -> Result<i64> {
        let buf = self.read_int_bytes(name, size)?;
        let v = bytes_to_i64(&buf, self.order(order));
        self.store(name, Value::Int(v))?;
        Ok(v)
    }

    fn uint_sized(&mut self, name: &str, size: Size, order: Option<Endianness>) -> Result<u64> {
        let buf = self.read_int_bytes(name, size)?;
        let v = bytes_to_u64(&buf, self.order(order));
        self.store(name, Value::UInt(v))?;
        Ok(v)
    }

    fn packed(&mut self, name: &str, format: &str) -> Result<Vec<Value>> {
        self.check_declarable(name)?;
        let label = self.label(name);
        let fmt = packed::parse(format)
            .map_err(|e| CodecError::description(self.context.field_name(&label), e))?;
        let buf = self.read_field(&label, Size::Exact(fmt.size()))?;
        let items = fmt
            .unpack(&buf)
            .map_err(|e| CodecError::description(self.context.field_name(&label), e))?;
        self.store(name, Value::Tuple(items.clone()))?;
        Ok(items)
    }

    /// Reads the stored count as-is; it is not checked against `target`.
    fn count_sized(
        &mut self,
        name: &str,
        _target: &str,
        size: Size,
        order: Option<Endianness>,
    ) -> Result<u64> {
        self.uint_sized(name, size, order)
    }

    fn eof(&mut self) -> Result<bool> {
        Ok(!self.input.has_more()?)
    }
}
