//! Encoding engine: runs a description against a [`Record`] and writes bytes.

use crate::codec::{
    i64_to_bytes, int_fits, min_int_width, min_uint_width, u64_to_bytes, uint_fits, CodecError,
    Endianness, Result, MAX_INT_WIDTH,
};
use crate::packed;
use crate::record::{Record, SKIPPED_KEY};
use crate::section::{Description, Section, SectionContext, Size};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tracing::{debug, trace};

/// One section of an encode traversal. Children share the parent's sink.
pub struct SectionWriter<'w, 'd, W> {
    output: &'w mut W,
    record: &'d Record,
    context: SectionContext,
    /// Next element to consume, per field declared with `array()`.
    cursors: HashMap<String, usize>,
    /// Non-array fields already written; a second declaration is a description error.
    emitted: HashSet<String>,
    /// Next entry of the skipped-region list.
    skipped: usize,
}

/// A value pulled from the record, with its diagnostic label.
struct Fetched<'d> {
    label: String,
    value: &'d Value,
}

impl<'w, 'd, W: Write> SectionWriter<'w, 'd, W> {
    pub fn new(output: &'w mut W, record: &'d Record, context: SectionContext) -> Self {
        SectionWriter {
            output,
            record,
            context,
            cursors: HashMap::new(),
            emitted: HashSet::new(),
            skipped: 0,
        }
    }

    pub fn record(&self) -> &'d Record {
        self.record
    }

    fn mismatch(&self, label: &str, reason: impl Into<String>) -> CodecError {
        CodecError::mismatch(self.context.field_name(label), reason)
    }

    /// Record that non-array `name` is being written, failing on a repeat.
    fn claim(&mut self, name: &str) -> Result<()> {
        if name == SKIPPED_KEY {
            return Err(CodecError::description(
                self.context.field_name(name),
                "reserved for skipped regions",
            ));
        }
        if !self.cursors.contains_key(name) && !self.emitted.insert(name.to_string()) {
            return Err(CodecError::description(
                self.context.field_name(name),
                "declared more than once without array()",
            ));
        }
        Ok(())
    }

    /// The stored value for `name`: the field itself, or the next element if
    /// `name` was declared with `array()`.
    fn fetch(&mut self, name: &str) -> Result<Fetched<'d>> {
        self.claim(name)?;
        let record: &'d Record = self.record;
        let value = record
            .get(name)
            .ok_or_else(|| self.mismatch(name, "missing from record"))?;
        let Some(index) = self.cursors.get(name).copied() else {
            return Ok(Fetched {
                label: name.to_string(),
                value,
            });
        };
        let label = format!("{}[{}]", name, index);
        let list = value.as_list().ok_or_else(|| {
            self.mismatch(&label, format!("array field holds {}, not a list", value.kind()))
        })?;
        let item = list.get(index).ok_or_else(|| {
            self.mismatch(
                &label,
                format!(
                    "record has {} elements, description requires more",
                    list.len()
                ),
            )
        })?;
        self.cursors.insert(name.to_string(), index + 1);
        Ok(Fetched { label, value: item })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_all(bytes)?;
        Ok(())
    }

    fn order(&self, order: Option<Endianness>) -> Endianness {
        order.unwrap_or(self.context.byte_order)
    }

    /// Resolve the byte width of an integer field holding a value that needs
    /// `natural` bytes at minimum.
    fn int_width(&self, label: &str, size: Size, natural: usize) -> Result<usize> {
        match size {
            Size::Exact(n) if n > MAX_INT_WIDTH => Err(CodecError::description(
                self.context.field_name(label),
                format!("integer width {} exceeds {} bytes", n, MAX_INT_WIDTH),
            )),
            Size::Exact(n) => Ok(n),
            Size::Remaining => Ok(natural),
        }
    }

    fn write_uint(&mut self, label: &str, v: u64, size: Size, order: Option<Endianness>) -> Result<()> {
        let width = self.int_width(label, size, min_uint_width(v))?;
        if !uint_fits(v, width) {
            return Err(self.mismatch(
                label,
                format!("{} does not fit in {} unsigned bytes", v, width),
            ));
        }
        let buf = u64_to_bytes(v, width, self.order(order));
        self.write(&buf)
    }
}

impl<'w, 'd, W: Write> Section for SectionWriter<'w, 'd, W> {
    fn context(&self) -> &SectionContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut SectionContext {
        &mut self.context
    }

    /// Writes the next recorded skipped region, or zeros when the record has none.
    fn skip(&mut self, size: usize) -> Result<Vec<u8>> {
        let record: &'d Record = self.record;
        let Some(regions) = record.skipped() else {
            debug!(
                field = %self.context.field_name(SKIPPED_KEY),
                size,
                "no skipped regions recorded, writing zeros"
            );
            let zeros = vec![0u8; size];
            self.write(&zeros)?;
            return Ok(zeros);
        };
        let label = format!("{}[{}]", SKIPPED_KEY, self.skipped);
        let region = regions
            .get(self.skipped)
            .ok_or_else(|| self.mismatch(&label, "no skipped region left"))?
            .as_bytes()
            .ok_or_else(|| self.mismatch(&label, "skipped region is not bytes"))?;
        if region.len() != size {
            return Err(self.mismatch(
                &label,
                format!("skipped region holds {} bytes, expected {}", region.len(), size),
            ));
        }
        self.skipped += 1;
        let region = region.to_vec();
        self.write(&region)?;
        Ok(region)
    }

    fn section(&mut self, name: &str, description: &mut Description<'_>) -> Result<Record> {
        let Fetched { label, value } = self.fetch(name)?;
        let record = value.as_record().ok_or_else(|| {
            self.mismatch(&label, format!("expected a record, found {}", value.kind()))
        })?;
        let context = self.context.child(&label);
        trace!(section = %context.qualified_name().join("."), "encode section");
        let mut child = SectionWriter::new(&mut *self.output, record, context);
        description(&mut child)?;
        Ok(record.clone())
    }

    fn array(&mut self, name: &str) -> Result<()> {
        if name == SKIPPED_KEY
            || self.cursors.contains_key(name)
            || self.emitted.contains(name)
        {
            return Err(CodecError::description(
                self.context.field_name(name),
                "array() must come before any other declaration of the field",
            ));
        }
        match self.record.get(name) {
            Some(Value::List(_)) => {}
            Some(other) => {
                return Err(self.mismatch(
                    name,
                    format!("array field holds {}, not a list", other.kind()),
                ))
            }
            None => return Err(self.mismatch(name, "missing from record")),
        }
        self.cursors.insert(name.to_string(), 0);
        Ok(())
    }

    fn bytes_sized(&mut self, name: &str, size: Size) -> Result<Vec<u8>> {
        let Fetched { label, value } = self.fetch(name)?;
        let bytes = value.as_bytes().ok_or_else(|| {
            self.mismatch(&label, format!("expected bytes, found {}", value.kind()))
        })?;
        if let Size::Exact(n) = size {
            if bytes.len() != n {
                return Err(self.mismatch(
                    &label,
                    format!("holds {} bytes, declared size is {}", bytes.len(), n),
                ));
            }
        }
        self.write(bytes)?;
        Ok(bytes.to_vec())
    }

    fn int_sized(&mut self, name: &str, size: Size, order: Option<Endianness>) -> Result<i64> {
        let Fetched { label, value } = self.fetch(name)?;
        let v = value.as_i64().ok_or_else(|| {
            self.mismatch(&label, format!("expected a signed integer, found {:?}", value))
        })?;
        let width = self.int_width(&label, size, min_int_width(v))?;
        if !int_fits(v, width) {
            return Err(self.mismatch(
                &label,
                format!("{} does not fit in {} signed bytes", v, width),
            ));
        }
        let buf = i64_to_bytes(v, width, self.order(order));
        self.write(&buf)?;
        Ok(v)
    }

    fn uint_sized(&mut self, name: &str, size: Size, order: Option<Endianness>) -> Result<u64> {
        let Fetched { label, value } = self.fetch(name)?;
        let v = value.as_u64().ok_or_else(|| {
            self.mismatch(&label, format!("expected an unsigned integer, found {:?}", value))
        })?;
        self.write_uint(&label, v, size, order)?;
        Ok(v)
    }

    fn packed(&mut self, name: &str, format: &str) -> Result<Vec<Value>> {
        let Fetched { label, value } = self.fetch(name)?;
        let fmt = packed::parse(format)
            .map_err(|e| CodecError::description(self.context.field_name(&label), e))?;
        let items = match value {
            Value::Tuple(items) | Value::List(items) => items,
            other => {
                return Err(self.mismatch(
                    &label,
                    format!("expected a tuple, found {}", other.kind()),
                ))
            }
        };
        let buf = fmt.pack(items).map_err(|e| self.mismatch(&label, e))?;
        self.write(&buf)?;
        Ok(items.clone())
    }

    /// Writes the live length of `target`, ignoring any stored count.
    fn count_sized(
        &mut self,
        name: &str,
        target: &str,
        size: Size,
        order: Option<Endianness>,
    ) -> Result<u64> {
        self.claim(name)?;
        let label = match self.cursors.get_mut(name) {
            Some(index) => {
                *index += 1;
                format!("{}[{}]", name, *index - 1)
            }
            None => name.to_string(),
        };
        let len = match self.record.get(target) {
            Some(Value::List(items)) | Some(Value::Tuple(items)) => items.len(),
            Some(Value::Bytes(bytes)) => bytes.len(),
            Some(other) => {
                return Err(self.mismatch(
                    &label,
                    format!("cannot count target {:?} holding {}", target, other.kind()),
                ))
            }
            None => {
                return Err(self.mismatch(
                    &label,
                    format!("count target {:?} missing from record", target),
                ))
            }
        };
        let len = len as u64;
        self.write_uint(&label, len, size, order)?;
        Ok(len)
    }

    /// True once every declared array is consumed and no non-empty skipped
    /// region is still waiting to be replayed.
    fn eof(&mut self) -> Result<bool> {
        let record = self.record;
        let skips_pending = record.skipped().map_or(false, |regions| {
            regions
                .iter()
                .skip(self.skipped)
                .any(|r| r.as_bytes().map_or(true, |b| !b.is_empty()))
        });
        Ok(!skips_pending
            && self.cursors.iter().all(|(name, &index)| {
                record.list(name).map_or(true, |list| index >= list.len())
            }))
    }
}
