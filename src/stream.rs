//! Stream adapters used by the engines.
//!
//! [`PeekReader`] gives any `Read` a one-byte lookahead so descriptions can
//! loop until end of input without the stream having to support seeking.
//! [`CountingWriter`] tracks how many bytes an encode has produced.

use std::io::{self, Read, Write};

pub struct PeekReader<R> {
    inner: R,
    peeked: Option<u8>,
    position: u64,
}

impl<R: Read> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        PeekReader {
            inner,
            peeked: None,
            position: 0,
        }
    }

    /// True if at least one more byte can be read. Buffers that byte.
    pub fn has_more(&mut self) -> io::Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        let mut b = [0u8; 1];
        loop {
            match self.inner.read(&mut b) {
                Ok(0) => return Ok(false),
                Ok(_) => {
                    self.peeked = Some(b[0]);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Bytes handed out so far (the peeked byte is not counted).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` as far as the stream allows; returns the number of bytes read.
    /// A short count means end of input.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Unwrap the inner reader. A byte buffered by [`has_more`](Self::has_more) is lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match self.peeked.take() {
            Some(b) => {
                buf[0] = b;
                1
            }
            None => self.inner.read(buf)?,
        };
        self.position += n as u64;
        Ok(n)
    }
}

pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
