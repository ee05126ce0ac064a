//! Offset-tracking reader
//!
//! [`OffsetReader`] keeps a copy of every byte that passes through it. That
//! copy serves two purposes:
//!
//! - after a single pass (e.g. a TIFF decode) it is the raw buffer that
//!   offset-addressed accessors index into
//! - during a HEIC box walk it lets a reader be repositioned at an absolute
//!   offset of the original stream, whether that offset was already read
//!   (served from the copy, then passed through) or lies ahead (skipped)

use std::io::{self, Chain, Cursor, Read};

/// A reader that records everything read through it
#[derive(Debug)]
pub struct OffsetReader<R> {
    inner: R,
    seen: Vec<u8>,
}

impl<R: Read> OffsetReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            seen: Vec::new(),
        }
    }

    /// Number of bytes consumed so far
    pub fn position(&self) -> u64 {
        self.seen.len() as u64
    }

    /// Bytes consumed so far
    pub fn seen(&self) -> &[u8] {
        &self.seen
    }

    /// Give up the reader and keep the consumed bytes
    pub fn into_seen(self) -> Vec<u8> {
        self.seen
    }

    /// Reposition at `offset`, counted from the first byte ever read
    ///
    /// Offsets inside the consumed prefix are served from the buffered copy,
    /// followed by the rest of the stream. Offsets ahead of the current
    /// position are reached by skipping; running out of stream first is an
    /// `UnexpectedEof` error.
    pub fn into_reader_at(self, offset: u64) -> io::Result<Chain<Cursor<Vec<u8>>, R>> {
        let consumed = self.position();
        let Self {
            mut inner,
            mut seen,
        } = self;

        if offset <= consumed {
            seen.drain(..offset as usize);
            return Ok(Cursor::new(seen).chain(inner));
        }

        let skip = offset - consumed;
        let skipped = io::copy(&mut (&mut inner).take(skip), &mut io::sink())?;
        if skipped < skip {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("offset {offset} is past the end of the stream"),
            ));
        }
        Ok(Cursor::new(Vec::new()).chain(inner))
    }
}

impl<R: Read> Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.seen.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}
