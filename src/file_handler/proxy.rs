//! Forwarding handle over another file accessor
//!
//! A [`ProxyFile`] borrows another handle and forwards every operation to it, including
//! the text operations, so the two share offset, putback and decoding state. The target
//! is never closed by the proxy; the borrow guarantees it outlives the proxy.

use crate::error::Result;
use crate::file_handler::accessor::FileAccessor;
use crate::file_handler::text::TextState;
use std::fmt;
use std::io::SeekFrom;

pub struct ProxyFile<'a> {
    inner: &'a mut dyn FileAccessor,
}

impl<'a> ProxyFile<'a> {
    pub fn new(inner: &'a mut dyn FileAccessor) -> Self {
        Self { inner }
    }

    /// The handle the proxy forwards to
    pub fn target(&mut self) -> &mut dyn FileAccessor {
        &mut *self.inner
    }
}

impl fmt::Debug for ProxyFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFile")
            .field("offset", &self.inner.tell())
            .field("size", &self.inner.size())
            .finish()
    }
}

impl FileAccessor for ProxyFile<'_> {
    fn compress(&mut self, level: u32) -> Result<()> {
        self.inner.compress(level)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<()> {
        self.inner.seek(pos)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn eof(&self) -> bool {
        self.inner.eof()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.inner.read(buf)
    }

    fn buffer(&mut self) -> Option<&[u8]> {
        self.inner.buffer()
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.inner.write(buf)
    }

    fn truncate(&mut self, length: u64) -> Result<()> {
        self.inner.truncate(length)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn text_state(&self) -> &TextState {
        self.inner.text_state()
    }

    fn text_state_mut(&mut self) -> &mut TextState {
        self.inner.text_state_mut()
    }

    fn getc(&mut self) -> Option<u8> {
        self.inner.getc()
    }

    fn ungetc(&mut self, c: u8) -> u8 {
        self.inner.ungetc(c)
    }

    fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.inner.gets(buf)
    }

    fn puts(&mut self, s: &str) -> usize {
        self.inner.puts(s)
    }

    fn printf(&mut self, args: fmt::Arguments<'_>) -> usize {
        self.inner.printf(args)
    }
}
