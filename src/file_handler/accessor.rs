//! Core file access abstraction.
//!
//! This module defines the [`FileAccessor`] trait implemented by memory, disk and proxy
//! handles. The byte-level operations are required methods; the text operations are
//! provided on top of them and of the handle's [`TextState`].

use crate::error::Result;
use crate::file_handler::text::{self, TextState};
use std::fmt;
use std::io::SeekFrom;

/// Common interface of every file handle
///
/// Offsets are byte positions in the logical stream: for a handle with compression
/// enabled, positions in the uncompressed data.
pub trait FileAccessor: fmt::Debug {
    /// Enable (`level` 1..=9) or disable (`level` 0) streaming zlib compression
    ///
    /// Writable handles compress what is written from the current offset on; read-only
    /// handles decompress what follows the current offset. While enabled, the handle is
    /// strictly sequential and cannot seek.
    ///
    /// # Errors
    /// * `InvalidAccess` for stores that cannot compress, or handles open for both read
    ///   and write
    /// * `InvalidData` if flushing the compressed stream fails on disable
    fn compress(&mut self, level: u32) -> Result<()>;

    /// Move the current offset; positions past the end are allowed
    ///
    /// Drops any pushed-back characters.
    ///
    /// # Errors
    /// * `InvalidAccess` while compression is enabled
    /// * `Failure` if the resulting position would be negative
    fn seek(&mut self, pos: SeekFrom) -> Result<()>;

    /// Current offset
    fn tell(&self) -> u64;

    /// True at or past the end with no pushed-back characters waiting
    fn eof(&self) -> bool;

    /// Length of the file in bytes
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes; a short count signals end of data
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Whole-file contents, loading them into memory first when needed
    ///
    /// Returns `None` if the contents can't be materialized.
    fn buffer(&mut self) -> Option<&[u8]>;

    /// Write `buf` at the current offset, returning the number of bytes written
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Set the length of the file, clamping the offset when it shrinks past it
    ///
    /// # Errors
    /// * `Failure` when asked to grow a memory store
    /// * OS errors for disk handles
    fn truncate(&mut self, length: u64) -> Result<()>;

    /// Drop pushed-back characters and cached data, and flush OS buffers
    fn flush(&mut self) -> Result<()>;

    /// Text decoding state used by the provided character methods
    fn text_state(&self) -> &TextState;

    fn text_state_mut(&mut self) -> &mut TextState;

    /// Read one byte of decoded text (UTF-8), `None` at end of file
    fn getc(&mut self) -> Option<u8> {
        text::getc(self)
    }

    /// Push a byte back for the next [`getc`](FileAccessor::getc)
    fn ungetc(&mut self, c: u8) -> u8 {
        text::ungetc(self, c)
    }

    /// Read a line, storing its terminator as a single CR
    ///
    /// Returns the number of bytes stored, or `None` when nothing was read.
    fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        text::gets(self, buf)
    }

    /// Write text with `\n` translated to the configured line ending
    fn puts(&mut self, s: &str) -> usize {
        text::puts(self, s)
    }

    /// Write formatted text through a bounded buffer
    ///
    /// ```
    /// # use corefile::file_handler::{open_ram, FileAccessor, OpenFlags};
    /// let mut file = open_ram(b"", OpenFlags::READ).unwrap();
    /// assert_eq!(file.printf(format_args!("{} + {}", 1, 2)), 0); // memory stores are read-only
    /// ```
    fn printf(&mut self, args: fmt::Arguments<'_>) -> usize {
        text::printf(self, args)
    }
}
