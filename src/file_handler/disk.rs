//! Buffered disk file handle with optional streaming compression
//!
//! This module provides the [`DiskFile`] implementation that wraps an OS handle with a
//! small read-ahead cache and, when enabled, a [`CodecSession`] that transparently
//! compresses writes or decompresses reads. The whole file can be pulled into memory on
//! demand with [`FileAccessor::buffer`], after which the OS handle is closed and the
//! handle behaves like a read-only [`MemoryFile`].

use crate::config::CoreFileConfig;
use crate::error::{CoreFileError, Result};
use crate::file_handler::accessor::FileAccessor;
use crate::file_handler::buffer::{to_index, ReadCache, READ_CACHE_SIZE};
use crate::file_handler::compression::{CodecMode, CodecSession, TransferResult};
use crate::file_handler::in_memory::MemoryFile;
use crate::file_handler::os::{OsFile, StdOsFile};
use crate::file_handler::text::TextState;
use crate::file_handler::{OpenFlags, COMPRESS_MAX, COMPRESS_NONE};
use log::{debug, warn};
use std::io::SeekFrom;
use std::path::Path;

/// Disk-backed file handle
///
/// Generic over the physical stream so tests can substitute one; [`DiskFile::open`]
/// uses the platform file.
#[derive(Debug)]
pub struct DiskFile<F: OsFile = StdOsFile> {
    /// Offset and length bookkeeping, plus the contents once loaded into memory
    mem: MemoryFile<'static>,
    /// `None` once the contents have been loaded into memory
    os: Option<F>,
    codec: Option<CodecSession>,
    cache: ReadCache,
    flags: OpenFlags,
}

impl DiskFile<StdOsFile> {
    /// Open `path` with the requested access mode
    ///
    /// # Errors
    /// * `FileNotFound`, `PermissionDenied` or `FileError` from the OS
    pub fn open(path: &Path, flags: OpenFlags, config: &CoreFileConfig) -> Result<Self> {
        let (os, length) = StdOsFile::open(path, flags)?;
        debug!("opened {} ({} bytes, {:?})", path.display(), length, flags);
        Ok(Self::new(os, length, flags, config))
    }
}

impl<F: OsFile> DiskFile<F> {
    /// Wrap an already-open physical stream of `length` bytes
    pub fn new(os: F, length: u64, flags: OpenFlags, config: &CoreFileConfig) -> Self {
        Self {
            mem: MemoryFile::unloaded(length, flags, config),
            os: Some(os),
            codec: None,
            cache: ReadCache::new(),
            flags,
        }
    }

    /// Is a codec session active, and in which direction?
    pub fn codec_mode(&self) -> Option<CodecMode> {
        self.codec.as_ref().map(CodecSession::mode)
    }

    /// Have the contents been loaded into memory (and the OS handle closed)?
    pub fn is_loaded(&self) -> bool {
        self.mem.is_loaded()
    }

    /// Read at `offset` through the codec session if one is active
    fn os_or_codec_read(&mut self, dest: &mut [u8], offset: u64) -> TransferResult {
        let Some(os) = self.os.as_mut() else {
            return Err(CoreFileError::invalid_access("file handle is closed").into());
        };
        match self.codec.as_mut() {
            Some(codec) => codec.read(os, dest, offset),
            None => Ok(os.read_at(dest, offset)?),
        }
    }

    fn os_or_codec_write(&mut self, src: &[u8], offset: u64) -> TransferResult {
        let Some(os) = self.os.as_mut() else {
            return Err(CoreFileError::invalid_access("file handle is closed").into());
        };
        match self.codec.as_mut() {
            Some(codec) => codec.write(os, src, offset),
            None => Ok(os.write_at(src, offset)?),
        }
    }

    /// Flush and release the active codec session
    fn stop_codec(&mut self) -> Result<()> {
        let Some(codec) = self.codec.take() else {
            return Ok(());
        };
        debug!(
            "stopping {} session at logical offset {}, physical offset {}",
            codec.mode().name(),
            codec.next_offset(),
            codec.real_offset()
        );
        match self.os.as_mut() {
            Some(os) => codec.finish(os),
            None => Ok(()),
        }
    }
}

/// Bytes moved by a transfer, logging the error that cut it short
fn settle(result: TransferResult, action: &str, len: usize, offset: u64) -> usize {
    match result {
        Ok(n) => n,
        Err(e) => {
            warn!("{} of {} bytes at {} failed: {}", action, len, offset, e);
            e.transferred
        }
    }
}

impl<F: OsFile> FileAccessor for DiskFile<F> {
    fn compress(&mut self, level: u32) -> Result<()> {
        // codec sessions only run in one direction
        if self.flags.read_access() && self.flags.write_access() {
            return Err(CoreFileError::invalid_access(
                "compression requires a read-only or write-only file",
            ));
        }

        let mut result = Ok(());
        if self.codec.is_some() && level == COMPRESS_NONE {
            result = self.stop_codec();
            if let Err(e) = &result {
                warn!("compressed stream was not finished cleanly: {}", e);
            }
        }

        if level > COMPRESS_MAX {
            return Err(CoreFileError::failure(format!(
                "compression level {} is out of range",
                level
            )));
        }

        if self.codec.is_none() && level > COMPRESS_NONE {
            if self.os.is_none() {
                return Err(CoreFileError::invalid_access(
                    "cannot compress a file loaded into memory",
                ));
            }
            let offset = self.mem.offset();
            let session = if self.flags.write_access() {
                CodecSession::start_compression(level, offset)?
            } else {
                CodecSession::start_decompression(offset)
            };
            self.codec = Some(session);
            self.cache.invalidate();
        }

        result
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<()> {
        if self.codec.is_some() {
            return Err(CoreFileError::invalid_access(
                "cannot seek while compression is enabled",
            ));
        }
        self.mem.seek(pos)
    }

    fn tell(&self) -> u64 {
        self.mem.tell()
    }

    fn eof(&self) -> bool {
        self.mem.eof()
    }

    fn size(&self) -> u64 {
        self.mem.size()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.os.is_none() || self.mem.is_loaded() {
            return self.mem.read(buf);
        }
        self.mem.text_state_mut().clear_putback();

        let offset = self.mem.offset();
        let mut bytes_read = 0;

        // consume what the cache already holds
        if self.cache.covers(offset) {
            bytes_read += self.cache.copy_out(offset, buf, 0);
        }

        if bytes_read < buf.len() {
            let remaining = buf.len() - bytes_read;
            if remaining < READ_CACHE_SIZE / 2 {
                // small request: refill the whole cache and copy from it
                let base = offset + bytes_read as u64;
                let mut fill = std::mem::take(&mut self.cache);
                let result = self.os_or_codec_read(fill.begin_fill(base), base);
                let filled = settle(result, "read", READ_CACHE_SIZE, base);
                fill.set_valid(filled);
                self.cache = fill;
                bytes_read += self.cache.copy_out(base, buf, bytes_read);
            } else {
                let at = offset + bytes_read as u64;
                let result = self.os_or_codec_read(&mut buf[bytes_read..], at);
                bytes_read += settle(result, "read", remaining, at);
            }
        }

        self.mem.add_offset(bytes_read);
        bytes_read
    }

    fn buffer(&mut self) -> Option<&[u8]> {
        if self.codec.is_some() {
            // the logical length of a compressed stream is unknown
            warn!("cannot load a file into memory while compression is enabled");
            return None;
        }
        if !self.mem.is_loaded() && self.mem.length() > 0 {
            let length = to_index(self.mem.length());
            let mut data = Vec::new();
            if data.try_reserve_exact(length).is_err() {
                warn!("cannot allocate {} bytes to load file", length);
                return None;
            }
            data.resize(length, 0);

            match self.os_or_codec_read(&mut data, 0) {
                Ok(n) if n == length => {
                    debug!("loaded {} bytes into memory; closing file", length);
                    self.os = None;
                    self.mem.load(data);
                }
                Ok(n) => {
                    warn!("short read while loading file: {} of {} bytes", n, length);
                    return None;
                }
                Err(e) => {
                    warn!("failed to load file: {}", e);
                    return None;
                }
            }
        }
        self.mem.buffer()
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if self.os.is_none() || self.mem.is_loaded() {
            return self.mem.write(buf);
        }
        self.mem.text_state_mut().clear_putback();
        self.cache.invalidate();

        let offset = self.mem.offset();
        let result = self.os_or_codec_write(buf, offset);
        let written = settle(result, "write", buf.len(), offset);
        self.mem.add_offset(written);
        written
    }

    fn truncate(&mut self, length: u64) -> Result<()> {
        let Some(os) = self.os.as_mut().filter(|_| !self.mem.is_loaded()) else {
            return self.mem.truncate(length);
        };
        os.truncate(length)?;
        self.cache.invalidate();
        self.mem.set_length(length);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(os) = self.os.as_mut().filter(|_| !self.mem.is_loaded()) else {
            return self.mem.flush();
        };
        self.mem.text_state_mut().clear_putback();
        self.cache.invalidate();
        os.flush()
    }

    fn text_state(&self) -> &TextState {
        self.mem.text_state()
    }

    fn text_state_mut(&mut self) -> &mut TextState {
        self.mem.text_state_mut()
    }
}

impl<F: OsFile> Drop for DiskFile<F> {
    fn drop(&mut self) {
        // the session has to drain before the OS handle closes
        if self.codec.is_some() {
            if let Err(e) = self.stop_codec() {
                warn!("lost compressed data while closing file: {}", e);
            }
        }
    }
}
