//! Positional access to a platform file handle.
//!
//! [`OsFile`] is the physical byte stream underneath a [`DiskFile`](super::DiskFile) and
//! the destination of a [`CodecSession`](super::CodecSession). Closing happens on drop.

use crate::error::{CoreFileError, Result};
use crate::file_handler::OpenFlags;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Physical stream operations, addressed by absolute offset
pub trait OsFile: std::fmt::Debug {
    /// Read up to `buf.len()` bytes at `offset`; fewer bytes means end of data
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write `buf` at `offset`, returning the number of bytes written
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize>;

    fn truncate(&mut self, length: u64) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// [`OsFile`] backed by `std::fs::File`
#[derive(Debug)]
pub struct StdOsFile {
    file: File,
}

impl StdOsFile {
    /// Open `path` with the given access mode, returning the handle and its length
    pub fn open(path: &Path, flags: OpenFlags) -> Result<(Self, u64)> {
        let mut options = OpenOptions::new();
        options.read(flags.read_access()).write(flags.write_access());
        if flags.contains(OpenFlags::CREATE) {
            options.create(true).truncate(true).write(true);
        }

        let file = options
            .open(path)
            .map_err(|e| CoreFileError::for_path(e, path))?;
        let length = file
            .metadata()
            .map_err(|e| CoreFileError::file_error("Failed to get file metadata", e))?
            .len();

        Ok((Self { file }, length))
    }
}

impl OsFile for StdOsFile {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| CoreFileError::file_error("Failed to seek file", e))?;

        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CoreFileError::file_error("Failed to read file", e)),
            }
        }
        Ok(total)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| CoreFileError::file_error("Failed to seek file", e))?;
        self.file
            .write_all(buf)
            .map_err(|e| CoreFileError::file_error("Failed to write file", e))?;
        Ok(buf.len())
    }

    fn truncate(&mut self, length: u64) -> Result<()> {
        self.file
            .set_len(length)
            .map_err(|e| CoreFileError::file_error("Failed to truncate file", e))
    }

    fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| CoreFileError::file_error("Failed to flush file", e))
    }
}

/// In-memory physical stream used by unit tests
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct VecOsFile {
    pub data: Vec<u8>,
    /// Cap on bytes returned per read, to simulate a short read
    pub read_limit: Option<usize>,
    pub writes: usize,
}

#[cfg(test)]
impl VecOsFile {
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl OsFile for VecOsFile {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let start = (offset as usize).min(self.data.len());
        let mut count = (self.data.len() - start).min(buf.len());
        if let Some(limit) = self.read_limit {
            count = count.min(limit);
        }
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        Ok(count)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        let start = offset as usize;
        if self.data.len() < start + buf.len() {
            self.data.resize(start + buf.len(), 0);
        }
        self.data[start..start + buf.len()].copy_from_slice(buf);
        self.writes += 1;
        Ok(buf.len())
    }

    fn truncate(&mut self, length: u64) -> Result<()> {
        self.data.truncate(length as usize);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
