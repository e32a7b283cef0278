//! Factory for creating FileAccessor instances.
//!
//! [`CoreFileFactory`] opens disk files, wraps caller memory and builds proxies, handing
//! each back as a boxed [`FileAccessor`]. It carries the [`CoreFileConfig`] every handle
//! it creates is constructed with; the free functions in this module use the default
//! configuration.

use crate::config::CoreFileConfig;
use crate::error::{CoreFileError, Result};
use crate::file_handler::accessor::FileAccessor;
use crate::file_handler::disk::DiskFile;
use crate::file_handler::in_memory::MemoryFile;
use crate::file_handler::os::{OsFile, StdOsFile};
use crate::file_handler::proxy::ProxyFile;
use crate::file_handler::OpenFlags;
use log::debug;
use std::path::Path;

/// Factory for file handles
///
/// # Handle selection
/// - [`open`](Self::open): buffered disk handle, with optional compression
/// - [`open_ram`](Self::open_ram): read-only view of caller memory
/// - [`open_ram_copy`](Self::open_ram_copy): read-only handle over a private copy
/// - [`open_proxy`](Self::open_proxy): forwarding handle over another handle
#[derive(Debug, Clone, Default)]
pub struct CoreFileFactory {
    config: CoreFileConfig,
}

impl CoreFileFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CoreFileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoreFileConfig {
        &self.config
    }

    /// Open a file on disk
    ///
    /// [`OpenFlags::CREATE`] creates the file, discarding existing content.
    ///
    /// # Errors
    /// * `FileNotFound` / `PermissionDenied` / `FileError` from the OS open
    pub fn open(&self, path: &Path, flags: OpenFlags) -> Result<Box<dyn FileAccessor>> {
        let file = DiskFile::open(path, flags, &self.config)?;
        Ok(Box::new(file))
    }

    /// Read-only handle borrowing `data`
    ///
    /// # Errors
    /// * `InvalidAccess` if write or create access is requested
    pub fn open_ram<'a>(
        &self,
        data: &'a [u8],
        flags: OpenFlags,
    ) -> Result<Box<dyn FileAccessor + 'a>> {
        check_read_only(flags)?;
        Ok(Box::new(MemoryFile::borrowed(data, flags, &self.config)))
    }

    /// Read-only handle over a copy of `data`
    ///
    /// # Errors
    /// * `InvalidAccess` if write or create access is requested
    /// * `OutOfMemory` if the copy can't be allocated
    pub fn open_ram_copy(&self, data: &[u8], flags: OpenFlags) -> Result<Box<dyn FileAccessor>> {
        check_read_only(flags)?;
        Ok(Box::new(MemoryFile::copied(data, flags, &self.config)?))
    }

    /// Handle forwarding every operation to `target`
    pub fn open_proxy<'a>(&self, target: &'a mut dyn FileAccessor) -> Box<dyn FileAccessor + 'a> {
        Box::new(ProxyFile::new(target))
    }

    /// Read the whole file at `path`
    ///
    /// # Errors
    /// * `OutOfMemory` if the file doesn't fit in memory
    /// * `Failure` if fewer bytes than the file size could be read
    pub fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.load_into(path, &mut data)?;
        Ok(data)
    }

    /// Read the whole file at `path` into `data`, replacing its contents
    ///
    /// On failure `data` is left empty.
    pub fn load_into(&self, path: &Path, data: &mut Vec<u8>) -> Result<()> {
        data.clear();
        let (mut os, size) = StdOsFile::open(path, OpenFlags::READ)?;

        let length = usize::try_from(size).map_err(|_| {
            CoreFileError::out_of_memory(format!("{} bytes exceed the address space", size))
        })?;
        data.try_reserve_exact(length).map_err(|_| {
            CoreFileError::out_of_memory(format!("cannot allocate {} bytes", length))
        })?;
        data.resize(length, 0);

        let read = match os.read_at(data, 0) {
            Ok(read) => read,
            Err(e) => {
                data.clear();
                return Err(e);
            }
        };
        if read != length {
            data.clear();
            return Err(CoreFileError::failure(format!(
                "short read loading {}: {} of {} bytes",
                path.display(),
                read,
                length
            )));
        }

        debug!("loaded {} ({} bytes)", path.display(), length);
        Ok(())
    }
}

fn check_read_only(flags: OpenFlags) -> Result<()> {
    if flags.write_access() {
        return Err(CoreFileError::invalid_access("memory files are read-only"));
    }
    Ok(())
}

/// [`CoreFileFactory::open`] with the default configuration
pub fn open(path: &Path, flags: OpenFlags) -> Result<Box<dyn FileAccessor>> {
    CoreFileFactory::new().open(path, flags)
}

/// [`CoreFileFactory::open_ram`] with the default configuration
pub fn open_ram(data: &[u8], flags: OpenFlags) -> Result<Box<dyn FileAccessor + '_>> {
    CoreFileFactory::new().open_ram(data, flags)
}

/// [`CoreFileFactory::open_ram_copy`] with the default configuration
pub fn open_ram_copy(data: &[u8], flags: OpenFlags) -> Result<Box<dyn FileAccessor>> {
    CoreFileFactory::new().open_ram_copy(data, flags)
}

pub fn open_proxy(target: &mut dyn FileAccessor) -> Box<dyn FileAccessor + '_> {
    CoreFileFactory::new().open_proxy(target)
}

/// [`CoreFileFactory::load`] with the default configuration
pub fn load(path: &Path) -> Result<Vec<u8>> {
    CoreFileFactory::new().load(path)
}

pub fn load_into(path: &Path, data: &mut Vec<u8>) -> Result<()> {
    CoreFileFactory::new().load_into(path, data)
}
