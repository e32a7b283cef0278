//! File handling abstraction over disk, memory and proxy stores.
//!
//! All handles implement [`FileAccessor`]. Disk handles can stream their content through
//! zlib ([`FileAccessor::compress`]); every handle supports encoding-aware text I/O
//! (byte-order-mark detection, line-ending normalization) through the provided trait
//! methods.

pub mod accessor;
pub mod buffer;
pub mod compression;
pub mod disk;
pub mod encoding;
pub mod factory;
pub mod filename;
pub mod in_memory;
pub mod os;
pub mod proxy;
pub mod text;

// Re-export main types for convenience
pub use accessor::FileAccessor;
pub use compression::{CodecMode, CodecSession, PartialTransfer, TransferResult};
pub use disk::DiskFile;
pub use encoding::TextEncoding;
pub use factory::{load, load_into, open, open_proxy, open_ram, open_ram_copy, CoreFileFactory};
pub use filename::{ends_with_extension, extract_base};
pub use in_memory::MemoryFile;
pub use os::{OsFile, StdOsFile};
pub use proxy::ProxyFile;
pub use text::TextState;

bitflags::bitflags! {
    /// Access mode requested when opening a handle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Open for reading
        const READ = 0b0000_0001;
        /// Open for writing
        const WRITE = 0b0000_0010;
        /// Create the file, truncating any existing content
        const CREATE = 0b0000_0100;
        /// Don't emit a byte order mark when text is written at offset 0
        const NO_BOM = 0b0000_1000;
    }
}

impl OpenFlags {
    pub fn read_access(&self) -> bool {
        self.contains(Self::READ)
    }

    pub fn write_access(&self) -> bool {
        self.intersects(Self::WRITE | Self::CREATE)
    }

    pub fn no_bom(&self) -> bool {
        self.contains(Self::NO_BOM)
    }
}

/// Compression level that disables an active codec session
pub const COMPRESS_NONE: u32 = 0;
/// Fastest zlib level
pub const COMPRESS_MIN: u32 = 1;
/// Balanced zlib level
pub const COMPRESS_MEDIUM: u32 = 6;
/// Smallest output
pub const COMPRESS_MAX: u32 = 9;
