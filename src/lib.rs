//! # corefile - Uniform File Handles over Disk, Memory and Proxies
//!
//! A small I/O layer giving one interface to files on disk, byte regions in memory and
//! forwarding proxies, with streaming zlib compression and encoding-aware text I/O.
//!
//! ## Features
//!
//! - **One Interface**: every handle implements [`FileAccessor`]
//! - **Buffered Disk Access**: small read-ahead cache with lazy whole-file loading
//! - **Streaming Compression**: transparent zlib deflate/inflate on sequential handles
//! - **Text I/O**: byte-order-mark detection, UTF-8/16/32 decoding and line-ending
//!   normalization
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - Line-ending and compression defaults
//! - [`file_handler`] - Handles, codec sessions, text decoding and the factory
//!
//! ```no_run
//! use corefile::file_handler::{open, FileAccessor, OpenFlags};
//! use std::path::Path;
//!
//! # fn main() -> corefile::Result<()> {
//! let mut file = open(Path::new("notes.txt"), OpenFlags::WRITE | OpenFlags::CREATE)?;
//! file.puts("first line\nsecond line\n");
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod file_handler;

// Re-export commonly used types for convenience
pub use config::{CoreFileConfig, LineEnding};
pub use error::{CoreFileError, ErrorKind, Result};
pub use file_handler::{CoreFileFactory, FileAccessor, OpenFlags};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
