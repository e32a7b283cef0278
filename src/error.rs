//! Error types and handling infrastructure for corefile.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! the library error type. The binary layers `anyhow` context on top.
//!
//! Every fallible operation in the crate reports one of the variants below. Short
//! reads and writes are *not* errors: callers compare the requested length with the
//! transferred byte count.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for corefile operations.
#[derive(Error, Debug)]
pub enum CoreFileError {
    /// Operating system level failure (read, write, truncate, flush)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found when opening by path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Permission denied when opening by path
    #[error("Permission denied accessing file: {path}")]
    PermissionDenied { path: PathBuf },

    /// A buffer could not be allocated
    #[error("Out of memory: {message}")]
    OutOfMemory { message: String },

    /// Operation not permitted in the handle's current mode or state
    #[error("Invalid access: {message}")]
    InvalidAccess { message: String },

    /// Compressed stream or encoded data is corrupt
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic failure for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Failure { message: String },
}

/// Coarse classification of a [`CoreFileError`].
///
/// Mirrors the error codes callers usually branch on, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Failure,
    OutOfMemory,
    InvalidAccess,
    InvalidData,
    NotFound,
    AccessDenied,
}

/// Standard Result type for corefile operations.
pub type Result<T> = std::result::Result<T, CoreFileError>;

impl CoreFileError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create an OutOfMemory error with a descriptive message
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::OutOfMemory {
            message: message.into(),
        }
    }

    /// Create an InvalidAccess error with a descriptive message
    pub fn invalid_access(message: impl Into<String>) -> Self {
        Self::InvalidAccess {
            message: message.into(),
        }
    }

    /// Create an InvalidData error with a descriptive message
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a generic Failure with a descriptive message
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Attach the path to an error produced while opening `path`
    pub fn for_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path: path.into() },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path.into() },
            _ => Self::file_error(format!("Failed to open {}", path.into().display()), err),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileError { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
                std::io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
                _ => ErrorKind::Failure,
            },
            Self::FileNotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::AccessDenied,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::InvalidAccess { .. } => ErrorKind::InvalidAccess,
            Self::InvalidData { .. } => ErrorKind::InvalidData,
            Self::ConfigError { .. } | Self::Failure { .. } => ErrorKind::Failure,
        }
    }
}

// Automatic conversion from io::Error to CoreFileError
impl From<std::io::Error> for CoreFileError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
