//! Runtime configuration for corefile handles.
//!
//! The line-ending policy used by text output is a per-instance value: every handle
//! created by a [`CoreFileFactory`](crate::file_handler::CoreFileFactory) copies the
//! factory's configuration at construction time.
//!
//! With the `config` feature enabled the configuration can also be read from a TOML file:
//!
//! ```toml
//! line_ending = "crlf"
//! compression_level = 9
//! ```

#[cfg(feature = "config")]
use crate::error::{CoreFileError, Result};
#[cfg(feature = "config")]
use std::path::{Path, PathBuf};

/// Line terminator emitted for each `\n` written through [`puts`](crate::FileAccessor::puts)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum LineEnding {
    /// Carriage return only
    Cr,
    /// Line feed only
    Lf,
    /// Carriage return followed by line feed
    CrLf,
}

impl LineEnding {
    /// The convention of the platform this crate was built for
    pub const fn native() -> Self {
        if cfg!(windows) {
            Self::CrLf
        } else {
            Self::Lf
        }
    }

    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::native()
    }
}

/// Settings shared by every handle a factory creates
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct CoreFileConfig {
    /// Line terminator for text output
    pub line_ending: LineEnding,

    /// zlib level (1..=9) used by callers that enable compression without choosing one
    pub compression_level: u32,
}

impl Default for CoreFileConfig {
    fn default() -> Self {
        Self {
            line_ending: LineEnding::native(),
            compression_level: crate::file_handler::COMPRESS_MEDIUM,
        }
    }
}

impl CoreFileConfig {
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

#[cfg(feature = "config")]
impl CoreFileConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoreFileError::config(e.to_string()))?;
        if config.compression_level > crate::file_handler::COMPRESS_MAX {
            return Err(CoreFileError::config(format!(
                "compression_level {} is out of range 0..=9",
                config.compression_level
            )));
        }
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreFileError::file_error(format!("Failed to read config: {}", path.display()), e)
        })?;
        Self::from_toml_str(&text)
    }

    /// `<config_dir>/corefile/config.toml`, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("corefile").join("config.toml"))
    }

    /// Load the default configuration file, falling back to defaults when it is absent
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}
