//! Text encodings recognised by byte-order mark, and single-character decoding.
//!
//! Each decoder takes a probe chunk starting at a character boundary and returns the
//! decoded character together with the number of *bytes* it occupied, so the caller can
//! rewind the unused tail of the probe. Malformed sequences decode to U+FFFD and consume
//! the malformed prefix so that reading always makes progress.

use bstr::decode_utf8;

/// Encoding of a text stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// No byte order mark: platform multibyte encoding
    #[default]
    Native,
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
}

/// Byte order marks in match order: longest prefixes that share a start come first
const BOMS: &[(&[u8], TextEncoding)] = &[
    (&[0xef, 0xbb, 0xbf], TextEncoding::Utf8),
    (&[0x00, 0x00, 0xfe, 0xff], TextEncoding::Utf32Be),
    (&[0xff, 0xfe, 0x00, 0x00], TextEncoding::Utf32Le),
    (&[0xfe, 0xff], TextEncoding::Utf16Be),
    (&[0xff, 0xfe], TextEncoding::Utf16Le),
];

/// UTF-8 byte order mark written ahead of text output
pub const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

/// Number of bytes examined when sniffing a byte order mark
pub const BOM_PROBE_SIZE: usize = 4;

/// Identify the encoding announced by the leading bytes of a stream
///
/// Returns the encoding and the length of its byte order mark (0 for [`TextEncoding::Native`]).
pub fn detect_bom(lead: &[u8]) -> (TextEncoding, usize) {
    BOMS.iter()
        .find(|(bom, _)| lead.starts_with(bom))
        .map(|(bom, encoding)| (*encoding, bom.len()))
        .unwrap_or((TextEncoding::Native, 0))
}

impl TextEncoding {
    /// Bytes read ahead to decode one character
    pub fn probe_size(&self) -> usize {
        match self {
            Self::Native => 16,
            Self::Utf8 => 4,
            Self::Utf16Be | Self::Utf16Le => 4,
            Self::Utf32Be | Self::Utf32Le => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Utf8 => "utf-8",
            Self::Utf16Be => "utf-16be",
            Self::Utf16Le => "utf-16le",
            Self::Utf32Be => "utf-32be",
            Self::Utf32Le => "utf-32le",
        }
    }

    /// Decode the first character of `chunk`
    ///
    /// Returns `None` when the chunk doesn't hold a complete code unit (end of stream).
    pub fn decode(&self, chunk: &[u8]) -> Option<(char, usize)> {
        match self {
            Self::Native => decode_native(chunk),
            Self::Utf8 => decode_utf8_char(chunk),
            Self::Utf16Be => decode_utf16(chunk, u16::from_be_bytes),
            Self::Utf16Le => decode_utf16(chunk, u16::from_le_bytes),
            Self::Utf32Be => decode_utf32(chunk, u32::from_be_bytes),
            Self::Utf32Le => decode_utf32(chunk, u32::from_le_bytes),
        }
    }
}

fn decode_utf8_char(chunk: &[u8]) -> Option<(char, usize)> {
    if chunk.is_empty() {
        return None;
    }
    match decode_utf8(chunk) {
        (Some(c), size) => Some((c, size)),
        (None, size) => Some((char::REPLACEMENT_CHARACTER, size.max(1))),
    }
}

/// Multibyte text without a mark: UTF-8 where it is valid, otherwise one Latin-1 byte
fn decode_native(chunk: &[u8]) -> Option<(char, usize)> {
    let first = *chunk.first()?;
    match decode_utf8(chunk) {
        (Some(c), size) => Some((c, size)),
        (None, _) => Some((char::from(first), 1)),
    }
}

fn decode_utf16(chunk: &[u8], unit: fn([u8; 2]) -> u16) -> Option<(char, usize)> {
    let units: Vec<u16> = chunk
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    match char::decode_utf16(units).next()? {
        Ok(c) => Some((c, c.len_utf16() * 2)),
        Err(_) => Some((char::REPLACEMENT_CHARACTER, 2)),
    }
}

fn decode_utf32(chunk: &[u8], unit: fn([u8; 4]) -> u32) -> Option<(char, usize)> {
    let bytes: [u8; 4] = chunk.get(..4)?.try_into().ok()?;
    let c = char::from_u32(unit(bytes)).unwrap_or(char::REPLACEMENT_CHARACTER);
    Some((c, 4))
}
