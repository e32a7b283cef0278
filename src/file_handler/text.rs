//! Encoding-aware character and line I/O shared by every handle.
//!
//! The functions here back the provided methods of
//! [`FileAccessor`](crate::file_handler::FileAccessor). They only use the raw byte
//! operations of the handle plus its [`TextState`], so the same logic serves memory and
//! disk stores.
//!
//! Characters are decoded according to the byte order mark found at the start of the
//! stream and handed out as UTF-8 bytes, one per [`getc`] call.

use crate::config::{CoreFileConfig, LineEnding};
use crate::file_handler::encoding::{detect_bom, TextEncoding, BOM_PROBE_SIZE, UTF8_BOM};
use crate::file_handler::{FileAccessor, OpenFlags};
use log::debug;
use memchr::memchr;
use std::fmt;
use std::io::SeekFrom;

/// Size of the scratch buffers used by line and formatted output
pub const TEXT_BUFFER_SIZE: usize = 1024;

/// Output is flushed once the scratch buffer comes this close to capacity
const FLUSH_MARGIN: usize = 10;

const RING_SIZE: usize = 8;

/// Fixed-capacity circular queue of pending bytes
///
/// Holds the UTF-8 encoding of the last decoded character plus any pushed-back bytes.
#[derive(Debug, Clone, Default)]
struct PutbackRing {
    bytes: [u8; RING_SIZE],
    head: usize,
    tail: usize,
}

impl PutbackRing {
    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Replace the contents; only called while empty
    fn fill(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(RING_SIZE - 1);
        self.bytes[..len].copy_from_slice(&bytes[..len]);
        self.head = 0;
        self.tail = len;
    }

    fn push(&mut self, byte: u8) {
        self.bytes[self.tail] = byte;
        self.tail = (self.tail + 1) % RING_SIZE;
    }

    /// Return the byte just popped to the front of the queue
    fn unpop(&mut self, byte: u8) {
        self.head = (self.head + RING_SIZE - 1) % RING_SIZE;
        self.bytes[self.head] = byte;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.bytes[self.head];
        self.head = (self.head + 1) % RING_SIZE;
        Some(byte)
    }
}

/// Per-handle text decoding state
#[derive(Debug, Clone)]
pub struct TextState {
    flags: OpenFlags,
    line_ending: LineEnding,
    encoding: TextEncoding,
    /// Set once the byte order mark has been examined
    detected: bool,
    bom_len: u64,
    pending: PutbackRing,
}

impl TextState {
    pub fn new(flags: OpenFlags, config: &CoreFileConfig) -> Self {
        Self {
            flags,
            line_ending: config.line_ending,
            encoding: TextEncoding::Native,
            detected: false,
            bom_len: 0,
            pending: PutbackRing::default(),
        }
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Encoding in effect, [`TextEncoding::Native`] until the first character is read
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Are decoded or pushed-back bytes waiting to be read?
    pub fn has_putback(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop pending bytes; raw reads and seeks call this
    pub fn clear_putback(&mut self) {
        self.pending.clear();
    }
}

/// Read one byte of decoded text, `None` at end of file
pub fn getc<F: FileAccessor + ?Sized>(file: &mut F) -> Option<u8> {
    if !file.text_state().has_putback() {
        if file.tell() == 0 {
            skip_bom(file);
        }
        decode_next(file);
    }
    file.text_state_mut().pending.pop()
}

/// Examine the byte order mark once, then position just past it
fn skip_bom<F: FileAccessor + ?Sized>(file: &mut F) {
    if !file.text_state().detected {
        let mut probe = [0u8; BOM_PROBE_SIZE];
        // files under four bytes are never marked
        let (encoding, bom_len) = if file.read(&mut probe) == BOM_PROBE_SIZE {
            detect_bom(&probe)
        } else {
            (TextEncoding::Native, 0)
        };
        debug!("text encoding {} (byte order mark of {} bytes)", encoding.name(), bom_len);

        let state = file.text_state_mut();
        state.encoding = encoding;
        state.bom_len = bom_len as u64;
        state.detected = true;
    }

    let bom_len = file.text_state().bom_len;
    if let Err(e) = file.seek(SeekFrom::Start(bom_len)) {
        debug!("cannot reposition after byte order mark: {}", e);
    }
}

/// Decode one character at the current position into the pending ring
fn decode_next<F: FileAccessor + ?Sized>(file: &mut F) {
    let encoding = file.text_state().encoding;
    let mut probe = [0u8; 16];
    let probe = &mut probe[..encoding.probe_size()];

    let got = file.read(probe);
    let Some((c, used)) = encoding.decode(&probe[..got]) else {
        return;
    };

    if used < got {
        // rewind to the real character boundary
        if let Err(e) = file.seek(SeekFrom::Current(used as i64 - got as i64)) {
            debug!("cannot rewind after character decode: {}", e);
        }
    }

    let mut utf8 = [0u8; 4];
    let encoded = c.encode_utf8(&mut utf8);
    file.text_state_mut().pending.fill(encoded.as_bytes());
}

/// Push `c` back so the next [`getc`] returns it
pub fn ungetc<F: FileAccessor + ?Sized>(file: &mut F, c: u8) -> u8 {
    file.text_state_mut().pending.push(c);
    c
}

/// Read a line into `buf`
///
/// Any of CR, LF or CR LF ends the line and is stored as a single CR. Returns the number of
/// bytes stored (not counting the NUL written after them when there is room), or `None`
/// if nothing could be read.
pub fn gets<F: FileAccessor + ?Sized>(file: &mut F, buf: &mut [u8]) -> Option<usize> {
    let mut len = 0;

    while len < buf.len() {
        let Some(c) = getc(file) else {
            break;
        };
        match c {
            b'\r' => {
                // swallow the LF of a CR LF pair
                match getc(file) {
                    Some(b'\n') | None => {}
                    Some(next) => file.text_state_mut().pending.unpop(next),
                }
                buf[len] = b'\r';
                len += 1;
                break;
            }
            b'\n' => {
                buf[len] = b'\r';
                len += 1;
                break;
            }
            _ => {
                buf[len] = c;
                len += 1;
            }
        }
    }

    if len == 0 {
        return None;
    }
    if len < buf.len() {
        buf[len] = 0;
    }
    Some(len)
}

/// Write `s`, translating each `\n` into the configured line ending
///
/// A UTF-8 byte order mark is written first when the handle is at offset 0 unless it was
/// opened with [`OpenFlags::NO_BOM`]. Returns the number of bytes written, which can be
/// short (read-only stores write nothing).
pub fn puts<F: FileAccessor + ?Sized>(file: &mut F, s: &str) -> usize {
    let ending = file.text_state().line_ending.as_bytes();
    let mut out = Staging::new();

    if file.tell() == 0 && !file.text_state().flags.no_bom() {
        out.push(file, UTF8_BOM);
    }

    let mut rest = s.as_bytes();
    while !rest.is_empty() {
        match memchr(b'\n', rest) {
            Some(at) => {
                out.push(file, &rest[..at]);
                out.push(file, ending);
                rest = &rest[at + 1..];
            }
            None => {
                out.push(file, rest);
                rest = &[];
            }
        }
    }

    out.finish(file)
}

/// Format into a bounded buffer, then [`puts`] the result
///
/// Output beyond `TEXT_BUFFER_SIZE - 1` bytes is dropped at a character boundary.
pub fn printf<F: FileAccessor + ?Sized>(file: &mut F, args: fmt::Arguments<'_>) -> usize {
    let mut line = BoundedString::default();
    // BoundedString never fails; truncation is silent
    let _ = fmt::write(&mut line, args);
    puts(file, &line.text)
}

/// Scratch buffer for [`puts`], written out as raw chunks
struct Staging {
    buf: Vec<u8>,
    written: usize,
}

impl Staging {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(TEXT_BUFFER_SIZE),
            written: 0,
        }
    }

    fn push<F: FileAccessor + ?Sized>(&mut self, file: &mut F, mut bytes: &[u8]) {
        let limit = TEXT_BUFFER_SIZE - FLUSH_MARGIN;
        while !bytes.is_empty() {
            let room = limit - self.buf.len();
            let take = room.min(bytes.len());
            self.buf.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.buf.len() >= limit {
                self.drain(file);
            }
        }
    }

    fn drain<F: FileAccessor + ?Sized>(&mut self, file: &mut F) {
        if !self.buf.is_empty() {
            self.written += file.write(&self.buf);
            self.buf.clear();
        }
    }

    fn finish<F: FileAccessor + ?Sized>(mut self, file: &mut F) -> usize {
        self.drain(file);
        self.written
    }
}

#[derive(Default)]
struct BoundedString {
    text: String,
}

impl fmt::Write for BoundedString {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = (TEXT_BUFFER_SIZE - 1).saturating_sub(self.text.len());
        if s.len() <= room {
            self.text.push_str(s);
        } else {
            let mut cut = room;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            self.text.push_str(&s[..cut]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_handler::MemoryFile;

    fn text_file(data: &[u8]) -> MemoryFile<'_> {
        MemoryFile::borrowed(data, OpenFlags::READ, &CoreFileConfig::default())
    }

    fn read_all<F: FileAccessor + ?Sized>(file: &mut F) -> Vec<u8> {
        std::iter::from_fn(|| getc(file)).collect()
    }

    #[test]
    fn test_ring_wraps_around() {
        let mut ring = PutbackRing::default();
        ring.fill(&[1, 2, 3, 4, 5, 6]);
        for expected in 1..=6 {
            assert_eq!(ring.pop(), Some(expected));
        }
        ring.push(7);
        ring.push(8);
        ring.push(9);
        assert_eq!(ring.pop(), Some(7));
        assert_eq!(ring.pop(), Some(8));
        assert_eq!(ring.pop(), Some(9));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_getc_without_bom_reads_native() {
        let mut file = text_file(b"hi");
        assert_eq!(getc(&mut file), Some(b'h'));
        assert_eq!(file.text_state().encoding(), TextEncoding::Native);
        assert_eq!(getc(&mut file), Some(b'i'));
        assert_eq!(getc(&mut file), None);
    }

    #[test]
    fn test_getc_skips_each_bom() {
        let cases: [(&[u8], TextEncoding); 5] = [
            (&[0xef, 0xbb, 0xbf, b'A', b'B'], TextEncoding::Utf8),
            (&[0x00, 0x00, 0xfe, 0xff, 0, 0, 0, b'A', 0, 0, 0, b'B'], TextEncoding::Utf32Be),
            (&[0xff, 0xfe, 0x00, 0x00, b'A', 0, 0, 0, b'B', 0, 0, 0], TextEncoding::Utf32Le),
            (&[0xfe, 0xff, 0, b'A', 0, b'B'], TextEncoding::Utf16Be),
            (&[0xff, 0xfe, b'A', 0, b'B', 0], TextEncoding::Utf16Le),
        ];
        for (data, encoding) in cases {
            let mut file = text_file(data);
            assert_eq!(read_all(&mut file), b"AB", "{:?}", encoding);
            assert_eq!(file.text_state().encoding(), encoding);
        }
    }

    #[test]
    fn test_short_file_is_never_marked() {
        let mut file = text_file(&[0xef, 0xbb, 0xbf]);
        assert_eq!(read_all(&mut file), "\u{feff}".as_bytes());
        assert_eq!(file.text_state().encoding(), TextEncoding::Native);

        let mut file = text_file(&[0xff, 0xfe]);
        assert_eq!(read_all(&mut file), "\u{ff}\u{fe}".as_bytes());
        assert_eq!(file.text_state().encoding(), TextEncoding::Native);
    }

    #[test]
    fn test_multibyte_characters_drain_as_utf8() {
        let data = [0xfe, 0xff, 0x00, 0xe9, 0xd8, 0x3d, 0xde, 0x00, 0x00, b'!'];
        let mut file = text_file(&data);
        assert_eq!(read_all(&mut file), "é\u{1f600}!".as_bytes());
    }

    #[test]
    fn test_native_latin1_byte_is_reencoded() {
        let mut file = text_file(&[b'c', b'a', b'f', 0xe9]);
        assert_eq!(read_all(&mut file), "café".as_bytes());
    }

    #[test]
    fn test_rewinding_to_start_skips_bom_again() {
        let mut file = text_file(&[0xef, 0xbb, 0xbf, b'x']);
        assert_eq!(read_all(&mut file), b"x");
        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(read_all(&mut file), b"x");
    }

    #[test]
    fn test_ungetc_returns_pushed_byte() {
        let mut file = text_file(b"ab");
        assert_eq!(getc(&mut file), Some(b'a'));
        ungetc(&mut file, b'z');
        assert!(!file.eof());
        assert_eq!(getc(&mut file), Some(b'z'));
        assert_eq!(getc(&mut file), Some(b'b'));
        assert!(file.eof());
    }

    #[test]
    fn test_gets_crlf() {
        let mut file = text_file(b"a\r\nb");
        let mut buf = [0xffu8; 8];
        assert_eq!(gets(&mut file, &mut buf), Some(2));
        assert_eq!(&buf[..3], b"a\r\0");
        assert_eq!(gets(&mut file, &mut buf), Some(1));
        assert_eq!(&buf[..2], b"b\0");
        assert_eq!(gets(&mut file, &mut buf), None);
    }

    #[test]
    fn test_gets_bare_cr_keeps_next_char() {
        let mut file = text_file(b"a\rb");
        let mut buf = [0u8; 8];
        assert_eq!(gets(&mut file, &mut buf), Some(2));
        assert_eq!(&buf[..2], b"a\r");
        assert_eq!(getc(&mut file), Some(b'b'));
    }

    #[test]
    fn test_gets_bare_cr_before_multibyte_char() {
        let mut file = text_file("a\ré".as_bytes());
        let mut buf = [0u8; 8];
        assert_eq!(gets(&mut file, &mut buf), Some(2));
        assert_eq!(read_all(&mut file), "é".as_bytes());
    }

    #[test]
    fn test_gets_lf_becomes_cr() {
        let mut file = text_file(b"one\ntwo");
        let mut buf = [0u8; 8];
        assert_eq!(gets(&mut file, &mut buf), Some(4));
        assert_eq!(&buf[..4], b"one\r");
    }

    #[test]
    fn test_gets_stops_when_buffer_full() {
        let mut file = text_file(b"abcdef\n");
        let mut buf = [0u8; 3];
        assert_eq!(gets(&mut file, &mut buf), Some(3));
        assert_eq!(&buf, b"abc");
        assert_eq!(gets(&mut file, &mut buf), Some(3));
        assert_eq!(&buf, b"def");
    }

    #[test]
    fn test_bounded_format_truncates_on_char_boundary() {
        let mut line = BoundedString::default();
        let long = "é".repeat(TEXT_BUFFER_SIZE);
        fmt::write(&mut line, format_args!("{}", long)).unwrap();
        assert!(line.text.len() <= TEXT_BUFFER_SIZE - 1);
        assert_eq!(line.text.len(), TEXT_BUFFER_SIZE - 2);
    }
}
