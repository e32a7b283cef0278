//! Read-only file handle over a byte region
//!
//! The region is either borrowed from the caller or owned by the handle. Disk handles
//! reuse this type for their offset bookkeeping and for the contents they load into
//! memory.

use crate::config::CoreFileConfig;
use crate::error::{CoreFileError, Result};
use crate::file_handler::accessor::FileAccessor;
use crate::file_handler::buffer::{safe_buffer_copy, to_index};
use crate::file_handler::text::TextState;
use crate::file_handler::OpenFlags;
use std::borrow::Cow;
use std::io::SeekFrom;

/// In-memory file handle
///
/// `Cow::Borrowed` regions alias caller memory and are never freed by the handle;
/// `Cow::Owned` regions are allocated by it and freed on drop or [`MemoryFile::purge`].
#[derive(Debug)]
pub struct MemoryFile<'a> {
    text: TextState,
    /// File data, `None` until loaded
    data: Option<Cow<'a, [u8]>>,
    offset: u64,
    length: u64,
}

impl<'a> MemoryFile<'a> {
    /// Handle aliasing `data`
    pub fn borrowed(data: &'a [u8], flags: OpenFlags, config: &CoreFileConfig) -> Self {
        Self {
            text: TextState::new(flags, config),
            data: Some(Cow::Borrowed(data)),
            offset: 0,
            length: data.len() as u64,
        }
    }

    /// Handle over a private copy of `data`
    ///
    /// # Errors
    /// * `OutOfMemory` if the copy can't be allocated
    pub fn copied(data: &[u8], flags: OpenFlags, config: &CoreFileConfig) -> Result<Self> {
        let mut owned = Vec::new();
        owned.try_reserve_exact(data.len()).map_err(|_| {
            CoreFileError::out_of_memory(format!("cannot copy {} bytes", data.len()))
        })?;
        owned.extend_from_slice(data);
        Ok(Self::owned(owned, flags, config))
    }

    /// Handle taking ownership of `data`
    pub fn owned(data: Vec<u8>, flags: OpenFlags, config: &CoreFileConfig) -> Self {
        let length = data.len() as u64;
        Self {
            text: TextState::new(flags, config),
            data: Some(Cow::Owned(data)),
            offset: 0,
            length,
        }
    }

    /// Unloaded region of `length` bytes, used by disk handles
    pub(crate) fn unloaded(length: u64, flags: OpenFlags, config: &CoreFileConfig) -> Self {
        Self {
            text: TextState::new(flags, config),
            data: None,
            offset: 0,
            length,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Was the region allocated by this handle?
    pub fn is_owned(&self) -> bool {
        matches!(self.data, Some(Cow::Owned(_)))
    }

    /// Install a region loaded by a disk handle
    pub(crate) fn load(&mut self, data: Vec<u8>) {
        self.data = Some(Cow::Owned(data));
    }

    /// Release the region; owned data is freed, borrowed data is left alone
    pub fn purge(&mut self) {
        self.data = None;
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn length(&self) -> u64 {
        self.length
    }

    /// Advance past written data, growing the length to cover it
    pub(crate) fn add_offset(&mut self, increment: usize) {
        self.offset += increment as u64;
        self.length = self.length.max(self.offset);
    }

    pub(crate) fn set_length(&mut self, length: u64) {
        self.length = length;
        self.offset = self.offset.min(length);
    }

    fn contents(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[..to_index(self.length).min(data.len())],
            None => &[],
        }
    }
}

impl FileAccessor for MemoryFile<'_> {
    fn compress(&mut self, _level: u32) -> Result<()> {
        Err(CoreFileError::invalid_access("memory files cannot be compressed"))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<()> {
        self.text.clear_putback();

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta),
            SeekFrom::End(delta) => self.length.checked_add_signed(delta),
        };
        self.offset = target.ok_or_else(|| {
            CoreFileError::failure(format!("seek to {:?} leaves the start of the file", pos))
        })?;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.offset
    }

    fn eof(&self) -> bool {
        !self.text.has_putback() && self.offset >= self.length
    }

    fn size(&self) -> u64 {
        self.length
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.text.clear_putback();

        let count = safe_buffer_copy(self.contents(), to_index(self.offset), buf, 0);
        self.offset += count as u64;
        count
    }

    fn buffer(&mut self) -> Option<&[u8]> {
        self.data.as_ref()?;
        Some(self.contents())
    }

    fn write(&mut self, _buf: &[u8]) -> usize {
        0
    }

    fn truncate(&mut self, length: u64) -> Result<()> {
        if length > self.length {
            return Err(CoreFileError::failure(format!(
                "cannot grow a memory file from {} to {} bytes",
                self.length, length
            )));
        }
        self.set_length(length);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.text.clear_putback();
        Ok(())
    }

    fn text_state(&self) -> &TextState {
        &self.text
    }

    fn text_state_mut(&mut self) -> &mut TextState {
        &mut self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn create_test_content() -> Vec<u8> {
        b"line1\nline2\nline3\nline4\n".to_vec()
    }

    fn borrowed(data: &[u8]) -> MemoryFile<'_> {
        MemoryFile::borrowed(data, OpenFlags::READ, &CoreFileConfig::default())
    }

    #[test]
    fn test_new_memory_file() {
        let content = create_test_content();
        let file = borrowed(&content);

        assert_eq!(file.size(), content.len() as u64);
        assert_eq!(file.tell(), 0);
        assert!(!file.eof());
        assert!(!file.is_owned());
    }

    #[test]
    fn test_read_advances_and_stops_at_end() {
        let content = create_test_content();
        let mut file = borrowed(&content);

        let mut buf = [0u8; 6];
        assert_eq!(file.read(&mut buf), 6);
        assert_eq!(&buf, b"line1\n");
        assert_eq!(file.tell(), 6);

        let mut rest = [0u8; 64];
        assert_eq!(file.read(&mut rest), content.len() - 6);
        assert!(file.eof());
        assert_eq!(file.read(&mut rest), 0);
    }

    #[test]
    fn test_write_is_rejected_and_source_untouched() {
        let content = create_test_content();
        let mut file = borrowed(&content);

        assert_eq!(file.write(b"XXXX"), 0);
        assert_eq!(file.puts("hello\n"), 0);
        assert_eq!(file.tell(), 0);
        assert_eq!(file.buffer().unwrap(), &content[..]);
        assert_eq!(content, create_test_content());
    }

    #[test]
    fn test_seek_modes() {
        let content = create_test_content();
        let mut file = borrowed(&content);

        file.seek(SeekFrom::Start(6)).unwrap();
        assert_eq!(file.tell(), 6);
        file.seek(SeekFrom::Current(-2)).unwrap();
        assert_eq!(file.tell(), 4);
        file.seek(SeekFrom::End(-6)).unwrap();
        assert_eq!(file.tell(), 18);

        let err = file.seek(SeekFrom::Current(-100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert_eq!(file.tell(), 18);
    }

    #[test]
    fn test_seek_past_end_reads_nothing() {
        let content = create_test_content();
        let mut file = borrowed(&content);

        file.seek(SeekFrom::End(10)).unwrap();
        assert_eq!(file.tell(), content.len() as u64 + 10);
        assert!(file.eof());

        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), 0);
    }

    #[test]
    fn test_seek_clears_putback() {
        let content = create_test_content();
        let mut file = borrowed(&content);
        file.seek(SeekFrom::End(0)).unwrap();

        file.ungetc(b'q');
        assert!(!file.eof());
        file.seek(SeekFrom::End(0)).unwrap();
        assert!(file.eof());
    }

    #[test]
    fn test_truncate_clamps_offset() {
        let content = create_test_content();
        let mut file = borrowed(&content);
        file.seek(SeekFrom::Start(10)).unwrap();

        file.truncate(4).unwrap();
        assert_eq!(file.size(), 4);
        assert_eq!(file.tell(), 4);
        assert_eq!(file.buffer().unwrap(), b"line");

        let err = file.truncate(5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert_eq!(file.size(), 4);
    }

    #[test]
    fn test_compress_is_invalid_access() {
        let mut file = borrowed(b"abc");
        let err = file.compress(6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccess);
    }

    #[test]
    fn test_copied_owns_its_buffer() {
        let source = create_test_content();
        let mut file =
            MemoryFile::copied(&source, OpenFlags::READ, &CoreFileConfig::default()).unwrap();
        assert!(file.is_owned());

        let buffer = file.buffer().unwrap();
        assert_eq!(buffer, &source[..]);
        assert_ne!(buffer.as_ptr(), source.as_ptr());

        file.purge();
        assert!(!file.is_loaded());
        assert!(file.buffer().is_none());
    }

    #[test]
    fn test_borrowed_buffer_aliases_source() {
        let source = create_test_content();
        let mut file = borrowed(&source);
        assert_eq!(file.buffer().unwrap().as_ptr(), source.as_ptr());

        // releasing a borrowed region leaves the caller's data intact
        file.purge();
        assert_eq!(source, create_test_content());
    }

    #[test]
    fn test_empty_content() {
        let mut file = borrowed(&[]);
        assert_eq!(file.size(), 0);
        assert!(file.eof());
        assert_eq!(file.getc(), None);
        let mut buf = [0u8; 4];
        assert_eq!(file.gets(&mut buf), None);
    }

    proptest! {
        #[test]
        fn prop_read_at_any_offset(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            offset in 0u64..300,
            len in 0usize..300,
        ) {
            let mut file = borrowed(&data);
            file.seek(SeekFrom::Start(offset)).unwrap();

            let mut buf = vec![0u8; len];
            let n = file.read(&mut buf);

            let start = (offset as usize).min(data.len());
            let expected = (data.len() - start).min(len);
            prop_assert_eq!(n, expected);
            prop_assert_eq!(&buf[..n], &data[start..start + n]);
            prop_assert_eq!(file.tell(), offset + n as u64);
        }
    }
}
