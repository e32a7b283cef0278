//! Bounds-safe byte copies and the disk read-ahead cache.

/// Copy as many bytes as both regions allow from `source[source_offset..]` into
/// `dest[dest_offset..]`, returning the number copied.
///
/// Offsets beyond the end of either region copy nothing.
pub fn safe_buffer_copy(
    source: &[u8],
    source_offset: usize,
    dest: &mut [u8],
    dest_offset: usize,
) -> usize {
    let source_avail = source.len().saturating_sub(source_offset);
    let dest_avail = dest.len().saturating_sub(dest_offset);
    let count = source_avail.min(dest_avail);
    if count > 0 {
        dest[dest_offset..dest_offset + count]
            .copy_from_slice(&source[source_offset..source_offset + count]);
    }
    count
}

/// Convert a 64-bit file offset to a slice index, saturating on narrow targets
pub(crate) fn to_index(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

/// Size of the read-ahead cache in front of every disk handle
pub const READ_CACHE_SIZE: usize = 512;

/// Small window of recently fetched bytes
///
/// Valid only for offsets in `[base, base + valid)`.
#[derive(Debug)]
pub struct ReadCache {
    data: Box<[u8; READ_CACHE_SIZE]>,
    base: u64,
    valid: usize,
}

impl ReadCache {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; READ_CACHE_SIZE]),
            base: 0,
            valid: 0,
        }
    }

    /// Does the cache hold the byte at `offset`?
    pub fn covers(&self, offset: u64) -> bool {
        offset >= self.base && offset < self.base + self.valid as u64
    }

    /// Copy cached bytes starting at `offset` into `dest[dest_offset..]`
    pub fn copy_out(&self, offset: u64, dest: &mut [u8], dest_offset: usize) -> usize {
        if !self.covers(offset) {
            return 0;
        }
        safe_buffer_copy(
            &self.data[..self.valid],
            (offset - self.base) as usize,
            dest,
            dest_offset,
        )
    }

    /// Start a refill at `base`; the caller fills the returned slice and reports the count
    /// through [`ReadCache::set_valid`]
    pub fn begin_fill(&mut self, base: u64) -> &mut [u8] {
        self.base = base;
        self.valid = 0;
        &mut self.data[..]
    }

    pub fn set_valid(&mut self, valid: usize) {
        self.valid = valid.min(READ_CACHE_SIZE);
    }

    pub fn invalidate(&mut self) {
        self.valid = 0;
    }

    pub fn valid_bytes(&self) -> usize {
        self.valid
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_copy_within_bounds() {
        let source = b"abcdef";
        let mut dest = [0u8; 4];
        assert_eq!(safe_buffer_copy(source, 1, &mut dest, 0), 4);
        assert_eq!(&dest, b"bcde");
    }

    #[test]
    fn test_copy_clamps_to_smaller_region() {
        let source = b"abc";
        let mut dest = [b'.'; 6];
        assert_eq!(safe_buffer_copy(source, 1, &mut dest, 2), 2);
        assert_eq!(&dest, b"..bc..");
    }

    #[test]
    fn test_copy_past_end_copies_nothing() {
        let mut dest = [0u8; 4];
        assert_eq!(safe_buffer_copy(b"abc", 10, &mut dest, 0), 0);
        assert_eq!(safe_buffer_copy(b"abc", 0, &mut dest, 9), 0);
        assert_eq!(dest, [0; 4]);
    }

    #[test]
    fn test_cache_window() {
        let mut cache = ReadCache::new();
        assert!(!cache.covers(0));

        let slot = cache.begin_fill(100);
        slot[..3].copy_from_slice(b"xyz");
        cache.set_valid(3);

        assert!(cache.covers(100));
        assert!(cache.covers(102));
        assert!(!cache.covers(103));
        assert!(!cache.covers(99));

        let mut dest = [0u8; 8];
        assert_eq!(cache.copy_out(101, &mut dest, 0), 2);
        assert_eq!(&dest[..2], b"yz");

        cache.invalidate();
        assert!(!cache.covers(100));
        assert_eq!(cache.copy_out(100, &mut dest, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_copy_matches_slice_semantics(
            source in proptest::collection::vec(any::<u8>(), 0..64),
            source_offset in 0usize..80,
            dest_len in 0usize..64,
            dest_offset in 0usize..80,
        ) {
            let mut dest = vec![0u8; dest_len];
            let copied = safe_buffer_copy(&source, source_offset, &mut dest, dest_offset);

            let expected = source.len().saturating_sub(source_offset)
                .min(dest_len.saturating_sub(dest_offset));
            prop_assert_eq!(copied, expected);
            if copied > 0 {
                prop_assert_eq!(
                    &dest[dest_offset..dest_offset + copied],
                    &source[source_offset..source_offset + copied]
                );
            }
        }
    }
}
