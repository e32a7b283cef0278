//! Streaming zlib compression and decompression for disk handles.
//!
//! A [`CodecSession`] owns one `flate2` deflate or inflate context. It is bound to the
//! logical offset at which compression was enabled and from then on accepts only
//! strictly sequential requests: every read or write must start exactly at
//! [`CodecSession::next_offset`]. Compressed bytes are moved to and from the physical
//! stream through a fixed staging buffer, starting at the same offset.

use crate::error::{CoreFileError, ErrorKind, Result};
use crate::file_handler::os::OsFile;
use crate::file_handler::{COMPRESS_MAX, COMPRESS_MIN};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use log::{debug, warn};
use thiserror::Error;

/// Size of the staging buffer between the codec and the physical stream
pub const CODEC_BUFFER_SIZE: usize = 1024;

/// Direction of a codec session, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    Compress,
    Decompress,
}

impl CodecMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
        }
    }
}

/// A transfer that failed after moving `transferred` bytes
///
/// The session has already accounted those bytes: its next offset is past them.
#[derive(Error, Debug)]
#[error("{source} (after {transferred} bytes)")]
pub struct PartialTransfer {
    pub transferred: usize,
    #[source]
    pub source: CoreFileError,
}

impl PartialTransfer {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

impl From<CoreFileError> for PartialTransfer {
    fn from(source: CoreFileError) -> Self {
        Self {
            transferred: 0,
            source,
        }
    }
}

/// Byte count of a codec or OS transfer, or the error that cut it short
pub type TransferResult = std::result::Result<usize, PartialTransfer>;

enum Engine {
    Deflate(Compress),
    Inflate(Decompress),
}

/// One streaming compression or decompression context
pub struct CodecSession {
    engine: Engine,
    /// Deflate output waiting to be written, or inflate input waiting to be consumed
    staging: Box<[u8; CODEC_BUFFER_SIZE]>,
    /// Number of valid bytes in `staging`
    staged: usize,
    /// Inflate only: bytes of `staging` already fed to the decoder
    consumed: usize,
    /// Position in the physical (compressed) stream
    real_offset: u64,
    /// Logical position the next request must start at
    next_offset: u64,
    /// Inflate reached the end of the zlib stream
    finished: bool,
}

impl std::fmt::Debug for CodecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecSession")
            .field("mode", &self.mode())
            .field("staged", &self.staged)
            .field("real_offset", &self.real_offset)
            .field("next_offset", &self.next_offset)
            .field("finished", &self.finished)
            .finish()
    }
}

impl CodecSession {
    /// Start compressing at logical (and physical) position `offset`
    ///
    /// # Errors
    /// * `Failure` if `level` is outside `1..=9`
    pub fn start_compression(level: u32, offset: u64) -> Result<Self> {
        if !(COMPRESS_MIN..=COMPRESS_MAX).contains(&level) {
            return Err(CoreFileError::failure(format!(
                "compression level {} is out of range {}..={}",
                level, COMPRESS_MIN, COMPRESS_MAX
            )));
        }
        debug!("starting deflate session at offset {} (level {})", offset, level);
        Ok(Self::new(
            Engine::Deflate(Compress::new(Compression::new(level), true)),
            offset,
        ))
    }

    /// Start decompressing at logical (and physical) position `offset`
    pub fn start_decompression(offset: u64) -> Self {
        debug!("starting inflate session at offset {}", offset);
        Self::new(Engine::Inflate(Decompress::new(true)), offset)
    }

    fn new(engine: Engine, offset: u64) -> Self {
        Self {
            engine,
            staging: Box::new([0; CODEC_BUFFER_SIZE]),
            staged: 0,
            consumed: 0,
            real_offset: offset,
            next_offset: offset,
            finished: false,
        }
    }

    pub fn mode(&self) -> CodecMode {
        match self.engine {
            Engine::Deflate(_) => CodecMode::Compress,
            Engine::Inflate(_) => CodecMode::Decompress,
        }
    }

    pub fn real_offset(&self) -> u64 {
        self.real_offset
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Decompress into `dest`, reading compressed bytes from `stream` as needed
    ///
    /// Returns the number of bytes produced; fewer than `dest.len()` means the end of
    /// the compressed stream was reached.
    ///
    /// # Errors
    /// * `InvalidAccess` if `offset` is not the next offset or the session compresses;
    ///   nothing is read and no state changes
    /// * `InvalidData` if the compressed stream is corrupt, carrying the bytes decoded
    ///   into `dest` before the corruption
    pub fn read<S: OsFile + ?Sized>(
        &mut self,
        stream: &mut S,
        dest: &mut [u8],
        offset: u64,
    ) -> TransferResult {
        let inflate = match &mut self.engine {
            Engine::Inflate(inflate) => inflate,
            Engine::Deflate(_) => {
                return Err(wrong_direction(CodecMode::Decompress, CodecMode::Compress).into())
            }
        };
        if offset != self.next_offset {
            return Err(out_of_sequence(offset, self.next_offset).into());
        }
        if self.finished {
            return Ok(0);
        }

        let mut produced = 0;
        let result = loop {
            if produced == dest.len() {
                break Ok(());
            }

            // refill the input staging buffer from the physical stream
            if self.consumed == self.staged {
                let fetched = match stream.read_at(&mut self.staging[..], self.real_offset) {
                    Ok(fetched) => fetched,
                    Err(e) => break Err(e),
                };
                self.real_offset += fetched as u64;
                self.consumed = 0;
                self.staged = fetched;
                if fetched == 0 {
                    warn!(
                        "compressed stream ended at physical offset {} without an end marker",
                        self.real_offset
                    );
                    self.finished = true;
                    break Ok(());
                }
            }

            let in_before = inflate.total_in();
            let out_before = inflate.total_out();
            let status = inflate.decompress(
                &self.staging[self.consumed..self.staged],
                &mut dest[produced..],
                FlushDecompress::Sync,
            );
            let used = (inflate.total_in() - in_before) as usize;
            let made = (inflate.total_out() - out_before) as usize;
            self.consumed += used;
            produced += made;

            match status {
                Ok(Status::StreamEnd) => {
                    self.finished = true;
                    break Ok(());
                }
                Ok(Status::Ok) | Ok(Status::BufError) => {
                    if used == 0 && made == 0 && self.consumed < self.staged {
                        break Err(CoreFileError::invalid_data("inflate made no progress"));
                    }
                }
                Err(e) => break Err(CoreFileError::invalid_data(e.to_string())),
            }
        };

        self.next_offset += produced as u64;
        result.map(|()| produced).map_err(|source| PartialTransfer {
            transferred: produced,
            source,
        })
    }

    /// Compress all of `src`, writing full staging buffers to `stream` at the real offset
    ///
    /// # Errors
    /// * `InvalidAccess` if `offset` is not the next offset or the session decompresses;
    ///   nothing is written and no state changes
    /// * `InvalidData` if the compressor fails, carrying the bytes of `src` consumed
    ///   before the failure
    pub fn write<S: OsFile + ?Sized>(
        &mut self,
        stream: &mut S,
        src: &[u8],
        offset: u64,
    ) -> TransferResult {
        let deflate = match &mut self.engine {
            Engine::Deflate(deflate) => deflate,
            Engine::Inflate(_) => {
                return Err(wrong_direction(CodecMode::Compress, CodecMode::Decompress).into())
            }
        };
        if offset != self.next_offset {
            return Err(out_of_sequence(offset, self.next_offset).into());
        }

        let mut taken = 0;
        let result = loop {
            if taken == src.len() {
                break Ok(());
            }

            let in_before = deflate.total_in();
            let out_before = deflate.total_out();
            let status = deflate.compress(
                &src[taken..],
                &mut self.staging[self.staged..],
                FlushCompress::None,
            );
            let used = (deflate.total_in() - in_before) as usize;
            let made = (deflate.total_out() - out_before) as usize;
            taken += used;
            self.staged += made;

            if let Err(e) = status {
                break Err(CoreFileError::invalid_data(e.to_string()));
            }

            if self.staged == CODEC_BUFFER_SIZE {
                if let Err(e) =
                    write_staged(stream, &self.staging[..], &mut self.real_offset)
                {
                    break Err(e);
                }
                self.staged = 0;
            } else if used == 0 && made == 0 {
                break Err(CoreFileError::invalid_data("deflate made no progress"));
            }
        };

        self.next_offset += taken as u64;
        result.map(|()| taken).map_err(|source| PartialTransfer {
            transferred: taken,
            source,
        })
    }

    /// Release the session, first flushing all pending compressed output
    ///
    /// The session is consumed whether or not the final flush succeeds.
    ///
    /// # Errors
    /// * `InvalidData` if the compressor fails while finishing the stream
    /// * Errors from the physical stream while writing the tail
    pub fn finish<S: OsFile + ?Sized>(mut self, stream: &mut S) -> Result<()> {
        let Engine::Deflate(deflate) = &mut self.engine else {
            debug!("closing inflate session at offset {}", self.next_offset);
            return Ok(());
        };

        loop {
            let out_before = deflate.total_out();
            let status = deflate.compress(
                &[],
                &mut self.staging[self.staged..],
                FlushCompress::Finish,
            );
            let made = (deflate.total_out() - out_before) as usize;
            self.staged += made;

            let status = status.map_err(|e| CoreFileError::invalid_data(e.to_string()))?;

            if self.staged > 0 {
                write_staged(stream, &self.staging[..self.staged], &mut self.real_offset)?;
                self.staged = 0;
            }

            match status {
                Status::StreamEnd => break,
                Status::Ok => {}
                Status::BufError if made > 0 => {}
                Status::BufError => {
                    return Err(CoreFileError::invalid_data("deflate could not finish"));
                }
            }
        }

        debug!(
            "closed deflate session: {} logical bytes in {} physical bytes",
            deflate.total_in(),
            deflate.total_out()
        );
        Ok(())
    }
}

fn wrong_direction(requested: CodecMode, session: CodecMode) -> CoreFileError {
    CoreFileError::invalid_access(format!(
        "cannot {} through a {} session",
        requested.name(),
        session.name()
    ))
}

fn out_of_sequence(offset: u64, next_offset: u64) -> CoreFileError {
    CoreFileError::invalid_access(format!(
        "compressed streams are sequential: request at {} but next offset is {}",
        offset, next_offset
    ))
}

fn write_staged<S: OsFile + ?Sized>(
    stream: &mut S,
    staged: &[u8],
    real_offset: &mut u64,
) -> Result<()> {
    let written = stream.write_at(staged, *real_offset)?;
    *real_offset += written as u64;
    if written != staged.len() {
        return Err(CoreFileError::failure(format!(
            "short write of compressed data: {} of {} bytes",
            written,
            staged.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_handler::os::VecOsFile;
    use std::io::Read;

    fn sample(len: usize) -> Vec<u8> {
        // Mildly compressible, not all-zero
        (0..len).map(|i| ((i * 7) ^ (i >> 5)) as u8).collect()
    }

    fn compress_all(data: &[u8], chunk: usize) -> VecOsFile {
        let mut stream = VecOsFile::default();
        let mut session = CodecSession::start_compression(6, 0).unwrap();
        let mut offset = 0;
        for piece in data.chunks(chunk.max(1)) {
            assert_eq!(session.write(&mut stream, piece, offset).unwrap(), piece.len());
            offset += piece.len() as u64;
        }
        session.finish(&mut stream).unwrap();
        stream
    }

    #[test]
    fn test_compressed_output_is_zlib() {
        let data = sample(10_000);
        let stream = compress_all(&data, 333);

        let mut decoded = Vec::new();
        flate2::read::ZlibDecoder::new(&stream.data[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_round_trip_through_sessions() {
        let data = sample(50_000);
        let mut stream = compress_all(&data, 4096);

        let mut session = CodecSession::start_decompression(0);
        let mut out = vec![0u8; data.len() + 100];
        let mut produced = 0;
        for chunk in out.chunks_mut(777) {
            let n = session.read(&mut stream, chunk, produced as u64).unwrap();
            produced += n;
            if n < chunk.len() {
                break;
            }
        }
        assert_eq!(produced, data.len());
        assert_eq!(&out[..produced], &data[..]);
        assert_eq!(session.next_offset(), data.len() as u64);

        // the stream has ended, further reads produce nothing
        let mut extra = [0u8; 8];
        assert_eq!(session.read(&mut stream, &mut extra, produced as u64).unwrap(), 0);
    }

    #[test]
    fn test_session_bound_to_start_offset() {
        let mut stream = VecOsFile::with_data(b"HEADER".to_vec());
        let mut session = CodecSession::start_compression(9, 6).unwrap();
        session.write(&mut stream, b"payload payload payload", 6).unwrap();
        session.finish(&mut stream).unwrap();
        assert_eq!(&stream.data[..6], b"HEADER");

        let mut reader = CodecSession::start_decompression(6);
        let mut out = [0u8; 64];
        let n = reader.read(&mut stream, &mut out, 6).unwrap();
        assert_eq!(&out[..n], b"payload payload payload");
        assert_eq!(reader.real_offset(), stream.data.len() as u64);
    }

    #[test]
    fn test_write_offset_mismatch_is_rejected_without_state_change() {
        let mut stream = VecOsFile::default();
        let mut session = CodecSession::start_compression(6, 0).unwrap();
        session.write(&mut stream, &sample(3000), 0).unwrap();
        let writes = stream.writes;
        let real = session.real_offset();

        let err = session.write(&mut stream, b"late", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccess);
        assert_eq!(session.next_offset(), 3000);
        assert_eq!(session.real_offset(), real);
        assert_eq!(stream.writes, writes);
    }

    #[test]
    fn test_read_offset_mismatch_is_rejected_without_state_change() {
        let mut stream = compress_all(&sample(2000), 2000);
        let mut session = CodecSession::start_decompression(0);

        let mut out = [0u8; 16];
        let err = session.read(&mut stream, &mut out, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccess);
        assert_eq!(session.next_offset(), 0);
        assert_eq!(session.real_offset(), 0);

        // the matching offset still works afterwards
        assert_eq!(session.read(&mut stream, &mut out, 0).unwrap(), 16);
        assert_eq!(&out[..], &sample(2000)[..16]);
    }

    #[test]
    fn test_wrong_direction_is_invalid_access() {
        let mut stream = VecOsFile::default();
        let mut session = CodecSession::start_decompression(0);
        let err = session.write(&mut stream, b"x", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccess);

        let mut session = CodecSession::start_compression(1, 0).unwrap();
        let mut out = [0u8; 4];
        let err = session.read(&mut stream, &mut out, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAccess);
    }

    #[test]
    fn test_level_range() {
        assert!(CodecSession::start_compression(0, 0).is_err());
        assert!(CodecSession::start_compression(10, 0).is_err());
        assert_eq!(
            CodecSession::start_compression(9, 0).unwrap().mode(),
            CodecMode::Compress
        );
    }

    #[test]
    fn test_corrupt_stream_is_invalid_data() {
        let mut stream = VecOsFile::with_data(vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x11]);
        let mut session = CodecSession::start_decompression(0);
        let mut out = [0u8; 32];
        let err = session.read(&mut stream, &mut out, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    /// zlib stream holding one stored block of `payload`, then an invalid block type
    fn stored_block_then_garbage(payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut stream = vec![0x78, 0x01, 0x00];
        stream.extend_from_slice(&len.to_le_bytes());
        stream.extend_from_slice(&(!len).to_le_bytes());
        stream.extend_from_slice(payload);
        stream.push(0x07);
        stream
    }

    #[test]
    fn test_corruption_after_output_reports_decoded_bytes() {
        let payload = sample(2000);
        let mut stream = VecOsFile::with_data(stored_block_then_garbage(&payload));
        let mut session = CodecSession::start_decompression(0);

        let mut out = vec![0u8; 4096];
        let err = session.read(&mut stream, &mut out, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.transferred, payload.len());
        assert_eq!(&out[..payload.len()], &payload[..]);
        assert_eq!(session.next_offset(), payload.len() as u64);

        // the session stays in step with the reported count
        let again = session.read(&mut stream, &mut out, payload.len() as u64);
        assert_eq!(again.unwrap_or_else(|e| e.transferred), 0);
        assert_eq!(session.next_offset(), payload.len() as u64);
    }

    #[test]
    fn test_truncated_stream_reads_short() {
        let data = sample(20_000);
        let mut stream = compress_all(&data, 20_000);
        stream.data.truncate(stream.data.len() / 2);

        let mut session = CodecSession::start_decompression(0);
        let mut out = vec![0u8; data.len()];
        let n = session.read(&mut stream, &mut out, 0).unwrap();
        assert!(n < data.len());
        assert_eq!(&out[..n], &data[..n]);
    }

    #[test]
    fn test_finish_on_inflate_session_is_noop() {
        let mut stream = VecOsFile::default();
        CodecSession::start_decompression(0).finish(&mut stream).unwrap();
        assert_eq!(stream.writes, 0);
    }
}
