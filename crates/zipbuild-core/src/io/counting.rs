//! Byte-counting and checksumming stream adapters.
//!
//! The archive writer needs three numbers per entry: the CRC-32 and length
//! of the source data, and the length of the payload that reached the
//! archive. `ChecksumReader` measures the first two on the way in,
//! `CountingWriter` the last one on the way out.

use flate2::Crc;
use std::io::Read;
use std::io::Write;

/// Writer that counts the bytes successfully written through it.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use zipbuild_core::io::CountingWriter;
///
/// let mut buffer = Vec::new();
/// let mut writer = CountingWriter::new(&mut buffer);
/// writer.write_all(b"payload")?;
/// assert_eq!(writer.total_bytes(), 7);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W> CountingWriter<W> {
    /// Wraps `inner` with a zeroed counter.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.bytes_written
    }

    /// Unwraps the inner writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.inner.write(buf)?;
        self.bytes_written += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that computes the CRC-32 and length of everything read through it.
///
/// # Examples
///
/// ```
/// use std::io::Read;
/// use zipbuild_core::io::ChecksumReader;
///
/// let mut reader = ChecksumReader::new(&b"hello"[..]);
/// std::io::copy(&mut reader, &mut std::io::sink())?;
/// assert_eq!(reader.len(), 5);
/// assert_eq!(reader.crc32(), 0x3610_A686);
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct ChecksumReader<R> {
    inner: R,
    crc: Crc,
    len: u64,
}

impl<R> ChecksumReader<R> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            crc: Crc::new(),
            len: 0,
        }
    }

    /// CRC-32 of the bytes read so far.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        self.crc.sum()
    }

    /// Number of bytes read so far.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.len
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.crc.update(&buf[..n]);
        self.len += n as u64;
        Ok(n)
    }
}
