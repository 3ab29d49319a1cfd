//! Streaming archive writer.
//!
//! Entries are written one after another: local header with placeholder
//! CRC and sizes, then the payload, then the header is patched in place.
//! The output must be seekable, so no data descriptors are needed.

use crate::Result;
use crate::UseZip64Option;
use crate::ZipBuildError;
use crate::config::Password;
use crate::encoding::NameCodec;
use crate::io::ChecksumReader;
use crate::io::CountingWriter;
use crate::zip::crypto::AesEntryWriter;
use crate::zip::crypto::aes_extra_field;
use crate::zip::format::CentralRecord;
use crate::zip::format::DEFAULT_UNIX_MODE;
use crate::zip::format::DirectoryEnd;
use crate::zip::format::FLAG_ENCRYPTED;
use crate::zip::format::FLAG_UTF8;
use crate::zip::format::LocalHeader;
use crate::zip::format::METHOD_AES;
use crate::zip::format::METHOD_DEFLATED;
use crate::zip::format::METHOD_STORED;
use crate::zip::format::VERSION_AES;
use crate::zip::format::VERSION_DEFLATED;
use crate::zip::format::VERSION_MADE_BY;
use crate::zip::format::VERSION_STORED;
use crate::zip::format::VERSION_ZIP64;
use crate::zip::format::dos_datetime;
use crate::zip::reader::ExistingArchive;
use crate::zip::zip64::Zip64Limits;
use crate::zip::zip64::check_finished_entry;
use crate::zip::zip64::worst_case_payload;
use byteorder::LittleEndian;
use byteorder::WriteBytesExt;
use chrono::Local;
use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use tracing::debug;

/// Copy buffer size for entry payloads.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Settings shared by every entry of one archive.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// ZIP64 policy.
    pub policy: UseZip64Option,
    /// Encoding of entry names and the archive comment.
    pub codec: NameCodec,
    /// Deflate level; 0 stores entries.
    pub compression_level: u8,
    /// Encrypt every new entry with this password.
    pub password: Option<Password>,
    /// Archive comment. In append mode `None` keeps the existing comment.
    pub comment: Option<String>,
}

/// Metadata of one entry to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// Final entry name, already made unique.
    pub name: String,
    /// Expected payload size before compression.
    pub size: u64,
    /// Local modification time.
    pub modified: NaiveDateTime,
    /// Unix mode including the file type bits.
    pub unix_mode: u32,
}

impl EntryMeta {
    /// Metadata for a regular file modified now.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified: Local::now().naive_local(),
            unix_mode: DEFAULT_UNIX_MODE,
        }
    }

    /// Sets the modification time.
    #[must_use]
    pub fn with_modified(mut self, modified: NaiveDateTime) -> Self {
        self.modified = modified;
        self
    }

    /// Sets the unix mode.
    #[must_use]
    pub fn with_unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = mode;
        self
    }
}

/// Writes a ZIP archive entry by entry into a seekable output.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use zipbuild_core::NameCodec;
/// use zipbuild_core::UseZip64Option;
/// use zipbuild_core::zip::ArchiveWriter;
/// use zipbuild_core::zip::EntryMeta;
/// use zipbuild_core::zip::WriterSettings;
///
/// let settings = WriterSettings {
///     policy: UseZip64Option::AsNecessary,
///     codec: NameCodec::Utf8 { always_flag: false },
///     compression_level: 6,
///     password: None,
///     comment: None,
/// };
/// let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), settings)?;
/// writer.add_entry(&EntryMeta::new("hello.txt", 5), &b"hello"[..])?;
/// let bytes = writer.finish()?.into_inner();
/// assert_eq!(&bytes[..4], b"PK\x03\x04");
/// # Ok::<(), zipbuild_core::ZipBuildError>(())
/// ```
pub struct ArchiveWriter<W: Write + Seek> {
    inner: W,
    settings: WriterSettings,
    limits: Zip64Limits,
    records: Vec<CentralRecord>,
    comment: Vec<u8>,
    offset: u64,
    buffer: Vec<u8>,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Starts a new archive at the current position of `inner`, which must
    /// be the start of the output.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the encoded comment is longer than
    /// 65535 bytes.
    pub fn new(inner: W, settings: WriterSettings) -> Result<Self> {
        let comment = encode_comment(&settings, Vec::new())?;
        Ok(Self {
            inner,
            settings,
            limits: Zip64Limits::default(),
            records: Vec::new(),
            comment,
            offset: 0,
            buffer: vec![0u8; COPY_BUFFER_SIZE],
        })
    }

    /// Continues `existing`, whose bytes `inner` holds up to the start of
    /// its central directory. New entries overwrite the old directory,
    /// which is rewritten on [`finish`](Self::finish) with the existing
    /// records first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an oversized comment, or an I/O
    /// error if `inner` cannot be positioned.
    pub fn resume(mut inner: W, existing: ExistingArchive, settings: WriterSettings) -> Result<Self> {
        let comment = encode_comment(&settings, existing.comment)?;
        inner.seek(SeekFrom::Start(existing.cd_offset))?;
        Ok(Self {
            inner,
            settings,
            limits: Zip64Limits::default(),
            records: existing.records,
            comment,
            offset: existing.cd_offset,
            buffer: vec![0u8; COPY_BUFFER_SIZE],
        })
    }

    pub(crate) fn with_limits(mut self, limits: Zip64Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Number of entries, including those of an appended archive.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// Streams one entry from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A ZIP64 limit is reached under `UseZip64Option::Never`
    /// - The encoded name is longer than 65535 bytes
    /// - Encryption cannot be set up
    /// - Reading the source or writing the output fails
    pub fn add_entry<R: Read>(&mut self, entry: &EntryMeta, reader: R) -> Result<()> {
        let policy = self.settings.policy;
        policy.entry_count(self.limits, self.records.len() as u64 + 1)?;

        let name = self.settings.codec.encode(&entry.name);
        if name.len() > usize::from(u16::MAX) {
            return Err(ZipBuildError::InvalidConfiguration {
                reason: format!("entry name too long: {}", entry.name),
            });
        }

        let level = self.settings.compression_level;
        let deflated = entry.size > 0 && level > 0;
        let method = if deflated {
            METHOD_DEFLATED
        } else {
            METHOD_STORED
        };
        let password = self.settings.password.as_ref();
        let header_offset = self.offset;
        let zip64 = policy.local_header(
            self.limits,
            &entry.name,
            worst_case_payload(entry.size, deflated, password.is_some()),
            header_offset,
        )?;

        let mut flags = 0;
        if self.settings.codec.utf8_flag(&entry.name) {
            flags |= FLAG_UTF8;
        }
        let (stored_method, extra, mut version_needed) = if password.is_some() {
            flags |= FLAG_ENCRYPTED;
            (METHOD_AES, aes_extra_field(method), VERSION_AES)
        } else if deflated {
            (method, Vec::new(), VERSION_DEFLATED)
        } else {
            (method, Vec::new(), VERSION_STORED)
        };
        if zip64 {
            version_needed = version_needed.max(VERSION_ZIP64);
        }
        let (mod_time, mod_date) = dos_datetime(&entry.modified);

        let header = LocalHeader {
            version_needed,
            flags,
            method: stored_method,
            mod_time,
            mod_date,
            zip64,
            name: &name,
            extra: &extra,
        };
        header.write(&mut self.inner)?;

        let mut source = ChecksumReader::new(reader);
        let sink = CountingWriter::new(&mut self.inner);
        let sink = match password {
            Some(password) => {
                let encryptor = AesEntryWriter::new(sink, password.expose(), &entry.name)?;
                copy_payload(&mut source, encryptor, deflated, level, &mut self.buffer)?.finish()?
            }
            None => copy_payload(&mut source, sink, deflated, level, &mut self.buffer)?,
        };
        let compressed = sink.total_bytes();
        let uncompressed = source.len();
        // AE-2 leaves the CRC out; the authentication code replaces it.
        let crc32 = if password.is_some() { 0 } else { source.crc32() };

        check_finished_entry(self.limits, &entry.name, zip64, compressed, uncompressed)?;

        let data_end = header_offset + header.len() + compressed;
        self.inner
            .seek(SeekFrom::Start(header_offset + LocalHeader::crc_offset()))?;
        self.inner.write_u32::<LittleEndian>(crc32)?;
        self.inner
            .seek(SeekFrom::Start(header_offset + header.sizes_offset()))?;
        if zip64 {
            self.inner.write_u64::<LittleEndian>(uncompressed)?;
            self.inner.write_u64::<LittleEndian>(compressed)?;
        } else {
            self.inner.write_u32::<LittleEndian>(compressed as u32)?;
            self.inner.write_u32::<LittleEndian>(uncompressed as u32)?;
        }
        self.inner.seek(SeekFrom::Start(data_end))?;

        debug!(
            name = %entry.name,
            method = stored_method,
            compressed,
            uncompressed,
            zip64,
            "entry written"
        );

        self.records.push(CentralRecord {
            version_made_by: VERSION_MADE_BY,
            version_needed,
            flags,
            method: stored_method,
            mod_time,
            mod_date,
            crc32,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            internal_attrs: 0,
            external_attrs: entry.unix_mode << 16,
            header_offset,
            name,
            extra,
            comment: Vec::new(),
        });
        self.offset = data_end;
        Ok(())
    }

    /// Writes the central directory and end records and returns the output.
    ///
    /// # Errors
    ///
    /// Returns `Zip64LimitExceeded` if the directory needs ZIP64 under
    /// `UseZip64Option::Never`, or an I/O error.
    pub fn finish(mut self) -> Result<W> {
        let policy = self.settings.policy;
        let cd_offset = self.offset;
        let entries = self.records.len() as u64;
        let records_exceed = self.records.iter().any(|r| r.exceeds(self.limits.bytes));

        let mut zip64 = policy.central_directory(self.limits, records_exceed, entries, cd_offset, 0)?;
        let mut directory = serialize_directory(&self.records, zip64)?;
        if !zip64 {
            // The classic directory itself may be what overflows.
            zip64 = policy.central_directory(
                self.limits,
                records_exceed,
                entries,
                cd_offset,
                directory.len() as u64,
            )?;
            if zip64 {
                directory = serialize_directory(&self.records, true)?;
            }
        }

        self.inner.write_all(&directory)?;
        DirectoryEnd {
            entries,
            cd_size: directory.len() as u64,
            cd_offset,
        }
        .write(&mut self.inner, zip64, &self.comment)?;
        self.inner.flush()?;

        debug!(entries, cd_offset, zip64, "central directory written");
        Ok(self.inner)
    }
}

fn encode_comment(settings: &WriterSettings, existing: Vec<u8>) -> Result<Vec<u8>> {
    let comment = settings
        .comment
        .as_deref()
        .map_or(existing, |text| settings.codec.encode(text));
    if comment.len() > usize::from(u16::MAX) {
        return Err(ZipBuildError::InvalidConfiguration {
            reason: format!("archive comment is {} bytes, at most 65535 allowed", comment.len()),
        });
    }
    Ok(comment)
}

fn serialize_directory(records: &[CentralRecord], zip64: bool) -> io::Result<Vec<u8>> {
    let mut directory = Vec::new();
    for record in records {
        record.write(&mut directory, zip64)?;
    }
    Ok(directory)
}

/// Copies `reader` into `out`, deflating on the way when asked.
fn copy_payload<R: Read, O: Write>(
    reader: &mut R,
    out: O,
    deflated: bool,
    level: u8,
    buffer: &mut [u8],
) -> io::Result<O> {
    if deflated {
        let mut encoder = DeflateEncoder::new(out, Compression::new(u32::from(level)));
        pump(reader, &mut encoder, buffer)?;
        encoder.finish()
    } else {
        let mut out = out;
        pump(reader, &mut out, buffer)?;
        Ok(out)
    }
}

fn pump<R: Read, O: Write>(reader: &mut R, out: &mut O, buffer: &mut [u8]) -> io::Result<()> {
    loop {
        let bytes_read = match reader.read(buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buffer[..bytes_read])?;
    }
}
