//! On-disk ZIP records.
//!
//! All multi-byte fields are little endian. Field layouts follow the PKWARE
//! APPNOTE; only the records this crate writes or reads back are modelled.

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use chrono::Datelike;
use chrono::NaiveDateTime;
use chrono::Timelike;
use std::io;
use std::io::Read;
use std::io::Write;

pub(crate) const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
pub(crate) const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
pub(crate) const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

pub(crate) const LOCAL_HEADER_LEN: u64 = 30;
pub(crate) const END_OF_CENTRAL_DIRECTORY_LEN: u64 = 22;
pub(crate) const ZIP64_END_OF_CENTRAL_DIRECTORY_LEN: u64 = 56;
pub(crate) const ZIP64_LOCATOR_LEN: u64 = 20;

/// "See the ZIP64 extra field" markers.
pub(crate) const U32_MARKER: u32 = 0xFFFF_FFFF;
pub(crate) const U16_MARKER: u16 = 0xFFFF;

pub(crate) const ZIP64_EXTRA_ID: u16 = 0x0001;
pub(crate) const AES_EXTRA_ID: u16 = 0x9901;

pub(crate) const METHOD_STORED: u16 = 0;
pub(crate) const METHOD_DEFLATED: u16 = 8;
pub(crate) const METHOD_AES: u16 = 99;

pub(crate) const FLAG_ENCRYPTED: u16 = 1;
pub(crate) const FLAG_UTF8: u16 = 1 << 11;

/// Unix host, APPNOTE 6.3.
pub(crate) const VERSION_MADE_BY: u16 = (3 << 8) | 63;
pub(crate) const VERSION_STORED: u16 = 10;
pub(crate) const VERSION_DEFLATED: u16 = 20;
pub(crate) const VERSION_ZIP64: u16 = 45;
pub(crate) const VERSION_AES: u16 = 51;

/// Default external attributes: regular file, `rw-r--r--`.
pub(crate) const DEFAULT_UNIX_MODE: u32 = 0o100_644;

/// Header of one entry, written before its payload.
///
/// CRC and sizes are written as placeholders and patched once the payload is
/// known.
#[derive(Debug)]
pub(crate) struct LocalHeader<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub zip64: bool,
    pub name: &'a [u8],
    pub extra: &'a [u8],
}

impl LocalHeader<'_> {
    /// Size of the ZIP64 extra in a local header: both sizes, no offset.
    const ZIP64_EXTRA_LEN: u16 = 16;

    pub fn len(&self) -> u64 {
        LOCAL_HEADER_LEN + self.name.len() as u64 + u64::from(self.extra_len())
    }

    /// Offset of the CRC field from the start of the header.
    pub const fn crc_offset() -> u64 {
        14
    }

    /// Offset of the compressed size from the start of the header. The
    /// uncompressed size follows it; in the ZIP64 extra the order is reversed.
    pub fn sizes_offset(&self) -> u64 {
        if self.zip64 {
            LOCAL_HEADER_LEN + self.name.len() as u64 + 4
        } else {
            18
        }
    }

    fn extra_len(&self) -> u16 {
        let zip64 = if self.zip64 {
            4 + Self::ZIP64_EXTRA_LEN
        } else {
            0
        };
        zip64 + self.extra.len() as u16
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let size_placeholder = if self.zip64 { U32_MARKER } else { 0 };
        w.write_u32::<LittleEndian>(LOCAL_HEADER_SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.method)?;
        w.write_u16::<LittleEndian>(self.mod_time)?;
        w.write_u16::<LittleEndian>(self.mod_date)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(size_placeholder)?;
        w.write_u32::<LittleEndian>(size_placeholder)?;
        w.write_u16::<LittleEndian>(self.name.len() as u16)?;
        w.write_u16::<LittleEndian>(self.extra_len())?;
        w.write_all(self.name)?;
        if self.zip64 {
            w.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            w.write_u16::<LittleEndian>(Self::ZIP64_EXTRA_LEN)?;
            w.write_u64::<LittleEndian>(0)?;
            w.write_u64::<LittleEndian>(0)?;
        }
        w.write_all(self.extra)
    }
}

/// One central directory record.
///
/// Sizes and offset are held at full width; whether they go into the classic
/// fields or the ZIP64 extra is decided when the record is written. `extra`
/// never contains a ZIP64 field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CentralRecord {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub header_offset: u64,
    pub name: Vec<u8>,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl CentralRecord {
    /// Whether any field reaches `limit`.
    pub fn exceeds(&self, limit: u64) -> bool {
        self.compressed_size >= limit
            || self.uncompressed_size >= limit
            || self.header_offset >= limit
    }

    /// Writes the record; `zip64` moves sizes and offset into the extra.
    pub fn write<W: Write>(&self, w: &mut W, zip64: bool) -> io::Result<()> {
        let extra_len = self.extra.len() + if zip64 { 28 } else { 0 };
        let version_needed = if zip64 {
            self.version_needed.max(VERSION_ZIP64)
        } else {
            self.version_needed
        };
        let narrow = |value: u64| if zip64 { U32_MARKER } else { value as u32 };

        w.write_u32::<LittleEndian>(CENTRAL_HEADER_SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_made_by)?;
        w.write_u16::<LittleEndian>(version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.method)?;
        w.write_u16::<LittleEndian>(self.mod_time)?;
        w.write_u16::<LittleEndian>(self.mod_date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(narrow(self.compressed_size))?;
        w.write_u32::<LittleEndian>(narrow(self.uncompressed_size))?;
        w.write_u16::<LittleEndian>(self.name.len() as u16)?;
        w.write_u16::<LittleEndian>(extra_len as u16)?;
        w.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u16::<LittleEndian>(self.internal_attrs)?;
        w.write_u32::<LittleEndian>(self.external_attrs)?;
        w.write_u32::<LittleEndian>(narrow(self.header_offset))?;
        w.write_all(&self.name)?;
        if zip64 {
            w.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            w.write_u16::<LittleEndian>(24)?;
            w.write_u64::<LittleEndian>(self.uncompressed_size)?;
            w.write_u64::<LittleEndian>(self.compressed_size)?;
            w.write_u64::<LittleEndian>(self.header_offset)?;
        }
        w.write_all(&self.extra)?;
        w.write_all(&self.comment)
    }

    /// Parses one record, resolving a ZIP64 extra if present.
    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        if r.read_u32::<LittleEndian>()? != CENTRAL_HEADER_SIGNATURE {
            return Err(invalid_data("bad central directory signature"));
        }
        let version_made_by = r.read_u16::<LittleEndian>()?;
        let version_needed = r.read_u16::<LittleEndian>()?;
        let flags = r.read_u16::<LittleEndian>()?;
        let method = r.read_u16::<LittleEndian>()?;
        let mod_time = r.read_u16::<LittleEndian>()?;
        let mod_date = r.read_u16::<LittleEndian>()?;
        let crc32 = r.read_u32::<LittleEndian>()?;
        let compressed_size = r.read_u32::<LittleEndian>()?;
        let uncompressed_size = r.read_u32::<LittleEndian>()?;
        let name_len = r.read_u16::<LittleEndian>()?;
        let extra_len = r.read_u16::<LittleEndian>()?;
        let comment_len = r.read_u16::<LittleEndian>()?;
        let disk_start = r.read_u16::<LittleEndian>()?;
        let internal_attrs = r.read_u16::<LittleEndian>()?;
        let external_attrs = r.read_u32::<LittleEndian>()?;
        let header_offset = r.read_u32::<LittleEndian>()?;

        let name = read_vec(r, name_len)?;
        let raw_extra = read_vec(r, extra_len)?;
        let comment = read_vec(r, comment_len)?;

        let mut record = Self {
            version_made_by,
            version_needed,
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            compressed_size: u64::from(compressed_size),
            uncompressed_size: u64::from(uncompressed_size),
            internal_attrs,
            external_attrs,
            header_offset: u64::from(header_offset),
            name,
            extra: Vec::with_capacity(raw_extra.len()),
            comment,
        };

        let mut disk_start = u32::from(disk_start);
        let mut fields = ExtraFields::new(&raw_extra);
        while let Some((id, data)) = fields.next_field()? {
            if id == ZIP64_EXTRA_ID {
                let mut data = data;
                if uncompressed_size == U32_MARKER {
                    record.uncompressed_size = data.read_u64::<LittleEndian>()?;
                }
                if compressed_size == U32_MARKER {
                    record.compressed_size = data.read_u64::<LittleEndian>()?;
                }
                if header_offset == U32_MARKER {
                    record.header_offset = data.read_u64::<LittleEndian>()?;
                }
                if disk_start == u32::from(U16_MARKER) {
                    disk_start = data.read_u32::<LittleEndian>()?;
                }
            } else {
                record.extra.write_u16::<LittleEndian>(id)?;
                record.extra.write_u16::<LittleEndian>(data.len() as u16)?;
                record.extra.extend_from_slice(data);
            }
        }

        if disk_start != 0 {
            return Err(invalid_data("multi-disk archives are not supported"));
        }
        Ok(record)
    }
}

/// Iterator over `(id, data)` pairs of an extra field block.
struct ExtraFields<'a> {
    rest: &'a [u8],
}

impl<'a> ExtraFields<'a> {
    const fn new(block: &'a [u8]) -> Self {
        Self { rest: block }
    }

    fn next_field(&mut self) -> io::Result<Option<(u16, &'a [u8])>> {
        if self.rest.len() < 4 {
            // Some writers pad the block; a short tail is not a field.
            return Ok(None);
        }
        let mut header = &self.rest[..4];
        let id = header.read_u16::<LittleEndian>()?;
        let len = usize::from(header.read_u16::<LittleEndian>()?);
        let data = self
            .rest
            .get(4..4 + len)
            .ok_or_else(|| invalid_data("extra field overruns its block"))?;
        self.rest = &self.rest[4 + len..];
        Ok(Some((id, data)))
    }
}

/// Totals recorded in the end-of-central-directory records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirectoryEnd {
    pub entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl DirectoryEnd {
    /// Writes the ZIP64 end record and locator, if requested, then the
    /// classic end record. The writer must be positioned right after the
    /// central directory.
    pub fn write<W: Write>(&self, w: &mut W, zip64: bool, comment: &[u8]) -> io::Result<()> {
        if zip64 {
            let zip64_end_offset = self.cd_offset + self.cd_size;
            w.write_u32::<LittleEndian>(ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
            w.write_u64::<LittleEndian>(ZIP64_END_OF_CENTRAL_DIRECTORY_LEN - 12)?;
            w.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
            w.write_u16::<LittleEndian>(VERSION_ZIP64)?;
            w.write_u32::<LittleEndian>(0)?;
            w.write_u32::<LittleEndian>(0)?;
            w.write_u64::<LittleEndian>(self.entries)?;
            w.write_u64::<LittleEndian>(self.entries)?;
            w.write_u64::<LittleEndian>(self.cd_size)?;
            w.write_u64::<LittleEndian>(self.cd_offset)?;

            w.write_u32::<LittleEndian>(ZIP64_LOCATOR_SIGNATURE)?;
            w.write_u32::<LittleEndian>(0)?;
            w.write_u64::<LittleEndian>(zip64_end_offset)?;
            w.write_u32::<LittleEndian>(1)?;
        }

        let entries = u16::try_from(self.entries)
            .ok()
            .filter(|&n| n < U16_MARKER)
            .unwrap_or(U16_MARKER);
        let narrow = |value: u64| {
            u32::try_from(value)
                .ok()
                .filter(|&n| n < U32_MARKER)
                .unwrap_or(U32_MARKER)
        };

        w.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u16::<LittleEndian>(entries)?;
        w.write_u16::<LittleEndian>(entries)?;
        w.write_u32::<LittleEndian>(narrow(self.cd_size))?;
        w.write_u32::<LittleEndian>(narrow(self.cd_offset))?;
        w.write_u16::<LittleEndian>(comment.len() as u16)?;
        w.write_all(comment)
    }
}

/// Converts a local timestamp to MS-DOS `(time, date)`.
///
/// DOS dates cover 1980 to 2107 with two-second resolution; anything outside
/// is clamped to the nearest end.
pub(crate) fn dos_datetime(timestamp: &NaiveDateTime) -> (u16, u16) {
    match timestamp.year() {
        ..1980 => (0, (1 << 5) | 1),
        2108.. => ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31),
        year => {
            let time = (timestamp.hour() << 11) | (timestamp.minute() << 5) | (timestamp.second() / 2);
            let date = (((year - 1980) as u32) << 9) | (timestamp.month() << 5) | timestamp.day();
            (time as u16, date as u16)
        }
    }
}

pub(crate) fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

fn read_vec<R: Read>(r: &mut R, len: u16) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; usize::from(len)];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
