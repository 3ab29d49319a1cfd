//! Central directory reader for appending to an existing archive.
//!
//! Only the metadata is read: the end record (classic or ZIP64), every
//! central record and the archive comment. Entry payloads are never
//! decompressed; they are carried over byte for byte.

use crate::Result;
use crate::ZipBuildError;
use crate::zip::format::CentralRecord;
use crate::zip::format::END_OF_CENTRAL_DIRECTORY_LEN;
use crate::zip::format::END_OF_CENTRAL_DIRECTORY_SIGNATURE;
use crate::zip::format::LOCAL_HEADER_SIGNATURE;
use crate::zip::format::U16_MARKER;
use crate::zip::format::U32_MARKER;
use crate::zip::format::ZIP64_END_OF_CENTRAL_DIRECTORY_LEN;
use crate::zip::format::ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE;
use crate::zip::format::ZIP64_LOCATOR_LEN;
use crate::zip::format::ZIP64_LOCATOR_SIGNATURE;
use crate::zip::format::invalid_data;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// Largest archive comment the format allows.
const MAX_COMMENT_LEN: u64 = 65_535;

/// Metadata of an archive that new entries will be appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingArchive {
    pub(crate) records: Vec<CentralRecord>,
    pub(crate) cd_offset: u64,
    pub(crate) comment: Vec<u8>,
}

impl ExistingArchive {
    /// Reads the central directory of the archive in `reader`.
    ///
    /// `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns `NotAValidArchive` if the data is not a consistent,
    /// single-disk ZIP archive.
    pub fn read<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<Self> {
        read_archive(reader).map_err(|e| ZipBuildError::invalid_archive(path, e.to_string()))
    }

    /// Number of entries in the archive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the archive has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entry names as stored, in central directory order.
    pub fn raw_names(&self) -> impl Iterator<Item = &[u8]> {
        self.records.iter().map(|r| r.name.as_slice())
    }

    /// Offset at which the central directory starts; new entries are
    /// written from here.
    #[must_use]
    pub fn cd_offset(&self) -> u64 {
        self.cd_offset
    }
}

struct EndRecord {
    entries: u64,
    cd_size: u64,
    cd_offset: u64,
    /// Where the directory must end: the ZIP64 end record or the classic one.
    directory_limit: u64,
    comment: Vec<u8>,
}

fn read_archive<R: Read + Seek>(reader: &mut R) -> io::Result<ExistingArchive> {
    let len = reader.seek(SeekFrom::End(0))?;
    let end = find_end_record(reader, len)?;

    if end.cd_offset.checked_add(end.cd_size) != Some(end.directory_limit) {
        return Err(invalid_data("central directory does not end at the end record"));
    }

    reader.seek(SeekFrom::Start(end.cd_offset))?;
    let mut directory = vec![0u8; usize::try_from(end.cd_size).map_err(|_| invalid_data("central directory too large"))?];
    reader.read_exact(&mut directory)?;

    let mut cursor = Cursor::new(directory.as_slice());
    let mut records = Vec::new();
    for _ in 0..end.entries {
        let record = CentralRecord::read(&mut cursor)?;
        if record.header_offset >= end.cd_offset {
            return Err(invalid_data("entry header points into the central directory"));
        }
        records.push(record);
    }
    if cursor.position() != end.cd_size {
        return Err(invalid_data("central directory size does not match its records"));
    }

    if let Some(first) = records.iter().map(|r| r.header_offset).min() {
        reader.seek(SeekFrom::Start(first))?;
        if reader.read_u32::<LittleEndian>()? != LOCAL_HEADER_SIGNATURE {
            return Err(invalid_data("bad local header signature"));
        }
    }

    Ok(ExistingArchive {
        records,
        cd_offset: end.cd_offset,
        comment: end.comment,
    })
}

/// Scans the tail of the file backwards for the end record whose comment
/// length reaches exactly to the end of the file.
fn find_end_record<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<EndRecord> {
    if len < END_OF_CENTRAL_DIRECTORY_LEN {
        return Err(invalid_data("file too small"));
    }
    let search_len = len.min(MAX_COMMENT_LEN + END_OF_CENTRAL_DIRECTORY_LEN);
    let search_start = len - search_len;
    reader.seek(SeekFrom::Start(search_start))?;
    let mut tail = vec![0u8; search_len as usize];
    reader.read_exact(&mut tail)?;

    let eocd_len = END_OF_CENTRAL_DIRECTORY_LEN as usize;
    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
    let position = (0..=tail.len() - eocd_len)
        .rev()
        .find(|&i| {
            tail[i..i + 4] == signature
                && usize::from(u16::from_le_bytes([tail[i + 20], tail[i + 21]]))
                    == tail.len() - i - eocd_len
        })
        .ok_or_else(|| invalid_data("end of central directory not found"))?;

    let mut fields = &tail[position + 4..position + eocd_len];
    let disk = fields.read_u16::<LittleEndian>()?;
    let cd_disk = fields.read_u16::<LittleEndian>()?;
    let _disk_entries = fields.read_u16::<LittleEndian>()?;
    let entries = fields.read_u16::<LittleEndian>()?;
    let cd_size = fields.read_u32::<LittleEndian>()?;
    let cd_offset = fields.read_u32::<LittleEndian>()?;
    if disk != 0 || cd_disk != 0 {
        return Err(invalid_data("multi-disk archives are not supported"));
    }

    let eocd_offset = search_start + position as u64;
    let comment = tail[position + eocd_len..].to_vec();

    let mut end = EndRecord {
        entries: u64::from(entries),
        cd_size: u64::from(cd_size),
        cd_offset: u64::from(cd_offset),
        directory_limit: eocd_offset,
        comment,
    };

    if eocd_offset >= ZIP64_LOCATOR_LEN {
        if let Some(zip64_offset) = read_locator(reader, eocd_offset - ZIP64_LOCATOR_LEN)? {
            read_zip64_end(reader, zip64_offset, &mut end)?;
        }
    } else if entries == U16_MARKER || cd_size == U32_MARKER || cd_offset == U32_MARKER {
        return Err(invalid_data("ZIP64 end record missing"));
    }
    Ok(end)
}

fn read_locator<R: Read + Seek>(reader: &mut R, offset: u64) -> io::Result<Option<u64>> {
    reader.seek(SeekFrom::Start(offset))?;
    if reader.read_u32::<LittleEndian>()? != ZIP64_LOCATOR_SIGNATURE {
        return Ok(None);
    }
    let _disk = reader.read_u32::<LittleEndian>()?;
    Ok(Some(reader.read_u64::<LittleEndian>()?))
}

fn read_zip64_end<R: Read + Seek>(reader: &mut R, offset: u64, end: &mut EndRecord) -> io::Result<()> {
    if offset + ZIP64_END_OF_CENTRAL_DIRECTORY_LEN > end.directory_limit {
        return Err(invalid_data("ZIP64 end record out of range"));
    }
    reader.seek(SeekFrom::Start(offset))?;
    if reader.read_u32::<LittleEndian>()? != ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(invalid_data("bad ZIP64 end record signature"));
    }
    let _record_len = reader.read_u64::<LittleEndian>()?;
    let _made_by = reader.read_u16::<LittleEndian>()?;
    let _needed = reader.read_u16::<LittleEndian>()?;
    let disk = reader.read_u32::<LittleEndian>()?;
    let cd_disk = reader.read_u32::<LittleEndian>()?;
    let _disk_entries = reader.read_u64::<LittleEndian>()?;
    end.entries = reader.read_u64::<LittleEndian>()?;
    end.cd_size = reader.read_u64::<LittleEndian>()?;
    end.cd_offset = reader.read_u64::<LittleEndian>()?;
    end.directory_limit = offset;
    if disk != 0 || cd_disk != 0 {
        return Err(invalid_data("multi-disk archives are not supported"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_archive(comment: &str) -> Vec<u8> {
        let mut zip = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = ::zip::write::SimpleFileOptions::default()
            .compression_method(::zip::CompressionMethod::Stored);
        zip.start_file("first.txt", options).unwrap();
        zip.write_all(b"one").unwrap();
        zip.start_file("dir/second.txt", options).unwrap();
        zip.write_all(b"two").unwrap();
        zip.set_comment(comment);
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_reads_foreign_archive() {
        let data = sample_archive("");
        let archive = ExistingArchive::read(&mut Cursor::new(&data), Path::new("a.zip")).unwrap();
        let names: Vec<_> = archive.raw_names().collect();
        assert_eq!(names, vec![&b"first.txt"[..], &b"dir/second.txt"[..]]);
        assert_eq!(archive.len(), 2);
        assert!(archive.comment.is_empty());
        assert_eq!(archive.records[0].header_offset, 0);
        assert_eq!(archive.records[1].uncompressed_size, 3);
    }

    #[test]
    fn test_keeps_comment() {
        let data = sample_archive("kept");
        let archive = ExistingArchive::read(&mut Cursor::new(&data), Path::new("a.zip")).unwrap();
        assert_eq!(archive.comment, b"kept");
        assert!(archive.cd_offset() < data.len() as u64);
    }

    #[test]
    fn test_empty_archive() {
        let data = ::zip::ZipWriter::new(Cursor::new(Vec::new()))
            .finish()
            .unwrap()
            .into_inner();
        let archive = ExistingArchive::read(&mut Cursor::new(&data), Path::new("a.zip")).unwrap();
        assert!(archive.is_empty());
        assert_eq!(archive.cd_offset(), 0);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = ExistingArchive::read(
            &mut Cursor::new(b"this is not a zip file at all".to_vec()),
            Path::new("junk.zip"),
        )
        .unwrap_err();
        assert!(matches!(err, ZipBuildError::NotAValidArchive { ref path, .. } if path == Path::new("junk.zip")));
    }

    #[test]
    fn test_rejects_tiny_file() {
        let err = ExistingArchive::read(&mut Cursor::new(vec![0u8; 4]), Path::new("x.zip")).unwrap_err();
        assert!(matches!(err, ZipBuildError::NotAValidArchive { .. }));
    }

    #[test]
    fn test_rejects_truncated_directory() {
        let mut data = sample_archive("");
        // Drop the first byte of the central directory.
        let archive = ExistingArchive::read(&mut Cursor::new(&data), Path::new("a.zip")).unwrap();
        data.remove(archive.cd_offset() as usize);
        let err = ExistingArchive::read(&mut Cursor::new(&data), Path::new("a.zip")).unwrap_err();
        assert!(matches!(err, ZipBuildError::NotAValidArchive { .. }));
    }
}
