//! Two-phase archive output.
//!
//! The archive is built in a temporary file next to its destination and
//! renamed over it on commit. Until then the destination is untouched; a
//! staged archive that is dropped without commit deletes its temporary file.

use crate::Result;
use crate::ZipBuildError;
use crate::destination::OpenMode;
use crate::destination::ResolvedDestination;
use crate::zip::ExistingArchive;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;
use tempfile::Builder;
use tempfile::NamedTempFile;
use tracing::debug;

/// Output buffer for the staged file.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// An archive being written to a temporary file.
#[derive(Debug)]
pub struct StagedArchive {
    temp: NamedTempFile,
    target: PathBuf,
    mode: OpenMode,
}

impl StagedArchive {
    /// Creates an empty staging file for a new or replacing archive.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary file cannot be created.
    pub fn create(destination: &ResolvedDestination) -> Result<Self> {
        let temp = temp_file_beside(&destination.path)?;
        debug!(
            staging = %temp.path().display(),
            target = %destination.path.display(),
            "staging archive"
        );
        Ok(Self {
            temp,
            target: destination.path.clone(),
            mode: destination.mode,
        })
    }

    /// Creates a staging file holding a copy of the destination archive up
    /// to its central directory, and returns the parsed directory.
    ///
    /// # Errors
    ///
    /// Returns `NotAValidArchive` if the destination is not a readable ZIP
    /// archive, or an I/O error.
    pub fn append(destination: &ResolvedDestination) -> Result<(Self, ExistingArchive)> {
        let mut original = File::open(&destination.path)?;
        let existing = ExistingArchive::read(&mut original, &destination.path)?;

        let mut staged = Self::create(destination)?;
        original.seek(SeekFrom::Start(0))?;
        let copied = io::copy(
            &mut (&mut original).take(existing.cd_offset()),
            staged.temp.as_file_mut(),
        )?;
        if copied != existing.cd_offset() {
            return Err(ZipBuildError::invalid_archive(
                &destination.path,
                "archive shorter than its central directory offset",
            ));
        }
        debug!(
            entries = existing.len(),
            kept_bytes = copied,
            "existing archive staged"
        );
        Ok((staged, existing))
    }

    /// Buffered writer over the staging file.
    pub fn writer(&mut self) -> BufWriter<&mut File> {
        BufWriter::with_capacity(WRITE_BUFFER_SIZE, self.temp.as_file_mut())
    }

    /// Path of the temporary file.
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        self.temp.path()
    }

    /// Flushes the staged archive to disk and moves it onto the target.
    ///
    /// A fresh target is never overwritten: if a file appeared there in the
    /// meantime, the commit fails with `DestinationExists`.
    ///
    /// # Errors
    ///
    /// Returns `DestinationExists` as described, or an I/O error.
    pub fn commit(self) -> Result<PathBuf> {
        self.temp.as_file().sync_all()?;
        let Self { temp, target, mode } = self;
        match mode {
            OpenMode::Create => {
                temp.persist_noclobber(&target).map_err(|e| {
                    if e.error.kind() == io::ErrorKind::AlreadyExists {
                        ZipBuildError::DestinationExists {
                            path: target.clone(),
                        }
                    } else {
                        ZipBuildError::Io(e.error)
                    }
                })?;
            }
            OpenMode::Replace | OpenMode::Append => {
                temp.persist(&target).map_err(|e| ZipBuildError::Io(e.error))?;
            }
        }
        debug!(target = %target.display(), ?mode, "archive committed");
        Ok(target)
    }
}

fn temp_file_beside(target: &Path) -> Result<NamedTempFile> {
    let directory = target.parent().unwrap_or_else(|| Path::new("."));
    let mut builder = Builder::new();
    builder.prefix(".zipbuild-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    Ok(builder.tempfile_in(directory)?)
}
