//! Exclusive lock on an archive path.

use crate::Result;
use crate::ZipBuildError;
use std::fs::File;
use std::fs::OpenOptions;
use std::fs::TryLockError;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// Advisory lock held on `.<name>.lock` next to an archive.
///
/// Only writers going through this crate honor the lock. It is released
/// when the guard is dropped. The sidecar file stays in place: every writer
/// must lock the same inode, and unlinking it would let a writer that opened
/// the old file and one that creates a new file both succeed.
#[derive(Debug)]
pub struct DestinationLock {
    path: PathBuf,
    _file: File,
}

impl DestinationLock {
    /// Takes the lock for `target` without waiting.
    ///
    /// # Errors
    ///
    /// Returns `DestinationLocked` if another writer holds it, or an I/O
    /// error if the sidecar file cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use zipbuild_core::destination::DestinationLock;
    ///
    /// let guard = DestinationLock::acquire(Path::new("/out/report.zip"))?;
    /// assert!(DestinationLock::acquire(Path::new("/out/report.zip")).is_err());
    /// drop(guard);
    /// # Ok::<(), zipbuild_core::ZipBuildError>(())
    /// ```
    pub fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path(target)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => {
                debug!(lock = %path.display(), "destination locked");
                Ok(Self { path, _file: file })
            }
            Err(TryLockError::WouldBlock) => Err(ZipBuildError::DestinationLocked {
                path: target.to_path_buf(),
            }),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }

    /// Path of the sidecar lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        debug!(lock = %self.path.display(), "destination unlocked");
    }
}

fn lock_path(target: &Path) -> Result<PathBuf> {
    let name = target.file_name().ok_or_else(|| ZipBuildError::InvalidConfiguration {
        reason: format!("destination has no file name: {}", target.display()),
    })?;
    let mut lock_name = std::ffi::OsString::from(".");
    lock_name.push(name);
    lock_name.push(".lock");
    Ok(target.with_file_name(lock_name))
}
