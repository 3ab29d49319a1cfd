//! Destination resolution, locking and staging.
//!
//! Resolution happens in two steps: [`prepare_directory`] makes sure the
//! destination directory exists, and [`FileExistAction::resolve`] decides
//! what to do about an archive that is already there. The caller holds a
//! [`DestinationLock`] on the requested path between the two.

pub mod lock;
pub mod staging;

pub use lock::DestinationLock;
pub use staging::StagedArchive;

use crate::FileExistAction;
use crate::Result;
use crate::ZipBuildError;
use crate::config::DestinationSpec;
use crate::config::Options;
use crate::naming::resolve_name;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

/// How the archive at the resolved path is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// A new file; the path must still be free at commit.
    Create,
    /// A new archive replacing the existing file.
    Replace,
    /// New entries added to the existing archive.
    Append,
}

/// Final archive path and how to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    /// Path the archive is committed to.
    pub path: PathBuf,
    /// Production mode.
    pub mode: OpenMode,
}

/// Returns the absolute destination directory, creating it if allowed.
///
/// # Errors
///
/// Returns `DestinationFolderMissing` if the directory does not exist and
/// may not be created, or an I/O error if creating it fails.
pub fn prepare_directory(spec: &DestinationSpec, options: &Options) -> Result<PathBuf> {
    let directory = std::path::absolute(&spec.directory)?;
    if directory.is_dir() {
        return Ok(directory);
    }
    if !options.create_destination_folder || directory.exists() {
        return Err(ZipBuildError::DestinationFolderMissing { path: directory });
    }
    std::fs::create_dir_all(&directory)?;
    info!(directory = %directory.display(), "created destination directory");
    Ok(directory)
}

impl FileExistAction {
    /// Resolves the archive path for `file_name` in `directory`.
    ///
    /// The action only matters if the file already exists; otherwise a new
    /// archive is created at the requested path.
    ///
    /// # Errors
    ///
    /// Returns `DestinationExists` for `Error` when the file exists.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use zipbuild_core::FileExistAction;
    /// use zipbuild_core::destination::OpenMode;
    ///
    /// let resolved = FileExistAction::Rename.resolve(Path::new("/out"), "daily.zip")?;
    /// assert_eq!(resolved.mode, OpenMode::Create);
    /// # Ok::<(), zipbuild_core::ZipBuildError>(())
    /// ```
    pub fn resolve(self, directory: &Path, file_name: &str) -> Result<ResolvedDestination> {
        let target = directory.join(file_name);
        if !target.exists() {
            return Ok(ResolvedDestination {
                path: target,
                mode: OpenMode::Create,
            });
        }
        match self {
            Self::Error => Err(ZipBuildError::DestinationExists { path: target }),
            Self::Append => Ok(ResolvedDestination {
                path: target,
                mode: OpenMode::Append,
            }),
            Self::Overwrite => Ok(ResolvedDestination {
                path: target,
                mode: OpenMode::Replace,
            }),
            Self::Rename => rename_beside(directory, file_name),
        }
    }
}

fn rename_beside(directory: &Path, file_name: &str) -> Result<ResolvedDestination> {
    let name = resolve_name(file_name, true, |candidate| directory.join(candidate).exists())?;
    info!(requested = file_name, renamed = %name, "destination exists, renaming");
    Ok(ResolvedDestination {
        path: directory.join(name),
        mode: OpenMode::Create,
    })
}
