//! Error types for archive construction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ZipBuildError`.
pub type Result<T> = std::result::Result<T, ZipBuildError>;

/// The limit of the classic ZIP format that an archive would overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zip64Limit {
    /// A single entry's compressed or uncompressed size.
    EntrySize {
        /// Entry name as requested by the caller.
        name: String,
        /// Size in bytes.
        size: u64,
    },
    /// Offset of an entry's local header within the archive.
    EntryOffset {
        /// Entry name as requested by the caller.
        name: String,
        /// Offset in bytes.
        offset: u64,
    },
    /// Number of entries in the central directory.
    EntryCount {
        /// Entry count.
        count: u64,
    },
    /// Offset or size of the central directory.
    CentralDirectory {
        /// The offending value in bytes.
        value: u64,
    },
}

impl std::fmt::Display for Zip64Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntrySize { name, size } => {
                write!(f, "entry '{name}' is too large ({size} bytes)")
            }
            Self::EntryOffset { name, offset } => {
                write!(f, "entry '{name}' starts beyond 4 GiB (offset {offset})")
            }
            Self::EntryCount { count } => write!(f, "too many entries ({count})"),
            Self::CentralDirectory { value } => {
                write!(f, "central directory beyond 4 GiB ({value} bytes)")
            }
        }
    }
}

/// Errors that can occur while building an archive.
#[derive(Error, Debug)]
pub enum ZipBuildError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No source files matched and the caller asked for an error.
    #[error("no files found in {directory} matching '{mask}'")]
    SourceNotFound {
        /// Directory that was searched.
        directory: PathBuf,
        /// File mask that was applied.
        mask: String,
    },

    /// An explicit file list selects nothing and the caller asked for an
    /// error.
    #[error("file list is empty")]
    EmptyFileList,

    /// The directory to enumerate does not exist.
    #[error("source directory not found: {path}")]
    SourceDirectoryMissing {
        /// The missing directory.
        path: PathBuf,
    },

    /// A path from an explicit file list does not exist or is not a file.
    #[error("source file not found: {path}")]
    MissingSourceFile {
        /// The missing file.
        path: PathBuf,
    },

    /// Two entries resolve to the same name and renaming is disabled.
    #[error("duplicate entry name '{name}' (enable duplicate renaming to keep both)")]
    DuplicateEntry {
        /// The colliding entry name.
        name: String,
    },

    /// Destination archive exists and the exist-action is `Error`.
    #[error("destination file already exists: {path}")]
    DestinationExists {
        /// The existing destination.
        path: PathBuf,
    },

    /// Destination directory is missing and may not be created.
    #[error("destination directory does not exist: {path}")]
    DestinationFolderMissing {
        /// The missing directory.
        path: PathBuf,
    },

    /// Another invocation is writing the same destination.
    #[error("destination is locked by another writer: {path}")]
    DestinationLocked {
        /// The locked destination.
        path: PathBuf,
    },

    /// The archive to append to cannot be read as a ZIP archive.
    #[error("not a valid ZIP archive: {path}: {reason}")]
    NotAValidArchive {
        /// The archive path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A classic ZIP limit was reached while ZIP64 is disabled.
    #[error("ZIP64 required but disabled: {limit}")]
    Zip64LimitExceeded {
        /// The limit that was exceeded.
        limit: Zip64Limit,
    },

    /// The requested text encoding is not known.
    #[error("unknown encoding: '{name}'")]
    UnknownEncoding {
        /// Encoding name as given.
        name: String,
    },

    /// An entry could not be encrypted.
    #[error("failed to encrypt entry '{name}': {reason}")]
    EncryptionFailure {
        /// Entry name.
        name: String,
        /// Underlying cause.
        reason: String,
    },

    /// The supplied parameters are inconsistent.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Reason for the rejection.
        reason: String,
    },

    /// The invocation was cancelled before the archive was committed.
    #[error("operation cancelled")]
    Cancelled,
}

impl ZipBuildError {
    /// Returns `true` if the error comes from the destination already being
    /// in use or present.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use zipbuild_core::ZipBuildError;
    ///
    /// let err = ZipBuildError::DestinationExists {
    ///     path: PathBuf::from("out.zip"),
    /// };
    /// assert!(err.is_destination_conflict());
    /// assert!(!ZipBuildError::Cancelled.is_destination_conflict());
    /// ```
    #[must_use]
    pub const fn is_destination_conflict(&self) -> bool {
        matches!(
            self,
            Self::DestinationExists { .. }
                | Self::DestinationLocked { .. }
                | Self::DestinationFolderMissing { .. }
        )
    }

    /// Returns `true` if the error was caused by the source selection.
    #[must_use]
    pub const fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::EmptyFileList
                | Self::SourceDirectoryMissing { .. }
                | Self::MissingSourceFile { .. }
                | Self::DuplicateEntry { .. }
        )
    }

    /// Returns the ZIP64 limit that was hit, if applicable.
    #[must_use]
    pub const fn zip64_limit(&self) -> Option<&Zip64Limit> {
        match self {
            Self::Zip64LimitExceeded { limit } => Some(limit),
            _ => None,
        }
    }

    pub(crate) fn invalid_archive(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotAValidArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZipBuildError::Cancelled;
        assert_eq!(err.to_string(), "operation cancelled");
    }

    #[test]
    fn test_duplicate_entry_display() {
        let err = ZipBuildError::DuplicateEntry {
            name: "a.txt".into(),
        };
        assert!(err.to_string().contains("'a.txt'"));
        assert!(err.is_source_error());
        assert!(!err.is_destination_conflict());
    }

    #[test]
    fn test_empty_file_list_display() {
        let err = ZipBuildError::EmptyFileList;
        assert_eq!(err.to_string(), "file list is empty");
        assert!(err.is_source_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ZipBuildError = io_err.into();
        assert!(matches!(err, ZipBuildError::Io(_)));
    }

    #[test]
    fn test_destination_conflicts() {
        let path = PathBuf::from("out.zip");
        assert!(ZipBuildError::DestinationExists { path: path.clone() }.is_destination_conflict());
        assert!(ZipBuildError::DestinationLocked { path: path.clone() }.is_destination_conflict());
        assert!(ZipBuildError::DestinationFolderMissing { path }.is_destination_conflict());
        assert!(!ZipBuildError::UnknownEncoding { name: "x".into() }.is_destination_conflict());
    }

    #[test]
    fn test_zip64_limit_accessor() {
        let err = ZipBuildError::Zip64LimitExceeded {
            limit: Zip64Limit::EntryCount { count: 70_000 },
        };
        assert!(err.to_string().contains("70000"));
        assert_eq!(
            err.zip64_limit(),
            Some(&Zip64Limit::EntryCount { count: 70_000 })
        );
        assert_eq!(ZipBuildError::Cancelled.zip64_limit(), None);
    }

    #[test]
    fn test_zip64_limit_display() {
        let limit = Zip64Limit::EntrySize {
            name: "big.bin".into(),
            size: 5_000_000_000,
        };
        let display = limit.to_string();
        assert!(display.contains("big.bin"));
        assert!(display.contains("5000000000"));
    }

    #[test]
    fn test_invalid_archive_helper() {
        let err = ZipBuildError::invalid_archive("old.zip", "missing end record");
        let display = err.to_string();
        assert!(display.contains("old.zip"));
        assert!(display.contains("missing end record"));
    }
}
