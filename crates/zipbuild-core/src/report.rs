//! Results of archive construction.

use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

/// Result of the filesystem variant.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use zipbuild_core::Output;
///
/// let output = Output::new(PathBuf::from("/out/a.zip"), vec!["x.txt".to_string()]);
/// assert_eq!(output.file_count, 1);
/// assert!(!output.has_removal_failures());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    /// Path of the archive that was written, after any rename.
    pub path: PathBuf,

    /// Number of entries added by this invocation.
    pub file_count: usize,

    /// Entry names written by this invocation, in write order.
    pub archived_files: Vec<String>,

    /// Sources that could not be deleted after the archive was committed.
    pub removal_failures: Vec<RemovalFailure>,
}

impl Output {
    /// Creates a result for the entries `archived_files` written to `path`.
    #[must_use]
    pub fn new(path: PathBuf, archived_files: Vec<String>) -> Self {
        Self {
            path,
            file_count: archived_files.len(),
            archived_files,
            removal_failures: Vec::new(),
        }
    }

    /// Returns whether any source could not be deleted.
    #[must_use]
    pub fn has_removal_failures(&self) -> bool {
        !self.removal_failures.is_empty()
    }
}

/// A source file that stayed in place after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalFailure {
    /// The source that was not deleted.
    pub path: PathBuf,
    /// Why deletion failed.
    pub reason: String,
}

/// Result of the in-memory variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryOutput {
    /// The complete archive.
    pub result_bytes: Vec<u8>,
}
