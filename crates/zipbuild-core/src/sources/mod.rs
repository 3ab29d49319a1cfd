//! Source file discovery.
//!
//! Turns a [`SourceSpec`] into the ordered list of files to archive, each
//! with the entry name it asks for. Name collisions are not resolved here.

pub mod mask;
pub mod walker;

pub use mask::FileMask;
pub use walker::MaskWalker;

use crate::Result;
use crate::ZipBuildError;
use crate::config::SourceFilesType;
use crate::config::SourceSpec;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// A file selected for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file.
    pub path: PathBuf,

    /// Requested entry name, `/`-separated.
    pub entry_name: String,
}

/// Resolves the files selected by `spec`, in archive order.
///
/// An empty result is not an error here; the caller decides what an empty
/// selection means.
///
/// # Errors
///
/// Returns an error if:
/// - The enumeration directory does not exist (`SourceDirectoryMissing`)
/// - A listed file does not exist or is not a file (`MissingSourceFile`)
/// - A directory cannot be read
///
/// # Examples
///
/// ```no_run
/// use zipbuild_core::SourceSpec;
/// use zipbuild_core::sources::resolve_sources;
///
/// let spec = SourceSpec::path_and_mask("/data/outbox", "*.xml");
/// for file in resolve_sources(&spec)? {
///     println!("{}", file.entry_name);
/// }
/// # Ok::<(), zipbuild_core::ZipBuildError>(())
/// ```
pub fn resolve_sources(spec: &SourceSpec) -> Result<Vec<SourceFile>> {
    let files = match spec.source_type {
        SourceFilesType::PathAndFileMask => enumerate_directory(spec)?,
        SourceFilesType::FileList => collect_file_list(&spec.file_paths)?,
    };
    debug!(
        source_type = ?spec.source_type,
        count = files.len(),
        "resolved source files"
    );
    Ok(files)
}

fn enumerate_directory(spec: &SourceSpec) -> Result<Vec<SourceFile>> {
    let root = absolute(&spec.directory)?;
    if !root.is_dir() {
        return Err(ZipBuildError::SourceDirectoryMissing { path: root });
    }

    let mask = FileMask::new(&spec.file_mask);
    MaskWalker::new(&root, &mask)
        .recursive(spec.include_subfolders)
        .flatten(spec.flatten_folders)
        .walk()
        .collect()
}

fn collect_file_list(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    paths
        .iter()
        .map(|path| {
            let path = absolute(path)?;
            if !path.is_file() {
                return Err(ZipBuildError::MissingSourceFile { path });
            }
            let entry_name = walker::file_name(&path)?;
            Ok(SourceFile { path, entry_name })
        })
        .collect()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
