//! Directory enumeration with a file mask.
//!
//! Traversal is depth-first and each directory's entries are visited in
//! lexicographic order, so the same tree always yields the same sequence.

use crate::Result;
use crate::ZipBuildError;
use crate::sources::FileMask;
use crate::sources::SourceFile;
use std::path::Path;
use walkdir::WalkDir;

/// Walks a directory and yields the regular files matching a mask.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use zipbuild_core::sources::FileMask;
/// use zipbuild_core::sources::MaskWalker;
///
/// let mask = FileMask::new("*.log");
/// let walker = MaskWalker::new(Path::new("/var/log/app"), &mask)
///     .recursive(true)
///     .flatten(false);
///
/// for file in walker.walk() {
///     let file = file?;
///     println!("{} -> {}", file.path.display(), file.entry_name);
/// }
/// # Ok::<(), zipbuild_core::ZipBuildError>(())
/// ```
pub struct MaskWalker<'a> {
    root: &'a Path,
    mask: &'a FileMask,
    recursive: bool,
    flatten: bool,
}

impl<'a> MaskWalker<'a> {
    /// Creates a non-recursive, non-flattening walker over `root`.
    #[must_use]
    pub fn new(root: &'a Path, mask: &'a FileMask) -> Self {
        Self {
            root,
            mask,
            recursive: false,
            flatten: false,
        }
    }

    /// Descend into subdirectories.
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Use bare file names as entry names.
    #[must_use]
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Returns an iterator over matching files.
    ///
    /// Symbolic links are not followed and never yielded. Directories are
    /// traversed but never yielded.
    ///
    /// # Errors
    ///
    /// Items are errors when a directory cannot be read.
    pub fn walk(&self) -> impl Iterator<Item = Result<SourceFile>> + '_ {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        WalkDir::new(self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let name = entry.file_name().to_string_lossy();
                    if !self.mask.matches(&name) {
                        return None;
                    }
                    Some(self.source_file(entry.path()))
                }
                Err(e) => Some(Err(ZipBuildError::Io(std::io::Error::other(format!(
                    "cannot enumerate {}: {e}",
                    self.root.display()
                ))))),
            })
    }

    fn source_file(&self, path: &Path) -> Result<SourceFile> {
        let entry_name = if self.flatten {
            file_name(path)?
        } else {
            relative_entry_name(path, self.root)?
        };
        Ok(SourceFile {
            path: path.to_path_buf(),
            entry_name,
        })
    }
}

/// Bare file name of `path`.
pub(crate) fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ZipBuildError::Io(std::io::Error::other(format!(
                "cannot determine file name for {}",
                path.display()
            )))
        })
}

/// Path of `path` relative to `root`, joined with `/`.
fn relative_entry_name(path: &Path, root: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        ZipBuildError::Io(std::io::Error::other(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        )))
    })?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("c.log"), "c").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/d.txt"), "d").unwrap();
        fs::create_dir(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/deeper/e.TXT"), "e").unwrap();
        temp
    }

    fn names(walker: &MaskWalker<'_>) -> Vec<String> {
        walker
            .walk()
            .map(|f| f.unwrap().entry_name)
            .collect::<Vec<_>>()
    }

    #[test]
    fn test_top_level_only() {
        let temp = tree();
        let mask = FileMask::new("*.txt");
        let walker = MaskWalker::new(temp.path(), &mask);
        assert_eq!(names(&walker), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_recursive_is_depth_first_and_sorted() {
        let temp = tree();
        let mask = FileMask::new("*.txt");
        let walker = MaskWalker::new(temp.path(), &mask).recursive(true);
        assert_eq!(
            names(&walker),
            vec!["a.txt", "b.txt", "sub/d.txt", "sub/deeper/e.TXT"]
        );
    }

    #[test]
    fn test_flatten_uses_basenames() {
        let temp = tree();
        let mask = FileMask::new("*");
        let walker = MaskWalker::new(temp.path(), &mask)
            .recursive(true)
            .flatten(true);
        assert_eq!(
            names(&walker),
            vec!["a.txt", "b.txt", "c.log", "d.txt", "e.TXT"]
        );
    }

    #[test]
    fn test_paths_point_at_sources() {
        let temp = tree();
        let mask = FileMask::new("d.txt");
        let walker = MaskWalker::new(temp.path(), &mask).recursive(true);
        let files: Vec<_> = walker.walk().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, temp.path().join("sub/d.txt"));
    }

    #[test]
    fn test_directories_are_not_yielded() {
        let temp = tree();
        let mask = FileMask::new("sub*");
        let walker = MaskWalker::new(temp.path(), &mask).recursive(true);
        assert!(names(&walker).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let temp = tree();
        std::os::unix::fs::symlink(temp.path().join("a.txt"), temp.path().join("link.txt"))
            .unwrap();
        let mask = FileMask::new("*.txt");
        let walker = MaskWalker::new(temp.path(), &mask);
        assert_eq!(names(&walker), vec!["a.txt", "b.txt"]);
    }
}
