//! Collision-free entry and file names.
//!
//! A taken name gets a counter suffix: `report.txt` becomes
//! `report_(1).txt`, then `report_(2).txt`, and so on. The counter goes
//! before the last `.` of the final path component; a leading dot does not
//! count as an extension separator, so `.env` becomes `.env_(1)`.

use crate::Result;
use crate::ZipBuildError;
use crate::encoding::NameCodec;
use std::collections::HashSet;

/// Returns `candidate` with counter `n` inserted before its extension.
///
/// # Examples
///
/// ```
/// use zipbuild_core::naming::suffixed_name;
///
/// assert_eq!(suffixed_name("example.txt", 1), "example_(1).txt");
/// assert_eq!(suffixed_name("archive.tar.gz", 2), "archive.tar_(2).gz");
/// assert_eq!(suffixed_name("dir.d/README", 1), "dir.d/README_(1)");
/// assert_eq!(suffixed_name(".env", 1), ".env_(1)");
/// ```
#[must_use]
pub fn suffixed_name(candidate: &str, n: usize) -> String {
    let file_start = candidate.rfind('/').map_or(0, |i| i + 1);
    let split = candidate[file_start..]
        .rfind('.')
        .filter(|&dot| dot > 0)
        .map_or(candidate.len(), |dot| file_start + dot);
    let (stem, extension) = candidate.split_at(split);
    format!("{stem}_({n}){extension}")
}

/// Resolves `candidate` against the names for which `is_taken` holds.
///
/// Returns `candidate` itself when it is free. Otherwise, with
/// `rename_duplicates` the first free [`suffixed_name`] is returned and
/// without it the collision is an error.
///
/// # Errors
///
/// Returns `DuplicateEntry` if the name is taken and renaming is disabled.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use zipbuild_core::naming::resolve_name;
///
/// let taken: HashSet<&str> = ["a.txt", "a_(1).txt"].into();
/// let name = resolve_name("a.txt", true, |n| taken.contains(n))?;
/// assert_eq!(name, "a_(2).txt");
/// assert!(resolve_name("a.txt", false, |n| taken.contains(n)).is_err());
/// # Ok::<(), zipbuild_core::ZipBuildError>(())
/// ```
pub fn resolve_name<F>(candidate: &str, rename_duplicates: bool, is_taken: F) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    if !is_taken(candidate) {
        return Ok(candidate.to_string());
    }
    if !rename_duplicates {
        return Err(ZipBuildError::DuplicateEntry {
            name: candidate.to_string(),
        });
    }
    (1..)
        .map(|n| suffixed_name(candidate, n))
        .find(|name| !is_taken(name))
        .ok_or_else(|| ZipBuildError::DuplicateEntry {
            name: candidate.to_string(),
        })
}

/// The set of entry names claimed so far in one archive.
///
/// Names are compared in the archive codec's bytes. In append mode the set
/// is seeded with the raw names already stored in the archive.
#[derive(Debug)]
pub struct EntryNames {
    codec: NameCodec,
    rename_duplicates: bool,
    taken: HashSet<Vec<u8>>,
}

impl EntryNames {
    /// Creates an empty name set.
    #[must_use]
    pub fn new(codec: NameCodec, rename_duplicates: bool) -> Self {
        Self {
            codec,
            rename_duplicates,
            taken: HashSet::new(),
        }
    }

    /// Adds names that are already present, as raw archive bytes.
    pub fn seed<I>(&mut self, raw_names: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.taken.extend(raw_names);
    }

    /// Resolves `candidate` and records the result as taken.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntry` if the name is taken and renaming is disabled.
    pub fn claim(&mut self, candidate: &str) -> Result<String> {
        let name = resolve_name(candidate, self.rename_duplicates, |n| {
            self.taken.contains(&self.codec.encode(n))
        })?;
        self.taken.insert(self.codec.encode(&name));
        Ok(name)
    }

    /// Number of names in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    /// Returns `true` if no name has been claimed or seeded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn utf8() -> NameCodec {
        NameCodec::Utf8 { always_flag: false }
    }

    #[test]
    fn test_suffix_before_last_extension() {
        assert_eq!(suffixed_name("example.txt", 1), "example_(1).txt");
        assert_eq!(suffixed_name("a.b.c", 3), "a.b_(3).c");
        assert_eq!(suffixed_name("noext", 2), "noext_(2)");
        assert_eq!(suffixed_name("dir/sub/x.log", 1), "dir/sub/x_(1).log");
        assert_eq!(suffixed_name("dir.v2/noext", 1), "dir.v2/noext_(1)");
        assert_eq!(suffixed_name("trailing.", 1), "trailing_(1).");
        assert_eq!(suffixed_name(".hidden", 1), ".hidden_(1)");
        assert_eq!(suffixed_name(".hidden.cfg", 1), ".hidden_(1).cfg");
    }

    #[test]
    fn test_resolve_free_name_is_unchanged() {
        let name = resolve_name("a.txt", false, |_| false).unwrap();
        assert_eq!(name, "a.txt");
    }

    #[test]
    fn test_resolve_duplicate_without_rename_fails() {
        let err = resolve_name("a.txt", false, |n| n == "a.txt").unwrap_err();
        assert!(matches!(err, ZipBuildError::DuplicateEntry { ref name } if name == "a.txt"));
    }

    #[test]
    fn test_claims_accumulate() {
        let mut names = EntryNames::new(utf8(), true);
        assert_eq!(names.claim("a.txt").unwrap(), "a.txt");
        assert_eq!(names.claim("a.txt").unwrap(), "a_(1).txt");
        assert_eq!(names.claim("a.txt").unwrap(), "a_(2).txt");
        // A literal suffixed name now collides with a generated one.
        assert_eq!(names.claim("a_(1).txt").unwrap(), "a_(1)_(1).txt");
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_seeded_names_are_taken() {
        let mut names = EntryNames::new(utf8(), true);
        names.seed([b"x.txt".to_vec()]);
        assert_eq!(names.claim("x.txt").unwrap(), "x_(1).txt");
    }

    #[test]
    fn test_collisions_compare_encoded_bytes() {
        let mut names = EntryNames::new(NameCodec::Ascii, true);
        assert_eq!(names.claim("ä.txt").unwrap(), "ä.txt");
        // Encodes to the same "?.txt" bytes.
        assert_eq!(names.claim("ö.txt").unwrap(), "ö_(1).txt");

        let mut names = EntryNames::new(utf8(), false);
        names.claim("ä.txt").unwrap();
        assert!(names.claim("ö.txt").is_ok());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut names = EntryNames::new(utf8(), false);
        names.claim("A.txt").unwrap();
        assert!(names.claim("a.txt").is_ok());
    }
}
