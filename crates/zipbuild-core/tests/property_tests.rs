//! Property-based tests for naming, masks and the in-memory writer.
//!
//! These tests use proptest to generate arbitrary inputs and verify the
//! properties hold across a wide range of cases.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::io::Read;
use zipbuild_core::MemoryFile;
use zipbuild_core::MemoryOptions;
use zipbuild_core::MemorySource;
use zipbuild_core::NameCodec;
use zipbuild_core::create_archive_in_memory;
use zipbuild_core::naming::EntryNames;
use zipbuild_core::naming::suffixed_name;
use zipbuild_core::sources::FileMask;

fn utf8_names(rename: bool) -> EntryNames {
    EntryNames::new(NameCodec::Utf8 { always_flag: false }, rename)
}

proptest! {
    /// Claimed names never repeat, whatever the input.
    #[test]
    fn prop_claimed_names_are_unique(
        names in prop::collection::vec("[a-c]{1,2}(\\.[xy])?", 1..40)
    ) {
        let mut set = utf8_names(true);
        let mut seen = HashSet::new();
        for name in &names {
            let claimed = set.claim(name).unwrap();
            prop_assert!(seen.insert(claimed));
        }
        prop_assert_eq!(set.len(), names.len());
    }

    /// A free name is returned unchanged.
    #[test]
    fn prop_first_claim_is_identity(name in "[a-zA-Z0-9_]{1,12}(\\.[a-z]{1,4})?") {
        let mut set = utf8_names(false);
        prop_assert_eq!(set.claim(&name).unwrap(), name);
    }

    /// The suffix keeps the extension and the directory part.
    #[test]
    fn prop_suffix_keeps_extension(
        dir in "([a-z]{1,5}/){0,3}",
        stem in "[a-z]{1,8}",
        ext in "[a-z]{1,4}",
        n in 1usize..1000
    ) {
        let name = format!("{dir}{stem}.{ext}");
        let renamed = suffixed_name(&name, n);
        prop_assert_eq!(renamed, format!("{dir}{stem}_({n}).{ext}"));
    }

    /// `*` matches every name and a literal mask matches only itself,
    /// ignoring case.
    #[test]
    fn prop_mask_literal_and_star(name in "[a-zA-Z0-9_.-]{1,20}") {
        prop_assert!(FileMask::new("*").matches(&name));
        prop_assert!(FileMask::new(&name.to_uppercase()).matches(&name));
        let other = format!("{name}x");
        prop_assert!(!FileMask::new(&name).matches(&other));
    }

    /// `?` consumes exactly one character.
    #[test]
    fn prop_mask_question_marks(name in "[a-z]{1,10}") {
        let exact = "?".repeat(name.chars().count());
        prop_assert!(FileMask::new(&exact).matches(&name));
        let longer = format!("{exact}?");
        prop_assert!(!FileMask::new(&longer).matches(&name));
    }

    /// Every in-memory entry reads back with its content.
    #[test]
    fn prop_in_memory_contents_survive(
        contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 0..8),
        level in 0u8..=9
    ) {
        let files = contents
            .iter()
            .enumerate()
            .map(|(i, content)| MemoryFile::new(format!("f{i}.bin"), content.clone()));
        let options = MemoryOptions::default().with_compression_level(level);
        let output = create_archive_in_memory(&MemorySource::new(files), &options).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(output.result_bytes)).unwrap();
        prop_assert_eq!(archive.len(), contents.len());
        for (i, expected) in contents.iter().enumerate() {
            let mut data = Vec::new();
            archive.by_name(&format!("f{i}.bin")).unwrap().read_to_end(&mut data).unwrap();
            prop_assert_eq!(&data, expected);
        }
    }
}
