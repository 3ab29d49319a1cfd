//! ZIP container format.
//!
//! [`ArchiveWriter`] produces archives entry by entry; [`ExistingArchive`]
//! reads the central directory of an archive that is being appended to.
//! Entry names and the comment are written in the bytes of the selected
//! [`NameCodec`](crate::NameCodec).

mod crypto;
mod format;
pub mod reader;
pub mod writer;
mod zip64;

pub use reader::ExistingArchive;
pub use writer::ArchiveWriter;
pub use writer::EntryMeta;
pub use writer::WriterSettings;

pub(crate) use zip64::Zip64Limits;
