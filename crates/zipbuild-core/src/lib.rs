//! Atomic ZIP archive construction for automation pipelines.
//!
//! `zipbuild-core` packs files selected by a directory and mask, or by an
//! explicit list, into a ZIP archive. The archive is staged next to its
//! destination and committed with a single rename, so readers never see a
//! partial file. It supports ZIP64 policies, AES-256 encryption, appending
//! to existing archives and an in-memory variant.
//!
//! # Examples
//!
//! ```no_run
//! use zipbuild_core::DestinationSpec;
//! use zipbuild_core::Options;
//! use zipbuild_core::SourceSpec;
//! use zipbuild_core::create_archive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SourceSpec::path_and_mask("/data/in", "*.csv");
//! let destination = DestinationSpec::new("/data/out", "batch.zip").with_password("secret");
//! let output = create_archive(&source, &destination, &Options::default())?;
//! println!("Archived {} files", output.file_count);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cancel;
pub mod config;
pub mod destination;
pub mod encoding;
pub mod error;
pub mod io;
pub mod naming;
pub mod report;
pub mod sources;
pub mod zip;

// Re-export main API types
pub use api::create_archive;
pub use api::create_archive_in_memory;
pub use api::create_archive_in_memory_with_cancel;
pub use api::create_archive_with_cancel;
pub use cancel::CancelFlag;
pub use config::DestinationSpec;
pub use config::FileExistAction;
pub use config::MemoryFile;
pub use config::MemoryOptions;
pub use config::MemorySource;
pub use config::Options;
pub use config::Password;
pub use config::SourceFilesType;
pub use config::SourceSpec;
pub use config::UseZip64Option;
pub use encoding::Encoding;
pub use encoding::EncodingOptions;
pub use encoding::NameCodec;
pub use error::Result;
pub use error::Zip64Limit;
pub use error::ZipBuildError;
pub use report::MemoryOutput;
pub use report::Output;
pub use report::RemovalFailure;
