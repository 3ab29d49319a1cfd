//! I/O adapters used by the archive writer.

pub mod counting;

pub use counting::ChecksumReader;
pub use counting::CountingWriter;
