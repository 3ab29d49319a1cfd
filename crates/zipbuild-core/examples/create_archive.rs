//! Example: Creating archives with zipbuild-core
//!
//! Run with: `cargo run --example create_archive`

use zipbuild_core::DestinationSpec;
use zipbuild_core::FileExistAction;
use zipbuild_core::MemoryFile;
use zipbuild_core::MemoryOptions;
use zipbuild_core::MemorySource;
use zipbuild_core::Options;
use zipbuild_core::SourceSpec;
use zipbuild_core::create_archive;
use zipbuild_core::create_archive_in_memory;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let workdir = std::env::temp_dir().join("zipbuild-example");
    let input = workdir.join("in");
    std::fs::create_dir_all(&input)?;
    std::fs::write(input.join("hello.txt"), "Hello, zipbuild!")?;
    std::fs::write(input.join("data.csv"), "a,b\n1,2\n")?;

    // Example 1: directory and mask
    println!("Example 1: Directory and mask");
    let source = SourceSpec::path_and_mask(&input, "*.*");
    let destination = DestinationSpec::new(workdir.join("out"), "example.zip");
    let options = Options::new()
        .with_create_destination_folder(true)
        .with_on_destination_exists(FileExistAction::Rename);
    let output = create_archive(&source, &destination, &options)?;
    println!("  Wrote {} files to {}", output.file_count, output.path.display());

    // Example 2: encrypted, appended to the same archive
    println!("\nExample 2: Append with encryption");
    let destination = DestinationSpec::new(workdir.join("out"), "example.zip").with_password("secret");
    let options = options.with_on_destination_exists(FileExistAction::Append);
    let output = create_archive(&source, &destination, &options)?;
    println!("  Added {:?}", output.archived_files);

    // Example 3: in memory
    println!("\nExample 3: In memory");
    let source = MemorySource::new([MemoryFile::new("note.txt", "kept in memory")]);
    let output = create_archive_in_memory(&source, &MemoryOptions::default())?;
    println!("  Archive is {} bytes", output.result_bytes.len());

    std::fs::remove_dir_all(&workdir)?;
    println!("\nExamples completed successfully!");
    Ok(())
}
