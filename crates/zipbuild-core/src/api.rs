//! High-level public API for archive construction.
//!
//! Both variants run the same steps: validate the parameters, pick the name
//! codec, select the sources, plan every entry name, stream the entries and
//! commit. The filesystem variant additionally resolves, locks and stages
//! the destination, and deletes the sources once the archive is committed.

use crate::CancelFlag;
use crate::Result;
use crate::ZipBuildError;
use crate::config::DestinationSpec;
use crate::config::MemoryOptions;
use crate::config::MemorySource;
use crate::config::Options;
use crate::config::SourceFilesType;
use crate::config::SourceSpec;
use crate::destination::DestinationLock;
use crate::destination::OpenMode;
use crate::destination::StagedArchive;
use crate::destination::prepare_directory;
use crate::naming::EntryNames;
use crate::report::MemoryOutput;
use crate::report::Output;
use crate::report::RemovalFailure;
use crate::sources::SourceFile;
use crate::sources::resolve_sources;
use crate::zip::ArchiveWriter;
use crate::zip::EntryMeta;
use crate::zip::WriterSettings;
use crate::zip::Zip64Limits;
use chrono::DateTime;
use chrono::Local;
use std::fs::File;
use std::io::Cursor;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Stages of one invocation, emitted as `tracing` events.
#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    ResolvingSources,
    ResolvingDestination,
    WritingEntries,
    Committing,
    Succeeded,
    Failed,
    DeletingSources,
    Done,
}

fn enter(state: State) {
    debug!(?state, "archive state");
}

/// Builds a ZIP archive from files on disk.
///
/// The archive is written to a temporary file next to the destination and
/// moved into place only after every entry and the central directory have
/// been written. On any error the destination is left as it was.
///
/// # Arguments
///
/// * `source` - Which files to archive
/// * `destination` - Where the archive goes, with password and duplicate
///   handling
/// * `options` - ZIP64 policy, exist-action, encoding and other switches
///
/// # Errors
///
/// Returns an error if:
/// - The parameters are invalid or name an unknown encoding
/// - No file matched and `throw_if_no_files_found` is set
/// - Two entries collide and duplicate renaming is disabled
/// - The destination exists, is locked or its directory is missing
/// - An existing archive to append to cannot be read
/// - A classic ZIP limit is reached under `UseZip64Option::Never`
/// - I/O operations fail
///
/// # Examples
///
/// ```no_run
/// use zipbuild_core::DestinationSpec;
/// use zipbuild_core::FileExistAction;
/// use zipbuild_core::Options;
/// use zipbuild_core::SourceSpec;
/// use zipbuild_core::create_archive;
///
/// let source = SourceSpec::path_and_mask("/data/outbox", "*.xml").with_include_subfolders(true);
/// let destination = DestinationSpec::new("/data/archive", "outbox.zip");
/// let options = Options::new().with_on_destination_exists(FileExistAction::Rename);
///
/// let output = create_archive(&source, &destination, &options)?;
/// println!("{} entries written to {}", output.file_count, output.path.display());
/// # Ok::<(), zipbuild_core::ZipBuildError>(())
/// ```
pub fn create_archive(
    source: &SourceSpec,
    destination: &DestinationSpec,
    options: &Options,
) -> Result<Output> {
    create_archive_with_cancel(source, destination, options, &CancelFlag::new())
}

/// Same as [`create_archive`], stopping with `Cancelled` once `cancel` is
/// set.
///
/// # Errors
///
/// Same as [`create_archive`], plus `Cancelled`.
pub fn create_archive_with_cancel(
    source: &SourceSpec,
    destination: &DestinationSpec,
    options: &Options,
    cancel: &CancelFlag,
) -> Result<Output> {
    build_archive(source, destination, options, cancel, Zip64Limits::default())
}

/// Builds a ZIP archive from in-memory files and returns its bytes.
///
/// An empty source produces a valid archive without entries.
///
/// # Errors
///
/// Returns an error if:
/// - The options are invalid or name an unknown encoding
/// - Two entries collide and duplicate renaming is disabled
/// - A classic ZIP limit is reached under `UseZip64Option::Never`
///
/// # Examples
///
/// ```
/// use zipbuild_core::MemoryFile;
/// use zipbuild_core::MemoryOptions;
/// use zipbuild_core::MemorySource;
/// use zipbuild_core::create_archive_in_memory;
///
/// let source = MemorySource::new([
///     MemoryFile::new("a.txt", "first"),
///     MemoryFile::new("a.txt", "second"),
/// ]);
/// let output = create_archive_in_memory(&source, &MemoryOptions::default())?;
/// assert_eq!(&output.result_bytes[..2], b"PK");
/// # Ok::<(), zipbuild_core::ZipBuildError>(())
/// ```
pub fn create_archive_in_memory(
    source: &MemorySource,
    options: &MemoryOptions,
) -> Result<MemoryOutput> {
    create_archive_in_memory_with_cancel(source, options, &CancelFlag::new())
}

/// Same as [`create_archive_in_memory`], stopping with `Cancelled` once
/// `cancel` is set.
///
/// # Errors
///
/// Same as [`create_archive_in_memory`], plus `Cancelled`.
pub fn create_archive_in_memory_with_cancel(
    source: &MemorySource,
    options: &MemoryOptions,
    cancel: &CancelFlag,
) -> Result<MemoryOutput> {
    build_in_memory(source, options, cancel, Zip64Limits::default())
}

pub(crate) fn build_archive(
    source: &SourceSpec,
    destination: &DestinationSpec,
    options: &Options,
    cancel: &CancelFlag,
    limits: Zip64Limits,
) -> Result<Output> {
    enter(State::Idle);
    let result = run_filesystem(source, destination, options, cancel, limits, open_entry);
    if let Err(e) = &result {
        enter(State::Failed);
        warn!(
            destination = %destination.target_path().display(),
            error = %e,
            "archive not created"
        );
    }
    result
}

/// Runs one filesystem invocation. `open` supplies the metadata and payload
/// of each planned entry.
fn run_filesystem<R, F>(
    source: &SourceSpec,
    destination: &DestinationSpec,
    options: &Options,
    cancel: &CancelFlag,
    limits: Zip64Limits,
    mut open: F,
) -> Result<Output>
where
    R: Read,
    F: FnMut(&SourceFile, &str) -> Result<(EntryMeta, R)>,
{
    destination.validate()?;
    options.validate()?;
    let codec = options.encoding.codec()?;
    cancel.check()?;

    enter(State::ResolvingSources);
    let files = resolve_sources(source)?;
    if files.is_empty() {
        return empty_selection(source, destination, options);
    }

    enter(State::ResolvingDestination);
    let directory = prepare_directory(destination, options)?;
    let requested = directory.join(&destination.file_name);
    let lock = DestinationLock::acquire(&requested)?;
    let resolved = options
        .on_destination_exists
        .resolve(&directory, &destination.file_name)?;

    // The archive being written and its lock are never sources.
    let files = without_destination(
        files,
        &[requested.as_path(), resolved.path.as_path(), lock.path()],
    );
    if files.is_empty() {
        drop(lock);
        return empty_selection(source, destination, options);
    }

    let (mut staged, existing) = match resolved.mode {
        OpenMode::Append => {
            let (staged, existing) = StagedArchive::append(&resolved)?;
            (staged, Some(existing))
        }
        OpenMode::Create | OpenMode::Replace => (StagedArchive::create(&resolved)?, None),
    };

    // Every name is settled before the first byte is written.
    let mut names = EntryNames::new(codec, destination.rename_duplicate_files);
    if let Some(existing) = &existing {
        names.seed(existing.raw_names().map(<[u8]>::to_vec));
    }
    let planned = plan_entries(files, &mut names)?;

    enter(State::WritingEntries);
    let settings = WriterSettings {
        policy: options.use_zip64,
        codec,
        compression_level: options.compression_level,
        password: destination.password().cloned(),
        comment: options.comment.clone(),
    };
    let sink = staged.writer();
    let mut writer = match existing {
        Some(existing) => ArchiveWriter::resume(sink, existing, settings)?,
        None => ArchiveWriter::new(sink, settings)?,
    }
    .with_limits(limits);

    for (file, name) in &planned {
        cancel.check()?;
        let (entry, payload) = open(file, name)?;
        writer.add_entry(&entry, payload)?;
    }
    cancel.check()?;

    enter(State::Committing);
    writer
        .finish()?
        .into_inner()
        .map_err(|e| ZipBuildError::Io(e.into_error()))?;
    let path = staged.commit()?;
    drop(lock);

    enter(State::Succeeded);
    info!(
        path = %path.display(),
        entries = planned.len(),
        mode = ?resolved.mode,
        "archive created"
    );

    let archived = planned.iter().map(|(_, name)| name.clone()).collect();
    let mut output = Output::new(path, archived);
    if source.remove_zipped_files {
        enter(State::DeletingSources);
        output.removal_failures = remove_sources(planned.iter().map(|(file, _)| file.path.as_path()));
    }
    enter(State::Done);
    Ok(output)
}

/// Drops sources that resolve to one of `targets`.
fn without_destination(files: Vec<SourceFile>, targets: &[&Path]) -> Vec<SourceFile> {
    let targets: Vec<PathBuf> = targets
        .iter()
        .filter_map(|target| std::fs::canonicalize(target).ok())
        .collect();
    if targets.is_empty() {
        return files;
    }
    files
        .into_iter()
        .filter(|file| {
            let is_target = std::fs::canonicalize(&file.path).is_ok_and(|path| targets.contains(&path));
            if is_target {
                warn!(path = %file.path.display(), "destination file skipped as a source");
            }
            !is_target
        })
        .collect()
}

fn empty_selection(
    source: &SourceSpec,
    destination: &DestinationSpec,
    options: &Options,
) -> Result<Output> {
    if options.throw_if_no_files_found {
        return Err(match source.source_type {
            SourceFilesType::PathAndFileMask => ZipBuildError::SourceNotFound {
                directory: source.directory.clone(),
                mask: source.file_mask.clone(),
            },
            SourceFilesType::FileList => ZipBuildError::EmptyFileList,
        });
    }
    info!(
        destination = %destination.target_path().display(),
        "no source files selected, nothing written"
    );
    enter(State::Done);
    Ok(Output::new(destination.target_path(), Vec::new()))
}

fn plan_entries(files: Vec<SourceFile>, names: &mut EntryNames) -> Result<Vec<(SourceFile, String)>> {
    files
        .into_iter()
        .map(|file| {
            let name = names.claim(&file.entry_name)?;
            if name != file.entry_name {
                debug!(requested = %file.entry_name, entry = %name, "entry renamed");
            }
            Ok((file, name))
        })
        .collect()
}

fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ZipBuildError::MissingSourceFile {
            path: path.to_path_buf(),
        },
        _ => ZipBuildError::Io(e),
    })
}

fn open_entry(file: &SourceFile, name: &str) -> Result<(EntryMeta, File)> {
    let handle = open_source(&file.path)?;
    let entry = file_entry(name, &handle)?;
    Ok((entry, handle))
}

fn file_entry(name: &str, file: &File) -> Result<EntryMeta> {
    let metadata = file.metadata()?;
    let mut entry = EntryMeta::new(name, metadata.len());
    if let Ok(modified) = metadata.modified() {
        entry = entry.with_modified(DateTime::<Local>::from(modified).naive_local());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        entry = entry.with_unix_mode(metadata.permissions().mode());
    }
    Ok(entry)
}

fn remove_sources<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<RemovalFailure> {
    paths
        .filter_map(|path| match std::fs::remove_file(path) {
            Ok(()) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "source file not removed");
                Some(RemovalFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        })
        .collect()
}

pub(crate) fn build_in_memory(
    source: &MemorySource,
    options: &MemoryOptions,
    cancel: &CancelFlag,
    limits: Zip64Limits,
) -> Result<MemoryOutput> {
    enter(State::Idle);
    let result = run_in_memory(source, options, cancel, limits);
    if let Err(e) = &result {
        enter(State::Failed);
        warn!(error = %e, "in-memory archive not created");
    }
    result
}

fn run_in_memory(
    source: &MemorySource,
    options: &MemoryOptions,
    cancel: &CancelFlag,
    limits: Zip64Limits,
) -> Result<MemoryOutput> {
    options.validate()?;
    let codec = options.encoding.codec()?;
    cancel.check()?;

    enter(State::ResolvingSources);
    let mut names = EntryNames::new(codec, options.rename_duplicate_files);
    let planned = source
        .source_files
        .iter()
        .map(|file| Ok((names.claim(&file.name)?, file.content.as_slice())))
        .collect::<Result<Vec<_>>>()?;

    enter(State::WritingEntries);
    let settings = WriterSettings {
        policy: options.use_zip64,
        codec,
        compression_level: options.compression_level,
        password: options.password().cloned(),
        comment: options.comment.clone(),
    };
    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), settings)?.with_limits(limits);
    for (name, content) in &planned {
        cancel.check()?;
        writer.add_entry(&EntryMeta::new(name.as_str(), content.len() as u64), *content)?;
    }
    cancel.check()?;

    enter(State::Committing);
    let result_bytes = writer.finish()?.into_inner();
    enter(State::Succeeded);
    info!(entries = planned.len(), bytes = result_bytes.len(), "in-memory archive created");
    enter(State::Done);
    Ok(MemoryOutput { result_bytes })
}
