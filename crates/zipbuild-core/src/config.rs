//! Invocation parameters for archive construction.
//!
//! Every type here is built per invocation by the host and deserializes from
//! camelCase JSON, so a pipeline can pass its parameter objects through
//! unchanged.

use crate::Result;
use crate::ZipBuildError;
use crate::encoding::EncodingOptions;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

/// Default deflate level, balanced between speed and size.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// How source files are selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFilesType {
    /// Enumerate a directory with a wildcard mask.
    #[default]
    PathAndFileMask,
    /// Use an explicit list of file paths.
    FileList,
}

/// What to do when the destination archive already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileExistAction {
    /// Fail the invocation.
    #[default]
    Error,
    /// Add the new entries to the existing archive.
    Append,
    /// Replace the existing archive.
    Overwrite,
    /// Write to the first free `name_(n).zip` next to it.
    Rename,
}

/// When to use the ZIP64 extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UseZip64Option {
    /// Extended fields on every record, even for tiny archives.
    Always,
    /// Extended fields only once a classic limit is reached.
    #[default]
    AsNecessary,
    /// Classic fields only; reaching a limit is an error.
    Never,
}

/// A password for entry encryption.
///
/// The value never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Wraps a password string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the password text.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Selection of the files to archive.
///
/// Only the fields belonging to `source_type` are consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceSpec {
    /// Selection mode.
    pub source_type: SourceFilesType,

    /// Directory to enumerate (`PathAndFileMask`).
    pub directory: PathBuf,

    /// Wildcard mask with `*` and `?`, matched case-insensitively against
    /// file names (`PathAndFileMask`).
    ///
    /// Default: `"*"`.
    pub file_mask: String,

    /// Recurse into subdirectories (`PathAndFileMask`).
    pub include_subfolders: bool,

    /// Store every file under its bare name (`PathAndFileMask`).
    pub flatten_folders: bool,

    /// Files to archive, in order (`FileList`).
    pub file_paths: Vec<PathBuf>,

    /// Delete the archived source files after a successful commit.
    pub remove_zipped_files: bool,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            source_type: SourceFilesType::PathAndFileMask,
            directory: PathBuf::new(),
            file_mask: "*".to_string(),
            include_subfolders: false,
            flatten_folders: false,
            file_paths: Vec::new(),
            remove_zipped_files: false,
        }
    }
}

impl SourceSpec {
    /// Selects the files under `directory` matching `mask`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zipbuild_core::SourceSpec;
    ///
    /// let spec = SourceSpec::path_and_mask("/data/in", "*.csv").with_include_subfolders(true);
    /// assert_eq!(spec.file_mask, "*.csv");
    /// ```
    pub fn path_and_mask(directory: impl Into<PathBuf>, mask: impl Into<String>) -> Self {
        Self {
            source_type: SourceFilesType::PathAndFileMask,
            directory: directory.into(),
            file_mask: mask.into(),
            ..Self::default()
        }
    }

    /// Selects an explicit list of files.
    pub fn file_list<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            source_type: SourceFilesType::FileList,
            file_paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets whether subdirectories are enumerated.
    #[must_use]
    pub fn with_include_subfolders(mut self, include: bool) -> Self {
        self.include_subfolders = include;
        self
    }

    /// Sets whether entries lose their directory part.
    #[must_use]
    pub fn with_flatten_folders(mut self, flatten: bool) -> Self {
        self.flatten_folders = flatten;
        self
    }

    /// Sets whether sources are deleted after the archive is committed.
    #[must_use]
    pub fn with_remove_zipped_files(mut self, remove: bool) -> Self {
        self.remove_zipped_files = remove;
        self
    }
}

/// Where the archive goes and how its entries are protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DestinationSpec {
    /// Directory that receives the archive.
    pub directory: PathBuf,

    /// File name of the archive.
    pub file_name: String,

    /// Password for AES encryption; absent or empty disables encryption.
    pub password: Option<Password>,

    /// Rename colliding entries to `name_(n).ext` instead of failing.
    ///
    /// Default: `true`.
    pub rename_duplicate_files: bool,
}

impl Default for DestinationSpec {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            file_name: String::new(),
            password: None,
            rename_duplicate_files: true,
        }
    }
}

impl DestinationSpec {
    /// Creates a destination spec for `directory/file_name`.
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Sets the encryption password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Password::new(password));
        self
    }

    /// Sets whether duplicate entry names are renamed.
    #[must_use]
    pub fn with_rename_duplicate_files(mut self, rename: bool) -> Self {
        self.rename_duplicate_files = rename;
        self
    }

    /// The requested archive path, before any exist-action is applied.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// The effective password; an empty string counts as none.
    #[must_use]
    pub fn password(&self) -> Option<&Password> {
        effective_password(self.password.as_ref())
    }

    /// Validates the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name is empty or contains a path
    /// separator.
    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(ZipBuildError::InvalidConfiguration {
                reason: "destination file name is empty".to_string(),
            });
        }
        if self.file_name.contains(['/', '\\']) {
            return Err(ZipBuildError::InvalidConfiguration {
                reason: format!(
                    "destination file name must not contain a path: {}",
                    self.file_name
                ),
            });
        }
        Ok(())
    }
}

/// Behavior switches for the filesystem variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// ZIP64 policy. Default: `AsNecessary`.
    pub use_zip64: UseZip64Option,

    /// Fail when the source selection is empty. Default: `true`.
    pub throw_if_no_files_found: bool,

    /// Exist-action for the destination. Default: `Error`.
    pub on_destination_exists: FileExistAction,

    /// Create the destination directory when missing. Default: `false`.
    pub create_destination_folder: bool,

    /// Deflate level, 0 stores entries uncompressed. Default: `6`.
    pub compression_level: u8,

    /// Text encoding of entry names and the archive comment.
    #[serde(flatten)]
    pub encoding: EncodingOptions,

    /// Archive comment.
    pub comment: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            use_zip64: UseZip64Option::AsNecessary,
            throw_if_no_files_found: true,
            on_destination_exists: FileExistAction::Error,
            create_destination_folder: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            encoding: EncodingOptions::default(),
            comment: None,
        }
    }
}

impl Options {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ZIP64 policy.
    #[must_use]
    pub fn with_use_zip64(mut self, policy: UseZip64Option) -> Self {
        self.use_zip64 = policy;
        self
    }

    /// Sets whether an empty selection fails.
    #[must_use]
    pub fn with_throw_if_no_files_found(mut self, throw: bool) -> Self {
        self.throw_if_no_files_found = throw;
        self
    }

    /// Sets the exist-action.
    #[must_use]
    pub fn with_on_destination_exists(mut self, action: FileExistAction) -> Self {
        self.on_destination_exists = action;
        self
    }

    /// Sets whether a missing destination directory is created.
    #[must_use]
    pub fn with_create_destination_folder(mut self, create: bool) -> Self {
        self.create_destination_folder = create;
        self
    }

    /// Sets the compression level (0-9).
    #[must_use]
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the name encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingOptions) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the archive comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the compression level is above 9.
    pub fn validate(&self) -> Result<()> {
        validate_compression_level(self.compression_level)
    }
}

/// One in-memory file to archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFile {
    /// Entry name.
    pub name: String,
    /// File content.
    pub content: Vec<u8>,
}

impl MemoryFile {
    /// Creates an in-memory file.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Ordered in-memory files to archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorySource {
    /// Files in entry order.
    pub source_files: Vec<MemoryFile>,
}

impl MemorySource {
    /// Creates a source from files.
    pub fn new(files: impl IntoIterator<Item = MemoryFile>) -> Self {
        Self {
            source_files: files.into_iter().collect(),
        }
    }
}

/// Behavior switches for the in-memory variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryOptions {
    /// ZIP64 policy. Default: `AsNecessary`.
    pub use_zip64: UseZip64Option,

    /// Password for AES encryption; absent or empty disables encryption.
    pub password: Option<Password>,

    /// Rename colliding entries instead of failing. Default: `true`.
    pub rename_duplicate_files: bool,

    /// Text encoding of entry names and the archive comment.
    #[serde(flatten)]
    pub encoding: EncodingOptions,

    /// Deflate level, 0 stores entries uncompressed. Default: `6`.
    pub compression_level: u8,

    /// Archive comment.
    pub comment: Option<String>,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            use_zip64: UseZip64Option::AsNecessary,
            password: None,
            rename_duplicate_files: true,
            encoding: EncodingOptions::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            comment: None,
        }
    }
}

impl MemoryOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ZIP64 policy.
    #[must_use]
    pub fn with_use_zip64(mut self, policy: UseZip64Option) -> Self {
        self.use_zip64 = policy;
        self
    }

    /// Sets the encryption password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Password::new(password));
        self
    }

    /// Sets whether duplicate entry names are renamed.
    #[must_use]
    pub fn with_rename_duplicate_files(mut self, rename: bool) -> Self {
        self.rename_duplicate_files = rename;
        self
    }

    /// Sets the name encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingOptions) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the compression level (0-9).
    #[must_use]
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// The effective password; an empty string counts as none.
    #[must_use]
    pub fn password(&self) -> Option<&Password> {
        effective_password(self.password.as_ref())
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error if the compression level is above 9.
    pub fn validate(&self) -> Result<()> {
        validate_compression_level(self.compression_level)
    }
}

fn effective_password(password: Option<&Password>) -> Option<&Password> {
    password.filter(|p| !p.is_empty())
}

fn validate_compression_level(level: u8) -> Result<()> {
    if level > 9 {
        return Err(ZipBuildError::InvalidConfiguration {
            reason: format!("compression level must be 0-9, got {level}"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    #[test]
    fn test_options_default() {
        let options = Options::default();
        assert_eq!(options.use_zip64, UseZip64Option::AsNecessary);
        assert!(options.throw_if_no_files_found);
        assert_eq!(options.on_destination_exists, FileExistAction::Error);
        assert!(!options.create_destination_folder);
        assert_eq!(options.compression_level, 6);
        assert_eq!(options.encoding.encoding, Encoding::Default);
    }

    #[test]
    fn test_destination_defaults_rename_duplicates() {
        let dest = DestinationSpec::default();
        assert!(dest.rename_duplicate_files);
        assert!(dest.password().is_none());
    }

    #[test]
    fn test_empty_password_is_absent() {
        let dest = DestinationSpec::new("/tmp", "a.zip").with_password("");
        assert!(dest.password.is_some());
        assert!(dest.password().is_none());

        let dest = dest.with_password("secret");
        assert_eq!(dest.password().unwrap().expose(), "secret");
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let dest = DestinationSpec::new("/tmp", "a.zip").with_password("hunter2");
        let debug = format!("{dest:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_destination_validate() {
        assert!(DestinationSpec::new("/tmp", "a.zip").validate().is_ok());

        let err = DestinationSpec::new("/tmp", "  ").validate().unwrap_err();
        assert!(matches!(err, ZipBuildError::InvalidConfiguration { .. }));

        let err = DestinationSpec::new("/tmp", "sub/a.zip").validate().unwrap_err();
        assert!(matches!(err, ZipBuildError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_compression_level_validation() {
        assert!(Options::default().with_compression_level(0).validate().is_ok());
        assert!(Options::default().with_compression_level(9).validate().is_ok());
        let err = Options::default()
            .with_compression_level(10)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("0-9"));
        assert!(
            MemoryOptions::default()
                .with_compression_level(12)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_source_spec_builders() {
        let spec = SourceSpec::path_and_mask("/in", "*.txt")
            .with_include_subfolders(true)
            .with_flatten_folders(true)
            .with_remove_zipped_files(true);
        assert_eq!(spec.source_type, SourceFilesType::PathAndFileMask);
        assert!(spec.include_subfolders && spec.flatten_folders && spec.remove_zipped_files);

        let spec = SourceSpec::file_list(["/a.txt", "/b.txt"]);
        assert_eq!(spec.source_type, SourceFilesType::FileList);
        assert_eq!(spec.file_paths.len(), 2);
        assert_eq!(spec.file_mask, "*");
    }

    #[test]
    fn test_deserialize_host_parameters() {
        let json = r#"{
            "sourceType": "FileList",
            "filePaths": ["/data/a.txt"],
            "removeZippedFiles": true
        }"#;
        let spec: SourceSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.source_type, SourceFilesType::FileList);
        assert!(spec.remove_zipped_files);
        assert_eq!(spec.file_mask, "*");

        let json = r#"{
            "useZip64": "Never",
            "onDestinationExists": "Rename",
            "throwIfNoFilesFound": false,
            "encoding": "Other",
            "encodingName": "windows-1251"
        }"#;
        let options: Options = serde_json::from_str(json).unwrap();
        assert_eq!(options.use_zip64, UseZip64Option::Never);
        assert_eq!(options.on_destination_exists, FileExistAction::Rename);
        assert!(!options.throw_if_no_files_found);
        assert_eq!(options.encoding.encoding, Encoding::Other);
        assert_eq!(options.encoding.encoding_name, "windows-1251");
    }

    #[test]
    fn test_enum_names_are_case_sensitive() {
        assert!(serde_json::from_str::<FileExistAction>(r#""Append""#).is_ok());
        assert!(serde_json::from_str::<FileExistAction>(r#""append""#).is_err());
        assert!(serde_json::from_str::<UseZip64Option>(r#""AsNecessary""#).is_ok());
    }

    #[test]
    fn test_memory_options_deserialize() {
        let json = r#"{
            "password": "pw",
            "renameDuplicateFiles": false,
            "encoding": "UTF8"
        }"#;
        let options: MemoryOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.password().unwrap().expose(), "pw");
        assert!(!options.rename_duplicate_files);
        assert_eq!(options.encoding.encoding, Encoding::Utf8);
        assert_eq!(options.use_zip64, UseZip64Option::AsNecessary);
    }
}
