//! Up-front input validation
//!
//! Runs synchronously before anything is enqueued so a rejected file never
//! occupies a processing slot.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::audio::{AudioFile, AudioFormat};
use crate::domain::config::AppConfig;
use crate::domain::error::ValidationError;

/// Limits applied to every input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_file_size: u64,
}

impl ValidationRules {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes(),
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::empty())
    }
}

/// Check one path: exists, is a regular file, supported extension, size
pub fn validate_file(path: &Path, rules: &ValidationRules) -> Result<AudioFile, ValidationError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ValidationError::NotFound(path.to_path_buf()),
        _ => ValidationError::Io(e.to_string()),
    })?;
    if !metadata.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or(ValidationError::MissingExtension)?;
    let format: AudioFormat = extension.parse()?;

    let size = metadata.len();
    if size > rules.max_file_size {
        return Err(ValidationError::TooLarge {
            size,
            limit: rules.max_file_size,
        });
    }

    Ok(AudioFile::new(path, size, format))
}

/// A rejected input and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFile {
    pub path: PathBuf,
    pub error: ValidationError,
}

/// Partition of a batch into accepted and rejected files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchValidation {
    pub valid: Vec<AudioFile>,
    pub invalid: Vec<InvalidFile>,
    /// Combined size of the accepted files
    pub total_size: u64,
}

impl BatchValidation {
    pub fn can_proceed(&self) -> bool {
        !self.valid.is_empty()
    }
}

/// Validate every path, keeping input order within each partition
pub fn validate_batch<P: AsRef<Path>>(paths: &[P], rules: &ValidationRules) -> BatchValidation {
    let mut report = BatchValidation::default();
    for path in paths {
        let path = path.as_ref();
        match validate_file(path, rules) {
            Ok(file) => {
                report.total_size += file.size();
                report.valid.push(file);
            }
            Err(error) => report.invalid.push(InvalidFile {
                path: path.to_path_buf(),
                error,
            }),
        }
    }
    report
}

/// Supported audio files under `dir`, sorted by path.
///
/// Only the top level is scanned unless `recursive` is set. Entries that
/// cannot be read are skipped.
pub fn discover_audio_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(true)
        .sort_by_file_name();

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.parse::<AudioFormat>().is_ok());
        if supported {
            found.push(entry.into_path());
        }
    }
    found.sort();
    debug!(dir = %dir.display(), recursive, files = found.len(), "directory scanned");
    found
}

/// Replace every directory in `paths` with the audio files it contains.
/// Other paths pass through untouched so validation can report them.
pub fn expand_inputs<P: AsRef<Path>>(paths: &[P], recursive: bool) -> Vec<PathBuf> {
    let mut expanded = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            expanded.extend(discover_audio_files(path, recursive));
        } else {
            expanded.push(path.to_path_buf());
        }
    }
    expanded
}
