//! Audio file descriptor

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::AudioFormat;

/// A validated input file, ready to be turned into a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    name: String,
    path: PathBuf,
    size: u64,
    format: AudioFormat,
}

impl AudioFile {
    /// Create a descriptor; the display name is derived from the path
    pub fn new(path: impl Into<PathBuf>, size: u64, format: AudioFormat) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            path,
            size,
            format,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes at validation time
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// File name without extension, used for output naming
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size;
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }
}
