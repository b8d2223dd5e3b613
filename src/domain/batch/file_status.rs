//! Per-file batch status

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::audio::AudioFile;
use crate::domain::job::JobResult;

/// Status of one file inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry per file in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFileStatus {
    pub file: AudioFile,
    pub status: FileStatus,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub progress: Option<f64>,
}

impl BatchFileStatus {
    pub fn pending(file: AudioFile) -> Self {
        Self {
            file,
            status: FileStatus::Pending,
            result: None,
            error: None,
            progress: None,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = FileStatus::Processing;
        self.error = None;
    }

    pub fn mark_completed(&mut self, result: JobResult) {
        self.status = FileStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.progress = Some(100.0);
    }

    pub fn mark_error(&mut self, reason: impl Into<String>) {
        self.status = FileStatus::Error;
        self.error = Some(reason.into());
    }

    /// Back to pending for a retry; keeps nothing from the failed attempt
    pub fn reset(&mut self) {
        self.status = FileStatus::Pending;
        self.result = None;
        self.error = None;
        self.progress = None;
    }
}
