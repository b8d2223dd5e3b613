//! Processing progress value objects

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Coarse stage an engine reports itself to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    #[default]
    Initializing,
    LoadingModel,
    Preprocessing,
    Transcribing,
    Postprocessing,
    Finalizing,
    Saving,
}

impl ProcessingStage {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::LoadingModel => "Loading Model",
            Self::Preprocessing => "Preprocessing",
            Self::Transcribing => "Transcribing",
            Self::Postprocessing => "Postprocessing",
            Self::Finalizing => "Finalizing",
            Self::Saving => "Saving",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Advisory progress tick for a single job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingProgress {
    pub job_id: JobId,
    pub stage: ProcessingStage,
    /// Percent complete, clamped to 0..=100
    pub progress: f64,
    pub current_file: Option<String>,
    pub message: Option<String>,
    pub elapsed: Option<Duration>,
    pub remaining: Option<Duration>,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingProgress {
    pub fn new(job_id: JobId, stage: ProcessingStage, progress: f64) -> Self {
        Self {
            job_id,
            stage,
            progress: progress.clamp(0.0, 100.0),
            current_file: None,
            message: None,
            elapsed: None,
            remaining: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.current_file = Some(name.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
