//! Job payload

use serde::{Deserialize, Serialize};

use crate::domain::audio::AudioFile;

use super::JobSettings;

/// What a job transcribes and how. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub file: AudioFile,
    pub settings: JobSettings,
}

impl JobPayload {
    pub fn new(file: AudioFile, settings: JobSettings) -> Self {
        Self { file, settings }
    }
}
