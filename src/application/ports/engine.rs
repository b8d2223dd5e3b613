//! Transcription engine port interface

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audio::{AudioFile, AudioFormat};
use crate::domain::job::{JobSettings, ProcessingStage, Transcript};

/// Engine failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Transcription engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Transcription engine timed out")]
    Timeout,

    #[error("Transcription engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the queue should schedule another attempt.
    /// Only a format rejection is final; the same input will never succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnsupportedFormat(_))
    }
}

/// What the engine is asked to transcribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// A whole file, read by the engine itself
    File(AudioFile),
    /// One slice of a large file, streamed by the executor
    Chunk {
        data: Vec<u8>,
        format: AudioFormat,
        index: usize,
        total: usize,
    },
}

impl AudioInput {
    pub fn format(&self) -> AudioFormat {
        match self {
            Self::File(file) => file.format(),
            Self::Chunk { format, .. } => *format,
        }
    }

    /// Path on disk, for whole-file inputs
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(file) => Some(file.path()),
            Self::Chunk { .. } => None,
        }
    }
}

/// Advisory progress extracted from engine output
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineProgress {
    pub stage: ProcessingStage,
    pub percent: Option<f64>,
    pub elapsed: Option<Duration>,
    pub remaining: Option<Duration>,
    pub message: Option<String>,
}

/// Sink for engine progress ticks
pub type ProgressSink = Arc<dyn Fn(EngineProgress) + Send + Sync>;

/// Port for the opaque speech-to-text engine
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Transcribe one input.
    ///
    /// # Arguments
    /// * `input` - The file or chunk to transcribe
    /// * `settings` - Per-job language and model selection
    /// * `on_progress` - Optional sink for advisory progress
    async fn transcribe(
        &self,
        input: &AudioInput,
        settings: &JobSettings,
        on_progress: Option<ProgressSink>,
    ) -> Result<Transcript, EngineError>;
}
