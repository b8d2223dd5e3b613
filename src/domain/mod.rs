//! Domain layer - Core business logic
//!
//! Contains value objects, entities, and domain errors.
//! This layer has no dependencies on external systems.

pub mod audio;
pub mod batch;
pub mod config;
pub mod error;
pub mod job;
pub mod time;

// Re-export common types
pub use audio::{AudioFile, AudioFormat, SUPPORTED_FORMATS};
pub use batch::{BatchFileStatus, BatchProgress, BatchStatistics, FileStatus};
pub use config::{AppConfig, EngineKind};
pub use error::*;
pub use job::{
    JobId, JobPayload, JobResult, JobSettings, JobStatus, ModelSize, ProcessingProgress,
    ProcessingStage, Transcript, TranscriptMetadata,
};
pub use time::Duration;
