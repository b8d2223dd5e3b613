//! Job domain module
//!
//! Value objects shared by the queue, the worker pool and the batch
//! aggregator. The queue entity itself lives in the application layer.

mod id;
mod payload;
mod progress;
mod settings;
mod status;
mod transcript;

pub use id::JobId;
pub use payload::JobPayload;
pub use progress::{ProcessingProgress, ProcessingStage};
pub use settings::{JobSettings, ModelSize, ALL_MODEL_SIZES, AUTO_LANGUAGE};
pub use status::{InvalidStateTransition, JobStatus};
pub use transcript::{JobResult, Transcript, TranscriptMetadata};
