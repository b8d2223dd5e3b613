//! Application layer - Use cases and port interfaces
//!
//! Contains the core business operations and trait definitions
//! for external system interactions.

pub mod batch;
pub mod chunk;
pub mod ports;
pub mod queue;
pub mod validation;
pub mod worker;

// Re-export use cases
pub use batch::{BatchCallbacks, BatchError, BatchOptions, BatchWorkflow};
pub use chunk::{Chunk, ChunkConfig, ChunkError, ChunkProgressCallback, ChunkReader, ChunkStream};
pub use queue::{
    AddOptions, JobCallbacks, JobError, QueueConfig, QueueError, QueueEvent, QueueItem,
    QueueManager, QueueStats,
};
pub use validation::{
    discover_audio_files, expand_inputs, validate_batch, validate_file, BatchValidation,
    InvalidFile, ValidationRules,
};
pub use worker::{Assignment, PoolConfig, TaskExecutor, WorkerPool};
