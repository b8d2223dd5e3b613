//! Queue error types

use std::time::Duration;

use thiserror::Error;

use crate::application::ports::EngineError;
use crate::domain::job::{InvalidStateTransition, JobId};

/// Typed failure recorded on a queue item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Task timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Worker failure: {0}")]
    System(String),

    #[error("Failed to read input: {0}")]
    Read(String),
}

impl JobError {
    /// Transient failures are retried up to the item's retry limit
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_retryable(),
            Self::Timeout(_) | Self::System(_) => true,
            Self::Read(_) => false,
        }
    }
}

/// Errors from queue management calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),

    #[error("Job {id} has used all {max_retries} retries")]
    RetryLimitReached { id: JobId, max_retries: u32 },
}
