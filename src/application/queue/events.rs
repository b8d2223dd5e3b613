//! Queue lifecycle events

use crate::domain::job::{JobId, JobResult, ProcessingProgress};

use super::JobError;

/// Event published to every queue subscriber.
///
/// Events for one job arrive in the order they happened; no ordering is
/// implied between different jobs.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Queued { id: JobId, priority: i32 },
    Started { id: JobId, attempt: u32 },
    Progress(ProcessingProgress),
    Completed { id: JobId, result: JobResult },
    Failed {
        id: JobId,
        error: JobError,
        will_retry: bool,
    },
    RetryScheduled {
        id: JobId,
        retry_count: u32,
        priority: i32,
    },
    Cancelled { id: JobId },
}

impl QueueEvent {
    /// The job this event is about
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Queued { id, .. }
            | Self::Started { id, .. }
            | Self::Completed { id, .. }
            | Self::Failed { id, .. }
            | Self::RetryScheduled { id, .. }
            | Self::Cancelled { id } => *id,
            Self::Progress(p) => p.job_id,
        }
    }
}

