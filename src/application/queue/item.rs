//! Queue item entity

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::job::{
    InvalidStateTransition, JobId, JobPayload, JobResult, JobStatus, ProcessingProgress,
};

use super::{JobError, QueueError};

/// Called with every progress tick of a job
pub type JobProgressCallback = Arc<dyn Fn(&ProcessingProgress) + Send + Sync>;

/// Called once when a job completes
pub type JobCompleteCallback = Arc<dyn Fn(JobId, &JobResult) + Send + Sync>;

/// Called when a job fails terminally
pub type JobErrorCallback = Arc<dyn Fn(JobId, &JobError) + Send + Sync>;

/// Optional per-job callbacks, invoked outside the queue lock
#[derive(Clone, Default)]
pub struct JobCallbacks {
    pub on_progress: Option<JobProgressCallback>,
    pub on_complete: Option<JobCompleteCallback>,
    pub on_error: Option<JobErrorCallback>,
}

impl fmt::Debug for JobCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Options for `QueueManager::add_to_queue`
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Higher runs sooner
    pub priority: i32,
    /// Overrides the queue's default retry limit
    pub max_retries: Option<u32>,
    pub callbacks: JobCallbacks,
}

impl AddOptions {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }
}

/// A unit of work owned by the queue
#[derive(Debug, Clone)]
pub struct QueueItem {
    id: JobId,
    payload: JobPayload,
    priority: i32,
    created_at: DateTime<Utc>,
    retry_count: u32,
    max_retries: u32,
    status: JobStatus,
    result: Option<JobResult>,
    error: Option<JobError>,
    progress: Option<f64>,
    pub(crate) callbacks: JobCallbacks,
    pub(crate) token: CancellationToken,
}

impl QueueItem {
    pub(crate) fn new(payload: JobPayload, priority: i32, max_retries: u32, callbacks: JobCallbacks) -> Self {
        Self {
            id: JobId::new(),
            payload,
            priority,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries,
            status: JobStatus::Pending,
            result: None,
            error: None,
            progress: None,
            callbacks,
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    /// Last reported progress percent
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    pub(crate) fn set_progress(&mut self, percent: f64) {
        self.progress = Some(percent);
    }

    /// PENDING -> PROCESSING
    pub(crate) fn start(&mut self) -> Result<(), InvalidStateTransition> {
        if self.status != JobStatus::Pending {
            return Err(InvalidStateTransition::new(self.status, "dispatch"));
        }
        self.status = JobStatus::Processing;
        self.progress = Some(0.0);
        Ok(())
    }

    /// PROCESSING -> COMPLETED
    pub(crate) fn complete(&mut self, result: JobResult) -> Result<(), InvalidStateTransition> {
        if self.status != JobStatus::Processing {
            return Err(InvalidStateTransition::new(self.status, "complete"));
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.progress = Some(100.0);
        Ok(())
    }

    /// PROCESSING -> PENDING (awaiting retry) or FAILED.
    ///
    /// Returns true when a retry should be scheduled. The item stays out of
    /// the pending order until `requeue` runs.
    pub(crate) fn fail(&mut self, error: JobError) -> Result<bool, InvalidStateTransition> {
        if self.status != JobStatus::Processing {
            return Err(InvalidStateTransition::new(self.status, "fail"));
        }
        let will_retry = error.is_retryable() && self.retry_count < self.max_retries;
        self.status = if will_retry {
            JobStatus::Pending
        } else {
            JobStatus::Failed
        };
        self.error = Some(error);
        Ok(will_retry)
    }

    /// Manual retry of a failed item: FAILED -> PENDING
    pub(crate) fn retry(&mut self) -> Result<(), QueueError> {
        if self.status != JobStatus::Failed {
            return Err(InvalidStateTransition::new(self.status, "retry").into());
        }
        if self.retry_count >= self.max_retries {
            return Err(QueueError::RetryLimitReached {
                id: self.id,
                max_retries: self.max_retries,
            });
        }
        self.status = JobStatus::Pending;
        self.requeue();
        Ok(())
    }

    /// Bump for another attempt; retries jump ahead of fresh work at the
    /// same priority.
    pub(crate) fn requeue(&mut self) {
        self.retry_count += 1;
        self.priority = self.priority.saturating_add(1);
        self.error = None;
        self.progress = None;
    }

    /// PENDING | PROCESSING -> CANCELLED
    pub(crate) fn cancel(&mut self) -> Result<(), InvalidStateTransition> {
        if self.status.is_terminal() {
            return Err(InvalidStateTransition::new(self.status, "cancel"));
        }
        self.status = JobStatus::Cancelled;
        self.token.cancel();
        Ok(())
    }
}
