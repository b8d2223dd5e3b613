//! Batch workflow aggregator
//!
//! Validates a group of files, enqueues the valid ones and folds queue
//! events into per-file statuses and batch-level progress.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::batch::{BatchFileStatus, BatchProgress, BatchStatistics, FileStatus};
use crate::domain::job::{JobId, JobPayload, JobSettings};

use super::queue::{AddOptions, QueueEvent, QueueManager};
use super::validation::{validate_batch, BatchValidation, InvalidFile, ValidationRules};

/// Batch workflow errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("No valid files to process ({invalid} rejected)")]
    NoValidFiles { invalid: usize },

    #[error("No active batch")]
    NoActiveBatch,
}

/// Called once, before anything is enqueued, with every rejected file
pub type ValidationErrorCallback = Arc<dyn Fn(&[InvalidFile]) + Send + Sync>;

/// Called whenever the batch snapshot changes
pub type BatchProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Called when one file's status changes
pub type FileStatusCallback = Arc<dyn Fn(&BatchFileStatus) + Send + Sync>;

/// Called once when every file is terminal
pub type BatchCompleteCallback = Arc<dyn Fn(&[BatchFileStatus], &BatchStatistics) + Send + Sync>;

#[derive(Clone, Default)]
pub struct BatchCallbacks {
    pub on_validation_error: Option<ValidationErrorCallback>,
    pub on_progress: Option<BatchProgressCallback>,
    pub on_file_status: Option<FileStatusCallback>,
    pub on_complete: Option<BatchCompleteCallback>,
}

/// Queue options applied to every file of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub priority: i32,
    pub max_retries: Option<u32>,
}

struct BatchState {
    generation: u64,
    files: Vec<BatchFileStatus>,
    jobs: HashMap<JobId, usize>,
    started: Instant,
    options: BatchOptions,
    callbacks: BatchCallbacks,
    completed: bool,
    listening: bool,
    listener: Option<JoinHandle<()>>,
    done: watch::Sender<bool>,
}

/// Callback invocations collected under the lock, delivered after it
#[derive(Default)]
struct Notices {
    file: Option<(FileStatusCallback, BatchFileStatus)>,
    progress: Option<(BatchProgressCallback, BatchProgress)>,
    complete: Option<(BatchCompleteCallback, Vec<BatchFileStatus>, BatchStatistics)>,
}

impl Notices {
    fn deliver(self) {
        if let Some((cb, status)) = self.file {
            cb(&status);
        }
        if let Some((cb, progress)) = self.progress {
            cb(&progress);
        }
        if let Some((cb, statuses, stats)) = self.complete {
            cb(&statuses, &stats);
        }
    }
}

impl BatchState {
    fn progress(&self) -> BatchProgress {
        BatchProgress::compute(&self.files, self.started.elapsed())
    }

    /// Fold one queue event into the matching file
    fn apply(&mut self, event: &QueueEvent) -> Notices {
        let Some(&index) = self.jobs.get(&event.job_id()) else {
            return Notices::default();
        };
        let entry = &mut self.files[index];
        if self.completed || entry.status.is_terminal() {
            return Notices::default();
        }

        let changed = match event {
            QueueEvent::Started { .. } => {
                entry.mark_processing();
                true
            }
            QueueEvent::Progress(p) => {
                entry.progress = Some(p.progress);
                false
            }
            QueueEvent::Completed { result, .. } => {
                entry.mark_completed(result.clone());
                true
            }
            QueueEvent::Failed {
                error,
                will_retry: false,
                ..
            } => {
                entry.mark_error(error.to_string());
                true
            }
            QueueEvent::Failed {
                will_retry: true, ..
            } => {
                entry.reset();
                true
            }
            QueueEvent::Cancelled { .. } => {
                entry.mark_error("cancelled");
                true
            }
            QueueEvent::Queued { .. } | QueueEvent::RetryScheduled { .. } => return Notices::default(),
        };

        let mut notices = Notices::default();
        if changed {
            notices.file = self
                .callbacks
                .on_file_status
                .clone()
                .map(|cb| (cb, self.files[index].clone()));
        }
        self.settle(notices)
    }

    /// Attach a progress snapshot and, once every file is terminal, the
    /// one-time completion notice
    fn settle(&mut self, mut notices: Notices) -> Notices {
        let progress = self.progress();
        notices.progress = self
            .callbacks
            .on_progress
            .clone()
            .map(|cb| (cb, progress.clone()));

        if !self.completed && self.files.iter().all(|f| f.status.is_terminal()) {
            self.completed = true;
            self.done.send_replace(true);
            info!(
                completed = progress.completed_files,
                failed = progress.failed_files,
                total = progress.total_files,
                "batch complete"
            );
            notices.complete = self.callbacks.on_complete.clone().map(|cb| {
                (
                    cb,
                    self.files.clone(),
                    BatchStatistics::from_statuses(&self.files),
                )
            });
        }
        notices
    }
}

/// Groups files into one tracked batch on top of a queue.
///
/// One batch is active at a time; starting a new one discards the previous
/// batch's tracking (its jobs keep running in the queue).
pub struct BatchWorkflow {
    queue: QueueManager,
    rules: ValidationRules,
    shared: Arc<Mutex<Option<BatchState>>>,
    generation: AtomicU64,
}

impl BatchWorkflow {
    pub fn new(queue: QueueManager, rules: ValidationRules) -> Self {
        Self {
            queue,
            rules,
            shared: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    fn lock(&self) -> MutexGuard<'_, Option<BatchState>> {
        lock_shared(&self.shared)
    }

    /// Validate and enqueue a batch.
    ///
    /// Rejected files are reported through `on_validation_error` before any
    /// job is enqueued. Must be called inside a Tokio runtime.
    pub async fn start_batch<P: AsRef<Path>>(
        &self,
        paths: &[P],
        settings: JobSettings,
        options: BatchOptions,
        callbacks: BatchCallbacks,
    ) -> Result<BatchValidation, BatchError> {
        let report = validate_batch(paths, &self.rules);

        if !report.invalid.is_empty() {
            for invalid in &report.invalid {
                warn!(path = %invalid.path.display(), error = %invalid.error, "file rejected");
            }
            if let Some(cb) = &callbacks.on_validation_error {
                cb(&report.invalid);
            }
        }
        if !report.can_proceed() {
            return Err(BatchError::NoValidFiles {
                invalid: report.invalid.len(),
            });
        }

        self.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (done, _) = watch::channel(false);
        let mut state = BatchState {
            generation,
            files: report.valid.iter().cloned().map(BatchFileStatus::pending).collect(),
            jobs: HashMap::new(),
            started: Instant::now(),
            options,
            callbacks,
            completed: false,
            listening: false,
            listener: None,
            done,
        };

        info!(
            files = state.files.len(),
            rejected = report.invalid.len(),
            bytes = report.total_size,
            "batch started"
        );

        let mut guard = self.lock();
        let indices: Vec<usize> = (0..state.files.len()).collect();
        self.enqueue(&mut state, &indices, &settings);
        *guard = Some(state);
        drop(guard);

        Ok(report)
    }

    /// Submit files to the queue; the caller holds the batch lock so the
    /// listener cannot see events for an unmapped job.
    fn enqueue(&self, state: &mut BatchState, indices: &[usize], settings: &JobSettings) {
        if !state.listening {
            let rx = self.queue.subscribe();
            state.listening = true;
            state.listener = Some(tokio::spawn(listen(
                Arc::clone(&self.shared),
                state.generation,
                rx,
            )));
        }

        for &index in indices {
            let payload = JobPayload::new(state.files[index].file.clone(), settings.clone());
            let id = self.queue.add_to_queue(
                payload,
                AddOptions {
                    priority: state.options.priority,
                    max_retries: state.options.max_retries,
                    ..Default::default()
                },
            );
            state.jobs.insert(id, index);
        }
    }

    /// Current snapshot, if a batch exists
    pub fn get_batch_progress(&self) -> Option<BatchProgress> {
        self.lock().as_ref().map(BatchState::progress)
    }

    pub fn file_statuses(&self) -> Vec<BatchFileStatus> {
        self.lock()
            .as_ref()
            .map(|s| s.files.clone())
            .unwrap_or_default()
    }

    pub fn statistics(&self) -> Option<BatchStatistics> {
        self.lock()
            .as_ref()
            .map(|s| BatchStatistics::from_statuses(&s.files))
    }

    pub fn is_complete(&self) -> bool {
        self.lock().as_ref().is_some_and(|s| s.completed)
    }

    /// Resolve once every file is terminal; `None` if there is no batch or
    /// it was discarded while waiting
    pub async fn wait_for_completion(&self) -> Option<Vec<BatchFileStatus>> {
        let mut rx = self.lock().as_ref()?.done.subscribe();
        rx.wait_for(|done| *done).await.ok()?;
        Some(self.file_statuses())
    }

    /// Cancel every unfinished file's job and mark those files as errors
    pub fn cancel_batch(&self) -> Result<(), BatchError> {
        let active: Vec<JobId> = {
            let guard = self.lock();
            let state = guard.as_ref().ok_or(BatchError::NoActiveBatch)?;
            state
                .jobs
                .iter()
                .filter(|(_, &index)| !state.files[index].status.is_terminal())
                .map(|(id, _)| *id)
                .collect()
        };

        for id in active {
            if let Err(e) = self.queue.cancel_item(id) {
                debug!(job_id = %id, error = %e, "job already finished");
            }
        }

        let notices = {
            let mut guard = self.lock();
            let state = guard.as_mut().ok_or(BatchError::NoActiveBatch)?;
            for file in state.files.iter_mut().filter(|f| !f.status.is_terminal()) {
                file.mark_error("cancelled");
            }
            info!("batch cancelled");
            state.settle(Notices::default())
        };
        notices.deliver();
        Ok(())
    }

    /// Re-submit every errored file as fresh jobs. Completed files are
    /// untouched. Returns how many files were re-submitted.
    pub fn retry_failed_files(&self, settings: JobSettings) -> Result<usize, BatchError> {
        let mut guard = self.lock();
        let state = guard.as_mut().ok_or(BatchError::NoActiveBatch)?;

        let failed: Vec<usize> = state
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.status == FileStatus::Error)
            .map(|(i, _)| i)
            .collect();
        if failed.is_empty() {
            return Ok(0);
        }

        state.jobs.retain(|_, index| !failed.contains(index));
        for &index in &failed {
            state.files[index].reset();
        }
        state.completed = false;
        state.done.send_replace(false);

        info!(files = failed.len(), "retrying failed files");
        self.enqueue(state, &failed, &settings);
        Ok(failed.len())
    }

    /// Discard the current batch's tracking
    pub fn clear(&self) {
        if let Some(state) = self.lock().take() {
            if let Some(listener) = state.listener {
                listener.abort();
            }
        }
    }
}

impl Drop for BatchWorkflow {
    fn drop(&mut self) {
        self.clear();
    }
}

fn lock_shared(shared: &Mutex<Option<BatchState>>) -> MutexGuard<'_, Option<BatchState>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn listen(
    shared: Arc<Mutex<Option<BatchState>>>,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<QueueEvent>,
) {
    while let Some(event) = rx.recv().await {
        let (notices, finished) = {
            let mut guard = lock_shared(&shared);
            let Some(state) = guard.as_mut().filter(|s| s.generation == generation) else {
                return;
            };
            let notices = state.apply(&event);
            if state.completed {
                state.listening = false;
            }
            (notices, state.completed)
        };
        notices.deliver();
        if finished {
            debug!(generation, "batch listener stopped");
            return;
        }
    }
}
