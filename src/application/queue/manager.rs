//! Priority queue manager
//!
//! Owns every job's lifecycle. All queue state sits behind one mutex; the
//! dispatch decision, outcome bookkeeping and cancellation each take it
//! briefly and never hold it across an await or a user callback.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::worker::{Assignment, JobProgressSink, WorkerPool};
use crate::domain::job::{JobId, JobPayload, JobResult, JobStatus, ProcessingProgress};

use super::item::{AddOptions, JobCallbacks, QueueItem};
use super::stats::{DurationWindow, QueueStats};
use super::{JobError, QueueConfig, QueueError, QueueEvent};

struct QueueState {
    items: HashMap<JobId, QueueItem>,
    /// Pending ids in dispatch order
    pending: VecDeque<JobId>,
    /// Jobs handed to the pool whose outcome has not been recorded yet
    in_flight: usize,
    running: bool,
    paused: bool,
    durations: DurationWindow,
    dispatcher: Option<CancellationToken>,
}

impl QueueState {
    /// Stable priority insert: before the first pending item with strictly
    /// lower priority, after every item of equal priority
    fn insert_pending(&mut self, id: JobId, priority: i32) {
        let items = &self.items;
        let position = self
            .pending
            .iter()
            .position(|other| items.get(other).is_some_and(|i| i.priority() < priority))
            .unwrap_or(self.pending.len());
        self.pending.insert(position, id);
    }
}

struct Inner {
    config: QueueConfig,
    pool: Arc<WorkerPool>,
    state: Mutex<QueueState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<QueueEvent>>>,
    wake: Notify,
}

/// Handle to a priority job queue. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

/// What to tell observers once the lock is released
enum Outcome {
    Completed(JobResult),
    Failed { error: JobError, will_retry: bool },
}

impl QueueManager {
    pub fn new(config: QueueConfig, pool: Arc<WorkerPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                pool,
                state: Mutex::new(QueueState {
                    items: HashMap::new(),
                    pending: VecDeque::new(),
                    in_flight: 0,
                    running: false,
                    paused: false,
                    durations: DurationWindow::default(),
                    dispatcher: None,
                }),
                subscribers: Mutex::new(Vec::new()),
                wake: Notify::new(),
            }),
        }
    }

    /// Effective concurrency limit
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency()
    }

    /// Enqueue a job and return its id
    pub fn add_to_queue(&self, payload: JobPayload, options: AddOptions) -> JobId {
        let max_retries = options
            .max_retries
            .unwrap_or(self.inner.config.max_retries);
        let item = QueueItem::new(payload, options.priority, max_retries, options.callbacks);
        let id = item.id();

        {
            let mut state = self.inner.lock_state();
            state.items.insert(id, item);
            state.insert_pending(id, options.priority);
        }

        debug!(job_id = %id, priority = options.priority, "job queued");
        self.inner.emit(QueueEvent::Queued {
            id,
            priority: options.priority,
        });
        self.inner.wake.notify_one();
        id
    }

    /// Start the dispatch loop. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        let token = {
            let mut state = self.inner.lock_state();
            state.running = true;
            state.paused = false;
            if state.dispatcher.is_some() {
                None
            } else {
                let token = CancellationToken::new();
                state.dispatcher = Some(token.clone());
                Some(token)
            }
        };

        if let Some(token) = token {
            info!(concurrency = self.concurrency(), "queue started");
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.dispatch_loop(token).await });
        }
        self.inner.wake.notify_one();
    }

    /// Stop pulling new work. In-flight jobs run to completion.
    pub fn stop(&self) {
        let token = {
            let mut state = self.inner.lock_state();
            state.running = false;
            state.dispatcher.take()
        };
        if let Some(token) = token {
            token.cancel();
            info!("queue stopped");
        }
    }

    /// Hold dispatch without tearing down the loop
    pub fn pause(&self) {
        self.inner.lock_state().paused = true;
        debug!("queue paused");
    }

    pub fn resume(&self) {
        self.inner.lock_state().paused = false;
        debug!("queue resumed");
        self.inner.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        let state = self.inner.lock_state();
        state.running && !state.paused
    }

    /// Cancel a pending or processing job.
    ///
    /// A pending job is never dispatched afterwards. A processing job keeps
    /// running until its engine call returns; the result is discarded.
    pub fn cancel_item(&self, id: JobId) -> Result<(), QueueError> {
        {
            let mut state = self.inner.lock_state();
            let item = state.items.get_mut(&id).ok_or(QueueError::NotFound(id))?;
            item.cancel()?;
            state.pending.retain(|p| *p != id);
        }

        info!(job_id = %id, "job cancelled");
        self.inner.emit(QueueEvent::Cancelled { id });
        Ok(())
    }

    /// Manually retry a failed job at `priority + 1`
    pub fn retry_item(&self, id: JobId) -> Result<(), QueueError> {
        let (retry_count, priority) = {
            let mut state = self.inner.lock_state();
            let item = state.items.get_mut(&id).ok_or(QueueError::NotFound(id))?;
            item.retry()?;
            let (retry_count, priority) = (item.retry_count(), item.priority());
            state.insert_pending(id, priority);
            (retry_count, priority)
        };

        info!(job_id = %id, retry_count, "job retried");
        self.inner.emit(QueueEvent::RetryScheduled {
            id,
            retry_count,
            priority,
        });
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Counts per status plus the rolling-average ETA
    pub fn get_stats(&self) -> QueueStats {
        let state = self.inner.lock_state();
        let mut stats = QueueStats::default();
        for item in state.items.values() {
            match item.status() {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.average_processing_time = state.durations.average();
        stats.estimated_time_remaining = stats.average_processing_time * stats.pending as u32;
        stats
    }

    /// Snapshot of one job
    pub fn get_item(&self, id: JobId) -> Option<QueueItem> {
        self.inner.lock_state().items.get(&id).cloned()
    }

    /// Pending ids in the order they would be dispatched
    pub fn pending_order(&self) -> Vec<JobId> {
        self.inner.lock_state().pending.iter().copied().collect()
    }

    /// Receive every queue event from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<QueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent_jobs.min(self.pool.size()).max(1)
    }

    fn emit(&self, event: QueueEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    async fn dispatch_loop(self: Arc<Self>, token: CancellationToken) {
        loop {
            self.dispatch();
            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        debug!("dispatch loop exited");
    }

    /// Hand pending jobs to the pool while slots are free
    fn dispatch(self: &Arc<Self>) {
        let limit = self.concurrency();
        let mut launched = Vec::new();
        {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            if !state.running || state.paused {
                return;
            }
            while state.in_flight < limit {
                let Some(id) = state.pending.pop_front() else {
                    break;
                };
                let Some(item) = state.items.get_mut(&id) else {
                    continue;
                };
                if item.start().is_err() {
                    continue;
                }
                state.in_flight += 1;
                launched.push((
                    Assignment {
                        id,
                        payload: item.payload().clone(),
                        attempt: item.retry_count() + 1,
                        token: item.token.clone(),
                    },
                    item.callbacks.clone(),
                ));
            }
        }

        for (job, callbacks) in launched {
            debug!(job_id = %job.id, attempt = job.attempt, "job dispatched");
            self.emit(QueueEvent::Started {
                id: job.id,
                attempt: job.attempt,
            });
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run_job(job, callbacks).await });
        }
    }

    async fn run_job(self: Arc<Self>, job: Assignment, callbacks: JobCallbacks) {
        // Gate shared with the progress sink: once the outcome is recorded,
        // late progress from an aborted or cancelled call is dropped.
        let finished = Arc::new(Mutex::new(false));
        let sink = self.progress_sink(&job, callbacks.clone(), Arc::clone(&finished));

        let outcome = self.pool.assign(&job, Some(sink)).await;

        *finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.finish(job, callbacks, outcome);
    }

    fn progress_sink(
        self: &Arc<Self>,
        job: &Assignment,
        callbacks: JobCallbacks,
        finished: Arc<Mutex<bool>>,
    ) -> JobProgressSink {
        let inner = Arc::clone(self);
        let id = job.id;
        let token = job.token.clone();
        Arc::new(move |progress: ProcessingProgress| {
            let done = finished.lock().unwrap_or_else(PoisonError::into_inner);
            if *done || token.is_cancelled() {
                return;
            }
            if let Some(item) = inner.lock_state().items.get_mut(&id) {
                item.set_progress(progress.progress);
            }
            if let Some(cb) = &callbacks.on_progress {
                cb(&progress);
            }
            inner.emit(QueueEvent::Progress(progress));
        })
    }

    /// Record a job's single terminal outcome for this attempt
    fn finish(self: &Arc<Self>, job: Assignment, callbacks: JobCallbacks, outcome: Result<JobResult, JobError>) {
        let id = job.id;
        let recorded = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            state.in_flight = state.in_flight.saturating_sub(1);

            match state.items.get_mut(&id) {
                Some(item) if item.status() == JobStatus::Processing => match outcome {
                    Ok(result) => {
                        let processing_time = result.processing_time;
                        match item.complete(result.clone()) {
                            Ok(()) => {
                                state.durations.push(processing_time);
                                Some(Outcome::Completed(result))
                            }
                            Err(_) => None,
                        }
                    }
                    Err(error) => match item.fail(error.clone()) {
                        Ok(will_retry) => Some(Outcome::Failed { error, will_retry }),
                        Err(_) => None,
                    },
                },
                _ => None,
            }
        };
        self.wake.notify_one();

        match recorded {
            None => {
                debug!(job_id = %id, "outcome discarded for cancelled job");
            }
            Some(Outcome::Completed(result)) => {
                info!(
                    job_id = %id,
                    attempt = job.attempt,
                    elapsed_ms = result.processing_time.as_millis() as u64,
                    "job completed"
                );
                if let Some(cb) = &callbacks.on_complete {
                    cb(id, &result);
                }
                self.emit(QueueEvent::Completed { id, result });
            }
            Some(Outcome::Failed { error, will_retry }) => {
                if will_retry {
                    warn!(job_id = %id, attempt = job.attempt, error = %error, "job failed, retry scheduled");
                    self.schedule_retry(id, job.token.clone());
                } else {
                    warn!(job_id = %id, attempt = job.attempt, error = %error, "job failed");
                    if let Some(cb) = &callbacks.on_error {
                        cb(id, &error);
                    }
                }
                self.emit(QueueEvent::Failed {
                    id,
                    error,
                    will_retry,
                });
            }
        }
    }

    /// Re-enqueue after the fixed retry delay unless cancelled meanwhile
    fn schedule_retry(self: &Arc<Self>, id: JobId, token: CancellationToken) {
        let inner = Arc::clone(self);
        let delay = self.config.retry_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            inner.requeue(id);
        });
    }

    fn requeue(&self, id: JobId) {
        let requeued = {
            let mut state = self.lock_state();
            match state.items.get_mut(&id) {
                Some(item) if item.status() == JobStatus::Pending && !item.token.is_cancelled() => {
                    item.requeue();
                    let (retry_count, priority) = (item.retry_count(), item.priority());
                    state.insert_pending(id, priority);
                    Some((retry_count, priority))
                }
                _ => None,
            }
        };

        if let Some((retry_count, priority)) = requeued {
            debug!(job_id = %id, retry_count, priority, "job requeued");
            self.emit(QueueEvent::RetryScheduled {
                id,
                retry_count,
                priority,
            });
            self.wake.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::chunk::{ChunkConfig, ChunkReader};
    use crate::application::ports::{
        AudioInput, EngineError, NoPressure, ProgressSink, TranscriptionEngine,
    };
    use crate::application::worker::{PoolConfig, TaskExecutor};
    use crate::domain::audio::{AudioFile, AudioFormat};
    use crate::domain::job::{JobSettings, Transcript, TranscriptMetadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Engine that fails the first `failures` calls per file
    struct FlakyEngine {
        failures: usize,
        calls: Mutex<HashMap<String, usize>>,
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FlakyEngine {
        fn new(failures: usize, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: Mutex::new(HashMap::new()),
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TranscriptionEngine for FlakyEngine {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn transcribe(
            &self,
            input: &AudioInput,
            settings: &JobSettings,
            _on_progress: Option<ProgressSink>,
        ) -> Result<Transcript, EngineError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let key = input.path().map(|p| p.display().to_string()).unwrap_or_default();
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(key.clone()).or_insert(0);
                *n += 1;
                *n
            };
            if attempt <= self.failures {
                return Err(EngineError::EngineUnavailable("warming up".into()));
            }
            Ok(Transcript {
                text: key,
                metadata: TranscriptMetadata {
                    language: settings.language.clone(),
                    model_size: settings.model_size,
                    timestamp: chrono::Utc::now(),
                    chunks: 1,
                },
                confidence: None,
            })
        }
    }

    fn queue(engine: Arc<FlakyEngine>, max_jobs: usize, max_retries: u32) -> QueueManager {
        let chunks = ChunkReader::new(ChunkConfig::default(), Arc::new(NoPressure));
        let pool = WorkerPool::new(
            TaskExecutor::new(engine, chunks, u64::MAX),
            PoolConfig {
                max_workers: max_jobs,
                task_timeout: Duration::from_secs(5),
                large_file_threshold: u64::MAX,
            },
        );
        QueueManager::new(
            QueueConfig {
                max_concurrent_jobs: max_jobs,
                max_retries,
                retry_delay: Duration::from_millis(10),
                poll_interval: Duration::from_millis(50),
            },
            Arc::new(pool),
        )
    }

    fn payload(name: &str) -> JobPayload {
        JobPayload::new(
            AudioFile::new(format!("/tmp/{name}"), 10, AudioFormat::Wav),
            JobSettings::default(),
        )
    }

    async fn wait_terminal(queue: &QueueManager, id: JobId) -> QueueItem {
        for _ in 0..500 {
            if let Some(item) = queue.get_item(id) {
                if item.status().is_terminal() {
                    return item;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }

    #[tokio::test]
    async fn stable_priority_order() {
        let queue = queue(FlakyEngine::new(0, Duration::ZERO), 1, 3);
        let low = queue.add_to_queue(payload("low.wav"), AddOptions::with_priority(1));
        let high = queue.add_to_queue(payload("high.wav"), AddOptions::with_priority(10));
        let mid = queue.add_to_queue(payload("mid.wav"), AddOptions::with_priority(5));
        let mid2 = queue.add_to_queue(payload("mid2.wav"), AddOptions::with_priority(5));

        assert_eq!(queue.pending_order(), vec![high, mid, mid2, low]);
    }

    #[tokio::test]
    async fn dispatches_in_priority_order() {
        let queue = queue(FlakyEngine::new(0, Duration::ZERO), 1, 3);
        let mut events = queue.subscribe();
        let a = queue.add_to_queue(payload("a.wav"), AddOptions::with_priority(1));
        let b = queue.add_to_queue(payload("b.wav"), AddOptions::with_priority(10));
        let c = queue.add_to_queue(payload("c.wav"), AddOptions::with_priority(5));
        queue.start();

        let mut started = Vec::new();
        while started.len() < 3 {
            if let Some(QueueEvent::Started { id, .. }) = events.recv().await {
                started.push(id);
            }
        }
        assert_eq!(started, vec![b, c, a]);
    }

    #[tokio::test]
    async fn retries_then_completes() {
        let engine = FlakyEngine::new(2, Duration::ZERO);
        let queue = queue(engine, 1, 3);
        queue.start();
        let id = queue.add_to_queue(payload("flaky.wav"), AddOptions::default());

        let item = wait_terminal(&queue, id).await;
        assert_eq!(item.status(), JobStatus::Completed);
        assert_eq!(item.retry_count(), 2);
        assert_eq!(item.result().map(|r| r.attempts), Some(3));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_with_error_callback() {
        let engine = FlakyEngine::new(usize::MAX, Duration::ZERO);
        let queue = queue(engine, 1, 2);
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        queue.start();
        let id = queue.add_to_queue(
            payload("dead.wav"),
            AddOptions {
                callbacks: JobCallbacks {
                    on_error: Some(Arc::new(move |_: JobId, _: &JobError| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let item = wait_terminal(&queue, id).await;
        assert_eq!(item.status(), JobStatus::Failed);
        assert_eq!(item.retry_count(), item.max_retries());
        assert!(item.error().is_some());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(matches!(
            queue.retry_item(id),
            Err(QueueError::RetryLimitReached { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_pending_item_never_runs() {
        let queue = queue(FlakyEngine::new(0, Duration::ZERO), 1, 3);
        let id = queue.add_to_queue(payload("a.wav"), AddOptions::default());
        queue.cancel_item(id).unwrap();
        assert!(queue.pending_order().is_empty());

        let mut events = queue.subscribe();
        queue.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(queue.get_item(id).unwrap().status(), JobStatus::Cancelled);
        assert!(queue.cancel_item(id).is_err());
    }

    #[tokio::test]
    async fn cancelled_processing_item_discards_result() {
        let queue = queue(FlakyEngine::new(0, Duration::from_millis(100)), 1, 3);
        queue.start();
        let id = queue.add_to_queue(payload("a.wav"), AddOptions::default());

        for _ in 0..100 {
            if queue.get_item(id).unwrap().status() == JobStatus::Processing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        queue.cancel_item(id).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let item = queue.get_item(id).unwrap();
        assert_eq!(item.status(), JobStatus::Cancelled);
        assert!(item.result().is_none());
    }

    #[tokio::test]
    async fn concurrency_gate_holds() {
        let engine = FlakyEngine::new(0, Duration::from_millis(30));
        let queue = queue(engine.clone(), 1, 3);
        queue.start();
        let ids: Vec<JobId> = (0..4)
            .map(|i| queue.add_to_queue(payload(&format!("{i}.wav")), AddOptions::default()))
            .collect();

        for id in ids {
            wait_terminal(&queue, id).await;
        }
        assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn paused_queue_does_not_dispatch() {
        let queue = queue(FlakyEngine::new(0, Duration::ZERO), 1, 3);
        queue.start();
        queue.pause();
        let id = queue.add_to_queue(payload("a.wav"), AddOptions::default());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.get_item(id).unwrap().status(), JobStatus::Pending);

        queue.resume();
        assert_eq!(wait_terminal(&queue, id).await.status(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn stats_count_every_item() {
        let queue = queue(FlakyEngine::new(0, Duration::ZERO), 1, 3);
        let done = queue.add_to_queue(payload("a.wav"), AddOptions::default());
        let cancelled = queue.add_to_queue(payload("b.wav"), AddOptions::default());
        queue.cancel_item(cancelled).unwrap();
        queue.start();
        wait_terminal(&queue, done).await;
        queue.stop();
        queue.add_to_queue(payload("c.wav"), AddOptions::default());

        let stats = queue.get_stats();
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(
            stats.estimated_time_remaining,
            stats.average_processing_time * stats.pending as u32
        );
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let queue = queue(FlakyEngine::new(0, Duration::ZERO), 1, 3);
        let id = JobId::new();
        assert_eq!(queue.cancel_item(id), Err(QueueError::NotFound(id)));
        assert_eq!(queue.retry_item(id), Err(QueueError::NotFound(id)));
    }
}
