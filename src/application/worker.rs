//! Worker pool and task executor
//!
//! Each assigned job runs on its own Tokio task against the transcription
//! engine. A watchdog timeout and panic detection recycle the worker that
//! was running it, so a hung or crashed call never shrinks the pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::config::AppConfig;
use crate::domain::job::{
    JobId, JobPayload, JobResult, ProcessingProgress, ProcessingStage, Transcript,
    TranscriptMetadata,
};

use super::chunk::{ChunkError, ChunkProgressCallback, ChunkReader};
use super::ports::{AudioInput, EngineProgress, ProgressSink, TranscriptionEngine};
use super::queue::JobError;

/// Receives job-level progress from the executor
pub type JobProgressSink = Arc<dyn Fn(ProcessingProgress) + Send + Sync>;

/// Pool parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on workers; the pool never exceeds available parallelism
    pub max_workers: usize,
    pub task_timeout: Duration,
    /// Files above this size are streamed to the engine in chunks
    pub large_file_threshold: u64,
}

impl PoolConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_workers: config.max_concurrent_jobs_or_default(),
            task_timeout: config.task_timeout_or_default().as_std(),
            large_file_threshold: config.large_file_threshold_bytes(),
        }
    }

    /// `min(available_parallelism, max_workers)`, 2 when parallelism is unknown
    pub fn pool_size(&self) -> usize {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        parallelism.min(self.max_workers).max(1)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::empty())
    }
}

/// One job handed to the pool
#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: JobId,
    pub payload: JobPayload,
    /// 1-based attempt number
    pub attempt: u32,
    pub token: CancellationToken,
}

/// Runs one job end-to-end against the engine
#[derive(Clone)]
pub struct TaskExecutor {
    engine: Arc<dyn TranscriptionEngine>,
    chunks: ChunkReader,
    large_file_threshold: u64,
}

impl TaskExecutor {
    pub fn new(
        engine: Arc<dyn TranscriptionEngine>,
        chunks: ChunkReader,
        large_file_threshold: u64,
    ) -> Self {
        Self {
            engine,
            chunks,
            large_file_threshold,
        }
    }

    /// Watchdog budget for a file of `size` bytes.
    ///
    /// A whole-file job gets `per_call`. A chunked job makes one engine
    /// call per chunk in sequential waves, so it gets `per_call` per wave.
    pub fn time_budget(&self, size: u64, per_call: Duration) -> Duration {
        if size <= self.large_file_threshold {
            return per_call;
        }
        let waves = self.chunks.total_waves(size).max(1);
        per_call.saturating_mul(u32::try_from(waves).unwrap_or(u32::MAX))
    }

    /// Transcribe the assignment's file, whole or chunked
    pub async fn run(
        &self,
        job: &Assignment,
        on_progress: Option<JobProgressSink>,
    ) -> Result<Transcript, JobError> {
        let file = &job.payload.file;
        if file.size() > self.large_file_threshold {
            return self.run_chunked(job, on_progress).await;
        }

        let sink = on_progress.map(|sink| engine_sink(job.id, file.name().to_string(), sink));
        let input = AudioInput::File(file.clone());
        Ok(self
            .engine
            .transcribe(&input, &job.payload.settings, sink)
            .await?)
    }

    async fn run_chunked(
        &self,
        job: &Assignment,
        on_progress: Option<JobProgressSink>,
    ) -> Result<Transcript, JobError> {
        let file = &job.payload.file;
        let settings = &job.payload.settings;
        let total = self.chunks.total_chunks(file.size());
        let format = file.format();

        info!(job_id = %job.id, chunks = total, file = file.name(), "streaming large file");

        let chunk_progress: Option<ChunkProgressCallback> = on_progress.map(|sink| {
            let id = job.id;
            let name = file.name().to_string();
            Arc::new(move |percent: f64| {
                sink(
                    ProcessingProgress::new(id, ProcessingStage::Transcribing, percent)
                        .with_file(name.clone()),
                )
            }) as ChunkProgressCallback
        });

        let engine = &self.engine;
        let parts = self
            .chunks
            .process_in_chunks(
                file.path(),
                |chunk| async move {
                    let input = AudioInput::Chunk {
                        data: chunk.data,
                        format,
                        index: chunk.index,
                        total,
                    };
                    Ok::<_, ChunkError>(engine.transcribe(&input, settings, None).await?)
                },
                chunk_progress,
                &job.token,
            )
            .await?;

        let fallback = TranscriptMetadata {
            language: settings.language.clone(),
            model_size: settings.model_size,
            timestamp: chrono::Utc::now(),
            chunks: 0,
        };
        Ok(Transcript::merge(parts, fallback))
    }
}

/// Adapt an engine progress tick into a job-level one, keeping the last
/// known percent when the engine only reports a stage
fn engine_sink(id: JobId, file_name: String, sink: JobProgressSink) -> ProgressSink {
    let started = Instant::now();
    let last = Mutex::new(0.0f64);
    Arc::new(move |tick: EngineProgress| {
        let percent = {
            let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(p) = tick.percent {
                *last = p;
            }
            *last
        };
        let mut progress =
            ProcessingProgress::new(id, tick.stage, percent).with_file(file_name.clone());
        progress.message = tick.message;
        progress.elapsed = tick.elapsed.or_else(|| Some(started.elapsed()));
        progress.remaining = tick.remaining;
        sink(progress);
    })
}

impl From<ChunkError> for JobError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::Io(e) => JobError::Read(e.to_string()),
            ChunkError::Processing(e) => JobError::Engine(e),
            ChunkError::Cancelled => JobError::System("cancelled".to_string()),
        }
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    jobs_run: u64,
}

/// Bounded set of workers executing assignments
pub struct WorkerPool {
    executor: TaskExecutor,
    config: PoolConfig,
    size: usize,
    idle: Mutex<Vec<Worker>>,
    slots: Semaphore,
    next_worker_id: AtomicUsize,
    recycled: AtomicUsize,
}

impl WorkerPool {
    pub fn new(executor: TaskExecutor, config: PoolConfig) -> Self {
        let size = config.pool_size();
        let idle = (0..size).map(|id| Worker { id, jobs_run: 0 }).collect();
        debug!(size, timeout_ms = config.task_timeout.as_millis() as u64, "worker pool ready");
        Self {
            executor,
            config,
            size,
            idle: Mutex::new(idle),
            slots: Semaphore::new(size),
            next_worker_id: AtomicUsize::new(size),
            recycled: AtomicUsize::new(0),
        }
    }

    /// Number of concurrent workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers torn down after a timeout or crash
    pub fn recycled(&self) -> usize {
        self.recycled.load(Ordering::SeqCst)
    }

    /// Workers not currently running a job
    pub fn idle_workers(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Execute one job and report exactly one outcome.
    ///
    /// Waits for a free worker if all are busy.
    pub async fn assign(
        &self,
        job: &Assignment,
        on_progress: Option<JobProgressSink>,
    ) -> Result<JobResult, JobError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| JobError::System("worker pool closed".to_string()))?;
        let worker = self.checkout();
        debug!(worker = worker.id, job_id = %job.id, attempt = job.attempt, "worker assigned");

        let timeout = self
            .executor
            .time_budget(job.payload.file.size(), self.config.task_timeout);
        let started = Instant::now();
        let executor = self.executor.clone();
        let task_job = job.clone();
        let mut task = tokio::spawn(async move { executor.run(&task_job, on_progress).await });

        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(outcome)) => {
                self.checkin(worker);
                outcome
            }
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    "worker crashed"
                } else {
                    "worker task aborted"
                };
                warn!(worker = worker.id, job_id = %job.id, "{reason}");
                self.recycle(worker);
                Err(JobError::System(reason.to_string()))
            }
            Err(_) => {
                task.abort();
                warn!(
                    worker = worker.id,
                    job_id = %job.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "task timed out"
                );
                self.recycle(worker);
                Err(JobError::Timeout(timeout))
            }
        };

        outcome.map(|transcript| JobResult {
            transcript,
            processing_time: started.elapsed(),
            attempts: job.attempt,
        })
    }

    fn checkout(&self) -> Worker {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.pop().unwrap_or_else(|| self.spawn_worker())
    }

    fn checkin(&self, mut worker: Worker) {
        worker.jobs_run += 1;
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(worker);
    }

    /// Discard a worker and put a fresh one in its place
    fn recycle(&self, worker: Worker) {
        self.recycled.fetch_add(1, Ordering::SeqCst);
        let replacement = self.spawn_worker();
        debug!(old = worker.id, new = replacement.id, jobs_run = worker.jobs_run, "worker recycled");
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(replacement);
    }

    fn spawn_worker(&self) -> Worker {
        Worker {
            id: self.next_worker_id.fetch_add(1, Ordering::SeqCst),
            jobs_run: 0,
        }
    }
}
